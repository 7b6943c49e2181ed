use parking_lot::Mutex;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;

use crate::error::{Error, Result};

/// A single data record: an ordered list of cell values behind its own lock.
///
/// Rows are the unit of mutual exclusion in the engine. A query that reads
/// or writes a row's cells takes `cells.lock()` for the duration of the
/// access and nothing longer, so SELECTs and UPDATEs touching disjoint rows
/// proceed without contention.
///
/// ## Invariant
/// A row's cell count always equals its owning table's column count. Rows
/// are created only by `Table::parse` (one per CSV data line) and are never
/// added or removed afterwards; only cell values change.
///
/// ## Indexing Contract
/// Cell indices come from `Table::column_index` and are trusted. An
/// out-of-range index is a programming error and panics via slice indexing.
#[derive(Debug)]
pub struct Row {
    /// Cell values, index-aligned with the table's column list
    pub cells: Mutex<Vec<String>>,
}

impl Row {
    fn new(cells: Vec<String>) -> Self {
        Self {
            cells: Mutex::new(cells),
        }
    }

    /// Returns a copy of one cell value, read under the row lock.
    pub fn get(&self, index: usize) -> String {
        self.cells.lock()[index].clone()
    }

    /// Overwrites one cell value under the row lock.
    pub fn set(&self, index: usize, value: String) {
        self.cells.lock()[index] = value;
    }
}

/// An in-memory CSV dataset: ordered columns, a fixed set of rows, and a
/// change-notification channel for blocking queries.
///
/// ## Structure
/// - `columns`: unique, ordered column names from the CSV header. The order
///   defines display order and cell indexing. Immutable after load, so
///   column lookups need no lock.
/// - `rows`: one `Row` per CSV data line, in file order. The row *set* is
///   fixed after load (no insert/delete), so iteration needs no structural
///   lock either; consumers lock individual rows as they visit them.
/// - `changed`: woken whenever an UPDATE commits at least one row. Blocking
///   (WAIT) queries park on this between scan passes.
///
/// ## Consistency Model
/// Atomicity is per row. A scan that reads several rows may observe cells
/// from different moments in time; two cells of the *same* row are always
/// read under one lock acquisition and are mutually consistent.
#[derive(Debug)]
pub struct Table {
    /// Ordered, unique column names from the header line
    columns: Vec<String>,
    /// All rows, in original file order; fixed after load
    rows: Vec<Row>,
    /// Signalled after any UPDATE that changed at least one row
    changed: Notify,
}

impl Table {
    /// Parses CSV text into a table.
    ///
    /// The first line is the comma-separated header; every subsequent line
    /// is one row. Fields are split on `,` verbatim; there is no quoting or
    /// escaping of embedded delimiters (a documented format limitation).
    ///
    /// ## Errors
    /// - `Error::DuplicateColumn` if the header repeats a name
    /// - `Error::MalformedCsv` if a data line's field count differs from
    ///   the header's (the line number reported is 1-based)
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        let header = lines.next().unwrap_or("");
        let columns: Vec<String> = header.split(',').map(str::to_string).collect();
        for (i, name) in columns.iter().enumerate() {
            if columns[..i].contains(name) {
                return Err(Error::DuplicateColumn(name.clone()));
            }
        }

        let mut rows = Vec::new();
        for (i, line) in lines.enumerate() {
            let cells: Vec<String> = line.split(',').map(str::to_string).collect();
            if cells.len() != columns.len() {
                // Header is line 1, so the first data line is line 2.
                return Err(Error::MalformedCsv { line: i + 2 });
            }
            rows.push(Row::new(cells));
        }

        Ok(Self {
            columns,
            rows,
            changed: Notify::new(),
        })
    }

    /// Returns the position of a column by exact name match, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Returns a snapshot copy of the ordered column-name list.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.clone()
    }

    /// Number of columns (equals every row's cell count).
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// All rows in original load order. Iteration takes no lock; callers
    /// lock each row individually while touching its cells.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Serializes the table back to CSV text: header line, then every row.
    ///
    /// Each row is read under its own lock so a concurrent UPDATE can never
    /// produce a torn value in the output, though rows serialized earlier
    /// may predate updates visible in rows serialized later.
    pub fn to_csv(&self) -> String {
        let mut out = self.columns.join(",");
        out.push('\n');
        for row in &self.rows {
            let cells = row.cells.lock();
            out.push_str(&cells.join(","));
            out.push('\n');
        }
        out
    }

    /// Registers interest in the next change notification.
    ///
    /// The returned future must be pinned and `enable`d *before* scanning
    /// the table, then awaited after a fruitless pass. Enabling first
    /// closes the window where an UPDATE lands between the end of the scan
    /// and the wait; a future that has never been polled or enabled is
    /// invisible to `notify_change` and would sleep through it.
    pub fn wait_for_change(&self) -> Notified<'_> {
        self.changed.notified()
    }

    /// Wakes every query currently parked in `wait_for_change`.
    ///
    /// Called after an UPDATE commits at least one row. Woken queries
    /// re-run their full scan; unrelated updates and spurious wakeups are
    /// harmless because the predicate is always re-tested.
    pub fn notify_change(&self) {
        self.changed.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "name,age\nAda,30\nLin,40\n";

    #[test]
    fn parse_well_formed() {
        let t = Table::parse(SAMPLE).unwrap();
        assert_eq!(t.column_names(), vec!["name", "age"]);
        assert_eq!(t.rows().len(), 2);
        for row in t.rows() {
            assert_eq!(row.cells.lock().len(), t.column_count());
        }
        assert_eq!(t.rows()[0].get(0), "Ada");
        assert_eq!(t.rows()[1].get(1), "40");
    }

    #[test]
    fn parse_rejects_short_line() {
        let err = Table::parse("a,b\n1,2\n3\n").unwrap_err();
        match err {
            Error::MalformedCsv { line } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parse_rejects_duplicate_column() {
        let err = Table::parse("id,name,id\n1,x,2\n").unwrap_err();
        assert!(matches!(err, Error::DuplicateColumn(name) if name == "id"));
    }

    #[test]
    fn column_index_is_exact_match() {
        let t = Table::parse(SAMPLE).unwrap();
        assert_eq!(t.column_index("name"), Some(0));
        assert_eq!(t.column_index("age"), Some(1));
        assert_eq!(t.column_index("Name"), None);
    }

    #[test]
    fn set_then_serialize_round_trips() {
        let t = Table::parse(SAMPLE).unwrap();
        t.rows()[0].set(1, "31".to_string());
        let text = t.to_csv();
        assert_eq!(text, "name,age\nAda,31\nLin,40\n");

        let reloaded = Table::parse(&text).unwrap();
        assert_eq!(reloaded.column_names(), t.column_names());
        assert_eq!(reloaded.rows()[0].get(1), "31");
    }

    #[test]
    fn empty_field_is_preserved() {
        let t = Table::parse("a,b\n,x\n").unwrap();
        assert_eq!(t.rows()[0].get(0), "");
        assert_eq!(t.rows()[0].get(1), "x");
    }
}
