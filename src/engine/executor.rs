use std::pin::pin;

use crate::error::{Error, Result};

use super::table::Table;
use super::Predicate;

/// Executes a SELECT against a table, optionally blocking until a match.
///
/// ## Execution Pipeline
/// 1. **Projection**: resolve `*` to the full column list, then every
///    column name to its index (fails fast on an unknown name).
/// 2. **Scan**: visit rows in load order; each row's WHERE test and output
///    formatting happen under a single acquisition of that row's lock.
/// 3. **Format**: tab-joined header emitted once, before the first matched
///    row; tab-joined cell values per match; trailing
///    `<n> row(s) selected.` line always.
/// 4. **Wait**: a pass that matched nothing retries after the table's next
///    change notification when `must_wait` is set. Retry is unbounded; the
///    notification future is registered before the scan so an update
///    racing the end of a pass is never missed.
pub async fn execute_select(
    table: &Table,
    columns: &[String],
    predicate: Option<&Predicate>,
    must_wait: bool,
) -> Result<String> {
    // Resolve `*` to all columns, then names to cell indices up front.
    let names = if columns.len() == 1 && columns[0] == "*" {
        table.column_names()
    } else {
        columns.to_vec()
    };
    let indices = resolve_columns(table, &names)?;
    let where_col = resolve_predicate(table, predicate)?;

    loop {
        // Enabling before the scan registers this pass with the change
        // channel; an update landing mid-scan then still wakes the await.
        let mut notified = pin!(table.wait_for_change());
        notified.as_mut().enable();

        let mut out = String::new();
        let mut matched = 0usize;
        for row in table.rows() {
            let cells = row.cells.lock();
            let is_match = match where_col {
                None => true,
                Some((idx, pred)) => pred.matches(&cells[idx]),
            };
            if is_match {
                matched += 1;
                if matched == 1 {
                    out.push_str(&names.join("\t"));
                    out.push('\n');
                }
                let line: Vec<&str> = indices.iter().map(|&i| cells[i].as_str()).collect();
                out.push_str(&line.join("\t"));
                out.push('\n');
            }
        }

        if matched > 0 || !must_wait {
            out.push_str(&format!("{matched} row(s) selected.\n"));
            return Ok(out);
        }
        notified.await;
    }
}

/// Executes an UPDATE against a table, optionally blocking until a match.
///
/// Every assignment's column name is resolved before the scan. For each
/// matching row, all assignments are applied under that row's lock, so a
/// concurrent reader sees either none or all of them for that row. After a
/// pass that changed at least one row, every query parked on the table's
/// change notification is woken.
pub async fn execute_update(
    table: &Table,
    assignments: &[(String, String)],
    predicate: Option<&Predicate>,
    must_wait: bool,
) -> Result<String> {
    let sets: Vec<(usize, &str)> = assignments
        .iter()
        .map(|(name, value)| {
            table
                .column_index(name)
                .map(|i| (i, value.as_str()))
                .ok_or_else(|| Error::ColumnNotFound(name.clone()))
        })
        .collect::<Result<_>>()?;
    let where_col = resolve_predicate(table, predicate)?;

    loop {
        let mut notified = pin!(table.wait_for_change());
        notified.as_mut().enable();

        let mut updated = 0usize;
        for row in table.rows() {
            let mut cells = row.cells.lock();
            let is_match = match where_col {
                None => true,
                Some((idx, pred)) => pred.matches(&cells[idx]),
            };
            if is_match {
                updated += 1;
                for &(idx, value) in &sets {
                    cells[idx] = value.to_string();
                }
            }
        }

        if updated > 0 {
            table.notify_change();
        }
        if updated > 0 || !must_wait {
            return Ok(format!("{updated} row(s) updated.\n"));
        }
        notified.await;
    }
}

/// INSERT is parsed but deliberately not implemented. Implementing it would
/// change the row *set*, which everything else assumes is fixed after load;
/// that would require a structural lock around the row sequence in addition
/// to the per-row locks.
pub fn execute_insert(_table: &Table) -> Result<String> {
    Err(Error::NotImplemented("insert"))
}

/// DELETE is parsed but deliberately not implemented, for the same
/// structural reason as INSERT.
pub fn execute_delete(_table: &Table) -> Result<String> {
    Err(Error::NotImplemented("delete"))
}

/// Maps projection names to cell indices, failing on the first unknown name.
fn resolve_columns(table: &Table, names: &[String]) -> Result<Vec<usize>> {
    names
        .iter()
        .map(|name| {
            table
                .column_index(name)
                .ok_or_else(|| Error::ColumnNotFound(name.clone()))
        })
        .collect()
}

/// Resolves an optional WHERE clause to (cell index, predicate).
fn resolve_predicate<'a>(
    table: &Table,
    predicate: Option<&'a Predicate>,
) -> Result<Option<(usize, &'a Predicate)>> {
    predicate
        .map(|p| {
            table
                .column_index(&p.column)
                .map(|i| (i, p))
                .ok_or_else(|| Error::ColumnNotFound(p.column.clone()))
        })
        .transpose()
}
