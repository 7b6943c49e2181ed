use parking_lot::{Mutex, RwLock};
use std::{collections::HashMap, sync::Arc};
use tracing::info;

mod executor;
mod remote;
mod table;

pub use table::{Row, Table};

use crate::error::{Error, Result};

/// The comparison kinds a WHERE clause supports.
///
/// Comparisons are exact string comparisons between a row's cell value and
/// the literal, both taken verbatim. There is no type coercion and no case
/// folding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    /// `column = literal`
    Eq,
    /// `column != literal`
    Ne,
}

/// A parsed WHERE clause: one column tested against one literal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Predicate {
    /// Column whose cell value is tested
    pub column: String,
    /// Equality or inequality
    pub op: Comparison,
    /// Literal the cell is compared against, verbatim
    pub literal: String,
}

impl Predicate {
    /// Tests one cell value against the literal.
    pub fn matches(&self, cell: &str) -> bool {
        match self.op {
            Comparison::Eq => cell == self.literal,
            Comparison::Ne => cell != self.literal,
        }
    }
}

/// The central service object: a table cache plus query execution.
///
/// The engine owns every loaded table for the life of the process and
/// tracks the most recently resolved identifier, which stands in for the
/// table when a statement omits one. It is shared across connection
/// handlers behind an `Arc`; all interior state carries its own lock.
///
/// ## Locking
/// - `tables` (cache map): `RwLock`, held only for lookup and insert,
///   never across a load.
/// - `recent` ("most recent" identifier): its own `Mutex`, independent of
///   the cache lock, since it is touched on nearly every request.
/// - Row data: per-row locks inside each `Table`; the engine never takes
///   them itself.
pub struct Engine {
    /// Loaded tables keyed by the exact identifier string the client used
    tables: RwLock<HashMap<String, Arc<Table>>>,
    /// Identifier of the most recently resolved table ("" before any)
    recent: Mutex<String>,
}

impl Engine {
    /// Creates an empty engine: no tables loaded, no recent identifier.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            recent: Mutex::new(String::new()),
        }
    }

    /// Returns the table for `identifier`, loading it on first use.
    ///
    /// An empty identifier resolves to the most recently used one (an error
    /// if there has never been a successful resolve). The identifier is
    /// recorded as most-recent before the load is attempted, matching the
    /// source behavior of the original engine.
    ///
    /// ## Cache Discipline
    /// The lookup and the insert each take the cache lock briefly; the
    /// (potentially slow) file read or remote fetch happens outside any
    /// lock so unrelated requests are never stalled behind I/O. Two
    /// requests racing to load the same identifier may both load it;
    /// the second insert wins, which is acceptable because loads are
    /// idempotent reads of the same source.
    pub async fn resolve(&self, identifier: &str) -> Result<Arc<Table>> {
        let id = {
            let mut recent = self.recent.lock();
            let id = if identifier.is_empty() {
                if recent.is_empty() {
                    return Err(Error::NoRecentTable);
                }
                recent.clone()
            } else {
                identifier.to_string()
            };
            *recent = id.clone();
            id
        };

        if let Some(table) = self.tables.read().get(&id) {
            return Ok(table.clone());
        }

        let table = if id.starts_with("http://") {
            remote::load(&id).await?
        } else {
            let text = tokio::fs::read_to_string(&id).await?;
            Table::parse(&text)?
        };
        info!(identifier = %id, rows = table.rows().len(), "table loaded");

        let table = Arc::new(table);
        self.tables.write().insert(id, table.clone());
        Ok(table)
    }

    /// SELECT entry point: resolve the table, then run the scan.
    pub async fn select(
        &self,
        identifier: &str,
        columns: &[String],
        predicate: Option<&Predicate>,
        must_wait: bool,
    ) -> Result<String> {
        let table = self.resolve(identifier).await?;
        executor::execute_select(&table, columns, predicate, must_wait).await
    }

    /// UPDATE entry point: resolve the table, then apply assignments.
    pub async fn update(
        &self,
        identifier: &str,
        assignments: &[(String, String)],
        predicate: Option<&Predicate>,
        must_wait: bool,
    ) -> Result<String> {
        let table = self.resolve(identifier).await?;
        executor::execute_update(&table, assignments, predicate, must_wait).await
    }

    /// INSERT entry point. The table is resolved first so a missing table
    /// reports as such, then execution fails as not implemented.
    pub async fn insert(&self, identifier: &str) -> Result<String> {
        let table = self.resolve(identifier).await?;
        executor::execute_insert(&table)
    }

    /// DELETE entry point, same shape as INSERT.
    pub async fn delete(&self, identifier: &str) -> Result<String> {
        let table = self.resolve(identifier).await?;
        executor::execute_delete(&table)
    }

    /// Serializes a cached table back to its local file.
    ///
    /// An empty identifier resolves to the most recently used one. Remote
    /// identifiers are rejected: there is no remote write path. The table
    /// must already be in the cache; SAVE never loads.
    pub async fn save(&self, identifier: &str) -> Result<String> {
        let id = if identifier.is_empty() {
            let recent = self.recent.lock();
            if recent.is_empty() {
                return Err(Error::NoRecentTable);
            }
            recent.clone()
        } else {
            identifier.to_string()
        };
        if id.starts_with("http://") {
            return Err(Error::UnsupportedOperation(
                "Saving CSV to an URL using POST is not implemented".to_string(),
            ));
        }
        let table = self
            .tables
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::TableNotLoaded(id.clone()))?;
        tokio::fs::write(&id, table.to_csv()).await?;
        info!(identifier = %id, "table saved");
        Ok(format!("{id} saved.\n"))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
