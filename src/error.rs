use thiserror::Error;

/// All failures the engine can surface to a client.
///
/// Every variant is raised synchronously by the operation that detects it
/// and propagates up to the request handler, which renders it as a single
/// `Error: <message>` line inside an otherwise well-formed response.
///
/// ## Variant Overview
/// - CSV shape problems: `MalformedCsv`, `DuplicateColumn`
/// - Name resolution: `ColumnNotFound`, `TableNotLoaded`, `NoRecentTable`
/// - Remote acquisition: `Connect`, `RemoteStatus`
/// - Statement problems: `Parse`, `NotImplemented`, `UnsupportedOperation`
/// - Local I/O: `Io` (transparent wrapper around `std::io::Error`)
#[derive(Debug, Error)]
pub enum Error {
    /// A CSV data line whose field count differs from the header's.
    #[error("malformed CSV: line {line} does not match the header column count")]
    MalformedCsv {
        /// 1-based line number within the CSV source
        line: usize,
    },

    /// A CSV header that names the same column twice.
    #[error("malformed CSV: duplicate column name '{0}'")]
    DuplicateColumn(String),

    /// A projection, WHERE clause, or SET clause referenced an unknown column.
    #[error("unknown column '{0}'")]
    ColumnNotFound(String),

    /// Could not establish a connection to a remote CSV source.
    #[error("Unable to connect to {host} at port {port}")]
    Connect {
        /// Remote host name or address
        host: String,
        /// Remote TCP port
        port: u16,
    },

    /// The remote CSV source answered with a non-200 status line.
    #[error("unexpected response ({status}) getting {path} from {host} at port {port}")]
    RemoteStatus {
        /// The status line as received, trimmed
        status: String,
        /// The path that was requested
        path: String,
        /// Remote host name or address
        host: String,
        /// Remote TCP port
        port: u16,
    },

    /// A statement that is recognized but cannot be carried out.
    #[error("{0}")]
    UnsupportedOperation(String),

    /// A statement kind that is parsed but deliberately not implemented.
    #[error("{0} is not yet implemented.")]
    NotImplemented(&'static str),

    /// A statement omitted the table identifier before any table was resolved.
    #[error("no table has been loaded yet")]
    NoRecentTable,

    /// SAVE named an identifier that is not in the cache.
    #[error("table '{0}' has not been loaded")]
    TableNotLoaded(String),

    /// The statement text could not be parsed.
    #[error("{0}")]
    Parse(String),

    /// Local file I/O failure during load or save.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
