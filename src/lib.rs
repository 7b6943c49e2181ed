//! # rust_csv_db - A Concurrent CSV Database in Rust
//!
//! A minimal in-memory, CSV-backed tabular engine that answers SQL-like
//! SELECT/UPDATE statements over a simple HTTP-style protocol:
//! - **Per-row locking**: reads and writes contend only on the rows they touch
//! - **Blocking queries**: a `WAIT` modifier parks a query until a matching
//!   row appears
//! - **Bounded concurrency**: an admission gate caps simultaneously
//!   executing request handlers
//! - **Lazy loading**: tables load on first reference, from local files or
//!   remote `http://` CSV sources, and stay cached for the process lifetime
//! - **Explicit persistence**: `SAVE` writes a table back to its local file
//!
//! ## Architecture Overview
//!
//! The crate consists of three main layers:
//!
//! 1. **Server Layer** (`server` module): Connection accept loop, admission
//!    gate, request decoding, and response framing
//! 2. **SQL Layer** (`sql` module): Statement lexing/parsing and dispatch
//! 3. **Engine Layer** (`engine` module): The table cache, row/table data
//!    model, query execution, and remote acquisition
//!
//! ## Usage Example
//!
//! ```bash
//! # Start the server
//! cargo run -- --listen 127.0.0.1:8080 --root ./data
//!
//! # Query a CSV file through it
//! curl 'http://127.0.0.1:8080/sql?query=select%20*%20from%20people.csv'
//! ```

/// TCP server, admission gate, and client connection handling
pub mod server;

/// Core engine: table cache, rows/tables, query execution, remote loading
pub mod engine;

/// Statement parsing and execution dispatch
pub mod sql;

/// Error taxonomy shared across the crate
pub mod error;
