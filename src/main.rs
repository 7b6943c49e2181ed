use anyhow::Result;
use clap::{Arg, Command};
use rust_csv_db::{engine::Engine, server::serve};
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

/// Main entry point for the rust_csv_db server.
///
/// This function:
/// 1. Parses command-line arguments for the listen address, the handler
///    concurrency bound, and the static file root
/// 2. Initializes structured logging with tracing
/// 3. Creates the shared in-memory engine (tables load lazily on first use)
/// 4. Starts the TCP server to accept client connections
///
/// # Arguments
/// - `--listen ADDR`: TCP address to bind to (default: 127.0.0.1:8080)
/// - `--max-handlers N`: Bound on concurrently executing request handlers
/// - `--root DIR`: Directory that non-query requests are served from
///
/// # Example Usage
/// ```bash
/// cargo run -- --listen 127.0.0.1:8080 --max-handlers 20 --root ./data
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let matches = Command::new("rust_csv_db")
        .about("In-memory CSV database with SQL-like queries, blocking reads, and lazy remote loading")
        .arg(
            Arg::new("listen")
                .long("listen")
                .value_name("ADDR")
                .default_value("127.0.0.1:8080")
                .help("Listen address for the TCP server"),
        )
        .arg(
            Arg::new("max-handlers")
                .long("max-handlers")
                .value_name("N")
                .default_value("20")
                .help("Maximum number of concurrently executing request handlers"),
        )
        .arg(
            Arg::new("root")
                .long("root")
                .value_name("DIR")
                .default_value(".")
                .help("Directory to serve static file requests from"),
        )
        .get_matches();

    let listen = matches.get_one::<String>("listen").unwrap().to_string();
    let max_handlers: usize = matches.get_one::<String>("max-handlers").unwrap().parse()?;
    let root = matches.get_one::<String>("root").unwrap().to_string();

    // Initialize structured logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // The engine starts empty; tables are loaded on first reference.
    let engine = Arc::new(Engine::new());

    // Start the TCP server
    serve(engine, &listen, max_handlers, root.into()).await
}
