use crate::{engine::Engine, sql::plan_and_exec};
use anyhow::Result;
use std::{path::Path, path::PathBuf, sync::Arc};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::tcp::OwnedWriteHalf,
    net::TcpListener,
    sync::Semaphore,
};
use tracing::{error, info};

/// Target prefix that marks a request as a query rather than a file fetch.
const QUERY_PREFIX: &str = "/sql?query=";

/// Fixed response header used for every successful response. Only the
/// Content-Length value varies per response.
const RESPONSE_HEADER: &str = "HTTP/1.1 200 OK\r\n\
    Server: localhost\r\n\
    Connection: Close\r\n\
    Content-Type: text/plain\r\n\
    Content-Length: ";

/// Starts the request server and handles client connections.
///
/// The server implements a line-oriented HTTP-style protocol:
///
/// ## Protocol Features
/// - **One request per connection**: the response carries
///   `Connection: Close` and the socket is dropped after writing
/// - **Query requests**: a target of the form `/sql?query=<statement>`
///   (URL-encoded) runs the statement against the shared engine
/// - **File requests**: any other target is served from the static root
/// - **Error handling**: any engine failure becomes a one-line
///   `Error: <message>` body inside a normal 200 response
///
/// ## Concurrency
/// Connections are accepted without bound, but at most `max_handlers`
/// handler tasks execute at once. The admission gate is a semaphore whose
/// permit is acquired *after* accept and *before* the handler task is
/// spawned, so excess connections queue at the gate rather than in a
/// half-spawned handler; the permit travels into the task and is released
/// when the handler finishes.
///
/// ## Arguments
/// * `engine` - Shared engine instance (Arc for multi-task use)
/// * `addr` - TCP bind address (e.g., "127.0.0.1:8080")
/// * `max_handlers` - Bound on concurrently executing handlers
/// * `root` - Directory static file requests are served from
pub async fn serve(
    engine: Arc<Engine>,
    addr: &str,
    max_handlers: usize,
    root: PathBuf,
) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, max_handlers, "listening");
    let gate = Arc::new(Semaphore::new(max_handlers));

    loop {
        // Accept first; admission control applies to handler execution,
        // not to the accept queue.
        let (socket, peer) = listener.accept().await?;
        let permit = gate.clone().acquire_owned().await?;

        let engine = engine.clone();
        let root = root.clone();
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = handle_client(engine, socket, &root).await {
                error!(error = %e, ?peer, "client handler failed");
            }
        });
    }
}

/// Handles one client connection: decode the request, dispatch, respond.
///
/// Reads the request line, discards headers up to the blank line, and
/// URL-decodes the target. A query target is stripped of its prefix and
/// trailing semicolon and handed to the statement pipeline; anything else
/// is treated as a static file path.
async fn handle_client(
    engine: Arc<Engine>,
    socket: tokio::net::TcpStream,
    root: &Path,
) -> std::io::Result<()> {
    let (r, mut w) = socket.into_split();
    let mut reader = BufReader::new(r);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;
    let target = request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or("/")
        .to_string();

    // Skip the remaining request headers. Without this, browsers that
    // pipeline headers behind the request line would wedge the connection.
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 || line == "\r\n" || line == "\n" {
            break;
        }
    }

    let target = url_decode(&target);
    if let Some(raw) = target.strip_prefix(QUERY_PREFIX) {
        let statement = raw.trim();
        let statement = statement.strip_suffix(';').unwrap_or(statement);
        let body = match plan_and_exec(&engine, statement).await {
            Ok(out) => out,
            Err(e) => format!("Error: {e}\n"),
        };
        w.write_all(format!("{RESPONSE_HEADER}{}\r\n\r\n", body.len()).as_bytes())
            .await?;
        w.write_all(body.as_bytes()).await?;
    } else {
        serve_file(&mut w, root, &target).await?;
    }
    Ok(())
}

/// Minimal static-file responder for non-query targets.
///
/// Serves the target path relative to the configured root. Missing files
/// (and targets trying to climb out of the root) get a plain 404.
async fn serve_file(w: &mut OwnedWriteHalf, root: &Path, target: &str) -> std::io::Result<()> {
    let rel = target.trim_start_matches('/');
    let escapes_root = Path::new(rel)
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir));

    let contents = if escapes_root {
        None
    } else {
        tokio::fs::read(root.join(rel)).await.ok()
    };

    match contents {
        Some(bytes) => {
            let header = format!(
                "HTTP/1.1 200 OK\r\n\
                 Server: localhost\r\n\
                 Connection: Close\r\n\
                 Content-Type: {}\r\n\
                 Content-Length: {}\r\n\r\n",
                content_type(rel),
                bytes.len()
            );
            w.write_all(header.as_bytes()).await?;
            w.write_all(&bytes).await?;
        }
        None => {
            let body = format!("The requested file '{target}' was not found.\n");
            let header = format!(
                "HTTP/1.1 404 Not Found\r\n\
                 Server: localhost\r\n\
                 Connection: Close\r\n\
                 Content-Type: text/plain\r\n\
                 Content-Length: {}\r\n\r\n",
                body.len()
            );
            w.write_all(header.as_bytes()).await?;
            w.write_all(body.as_bytes()).await?;
        }
    }
    Ok(())
}

fn content_type(path: &str) -> &'static str {
    match Path::new(path).extension().and_then(|e| e.to_str()) {
        Some("html") | Some("htm") => "text/html",
        _ => "text/plain",
    }
}

/// Decodes a URL-encoded target: `+` becomes a space and `%XX` becomes the
/// byte it names. A `%` not followed by two hex digits passes through
/// unchanged rather than failing the whole request.
fn url_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(value) => {
                        out.push(value);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
