use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::info;

use crate::error::{Error, Result};

use super::table::Table;

/// Loads a table from a remote `http://host[:port]/path` CSV source.
///
/// Issues a minimal GET exchange: request line plus `Host` and
/// `Connection: Close` headers, then validates the status line, skips the
/// response headers, and hands the remaining body to `Table::parse`.
pub async fn load(url: &str) -> Result<Table> {
    let (host, port, path) = break_down_url(url)?;
    let body = fetch(&host, port, &path).await?;
    info!(%url, bytes = body.len(), "remote CSV fetched");
    Table::parse(&body)
}

/// Splits `http://host[:port]/path` into its three parts.
///
/// The port defaults to 80 and the path to `/` when omitted.
pub(crate) fn break_down_url(url: &str) -> Result<(String, u16, String)> {
    let rest = url
        .strip_prefix("http://")
        .ok_or_else(|| Error::Parse(format!("unsupported URL '{url}'")))?;
    let (authority, path) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, "/"),
    };
    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| Error::Parse(format!("bad port in URL '{url}'")))?;
            (host, port)
        }
        None => (authority, 80),
    };
    if host.is_empty() {
        return Err(Error::Parse(format!("missing host in URL '{url}'")));
    }
    Ok((host.to_string(), port, path.to_string()))
}

/// Performs the GET exchange and returns the response body.
///
/// With `Connection: Close` on the request, the body is simply the rest of
/// the stream after the header block.
async fn fetch(host: &str, port: u16, path: &str) -> Result<String> {
    let stream = TcpStream::connect((host, port))
        .await
        .map_err(|_| Error::Connect {
            host: host.to_string(),
            port,
        })?;
    let mut stream = BufReader::new(stream);

    let request = format!("GET {path} HTTP/1.1\r\nHost: {host}\r\nConnection: Close\r\n\r\n");
    stream.get_mut().write_all(request.as_bytes()).await?;

    // The status line decides success; everything up to the blank line is
    // header noise to be skipped.
    let mut status = String::new();
    stream.read_line(&mut status).await?;
    if !status.contains("200 OK") {
        return Err(Error::RemoteStatus {
            status: status.trim().to_string(),
            path: path.to_string(),
            host: host.to_string(),
            port,
        });
    }
    let mut line = String::new();
    loop {
        line.clear();
        let n = stream.read_line(&mut line).await?;
        if n == 0 || line == "\r\n" || line == "\n" {
            break;
        }
    }

    let mut body = String::new();
    stream.read_to_string(&mut body).await?;
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_with_port_and_path() {
        let (host, port, path) = break_down_url("http://data.example.org:8080/sets/people.csv").unwrap();
        assert_eq!(host, "data.example.org");
        assert_eq!(port, 8080);
        assert_eq!(path, "/sets/people.csv");
    }

    #[test]
    fn url_defaults() {
        let (host, port, path) = break_down_url("http://example.org").unwrap();
        assert_eq!(host, "example.org");
        assert_eq!(port, 80);
        assert_eq!(path, "/");
    }

    #[test]
    fn non_http_url_is_rejected() {
        assert!(break_down_url("ftp://example.org/x.csv").is_err());
        assert!(break_down_url("http://:80/x.csv").is_err());
        assert!(break_down_url("http://example.org:notaport/x.csv").is_err());
    }
}
