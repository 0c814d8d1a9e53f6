//! TCP connection establishment.
//!
//! # Responsibilities
//! - Resolve and connect to (host, port)
//! - Apply the per-attempt connect timeout
//! - Retry up to the configured number of attempts
//!
//! A timed-out attempt counts separately from a refused one: when every
//! attempt timed out the caller sees `ConnectTimeout`, otherwise the last
//! I/O error is surfaced as `Connect`.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::Error;

/// Connect to `host:port`, retrying up to `attempts` times with
/// `connect_timeout` applied to each attempt.
pub async fn connect_with_retries(
    host: &str,
    port: u16,
    connect_timeout: Duration,
    attempts: u32,
) -> Result<TcpStream, Error> {
    let mut timeout_fails = 0u32;
    let mut last_error: Option<std::io::Error> = None;

    for attempt in 1..=attempts {
        match timeout(connect_timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => {
                // Interactive request/response traffic; let the engine
                // batch writes, not the kernel.
                let _ = stream.set_nodelay(true);
                return Ok(stream);
            }
            Ok(Err(e)) => {
                tracing::debug!(
                    host = %host,
                    port = port,
                    attempt = attempt,
                    error = %e,
                    "connect attempt failed"
                );
                last_error = Some(e);
            }
            Err(_) => {
                tracing::debug!(
                    host = %host,
                    port = port,
                    attempt = attempt,
                    timeout_ms = connect_timeout.as_millis() as u64,
                    "connect attempt timed out"
                );
                timeout_fails += 1;
            }
        }
    }

    if timeout_fails == attempts {
        return Err(Error::ConnectTimeout { attempts });
    }

    Err(Error::Connect {
        host: host.to_string(),
        port,
        source: last_error.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::TimedOut, "connect attempts exhausted")
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refused_connection_reports_connect_error() {
        // Bind-then-drop gives a port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = connect_with_retries("127.0.0.1", port, Duration::from_secs(1), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connect { .. }));
    }

    #[tokio::test]
    async fn successful_connect() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let stream = connect_with_retries("127.0.0.1", port, Duration::from_secs(1), 1)
            .await
            .unwrap();
        assert!(stream.peer_addr().is_ok());
    }
}
