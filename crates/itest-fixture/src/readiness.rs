//! Readiness probing for started services.

use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{FixtureError, Result};
use crate::spec::Readiness;

/// How long one probe waits for the connection and then for the peer to
/// either talk or hang up.
pub const PROBE_WINDOW: Duration = Duration::from_millis(250);

/// One attempt at `host:port`.
///
/// Docker's port proxy accepts connections before the service inside the
/// container listens and then closes them, so a connection that hits EOF (or
/// a reset) inside the window is not ready. A greeting, or silence for the
/// whole window, is.
pub async fn probe(host: &str, port: u16, window: Duration) -> bool {
    let mut stream = match tokio::time::timeout(window, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(err)) => {
            debug!(host, port, error = %err, "Probe connect failed");
            return false;
        }
        Err(_) => {
            debug!(host, port, "Probe connect timed out");
            return false;
        }
    };

    let mut buf = [0u8; 1];
    match tokio::time::timeout(window, stream.read(&mut buf)).await {
        Ok(Ok(0)) => {
            debug!(host, port, "Probe connection closed by peer");
            false
        }
        Ok(Ok(_)) => true,
        Ok(Err(err)) => {
            debug!(host, port, error = %err, "Probe read failed");
            false
        }
        Err(_) => true,
    }
}

/// Poll `readiness` every `poll_interval` until it holds or `timeout`
/// elapses.
pub async fn wait_until_ready(
    host: &str,
    readiness: Readiness,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let Readiness::PortAcceptsConnection { port } = readiness;
    let deadline = Instant::now() + timeout;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        if probe(host, port, PROBE_WINDOW).await {
            debug!(host, port, attempts, "Service is ready");
            return Ok(());
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(FixtureError::ReadinessTimeout {
                host: host.to_string(),
                port,
                waited: timeout,
            });
        }
        tokio::time::sleep(poll_interval.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    async fn free_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_greeting_is_ready() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let _ = socket.write_all(b"220 ready\r\n").await;
            }
        });

        assert!(probe("127.0.0.1", port, PROBE_WINDOW).await);
    }

    #[tokio::test]
    async fn test_silent_listener_is_ready() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let holder = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
            drop(socket);
        });

        assert!(probe("127.0.0.1", port, Duration::from_millis(100)).await);
        holder.abort();
    }

    #[tokio::test]
    async fn test_immediate_close_is_not_ready() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                drop(socket);
            }
        });

        assert!(!probe("127.0.0.1", port, PROBE_WINDOW).await);
    }

    #[tokio::test]
    async fn test_closed_port_times_out() {
        let port = free_port().await;
        let err = wait_until_ready(
            "127.0.0.1",
            Readiness::PortAcceptsConnection { port },
            Duration::from_millis(300),
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();

        assert!(
            matches!(err, FixtureError::ReadinessTimeout { port: p, .. } if p == port),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn test_becomes_ready_after_late_bind() {
        let port = free_port().await;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
            while let Ok((mut socket, _)) = listener.accept().await {
                let _ = socket.write_all(b"220 late\r\n").await;
            }
        });

        wait_until_ready(
            "127.0.0.1",
            Readiness::PortAcceptsConnection { port },
            Duration::from_secs(5),
            Duration::from_millis(50),
        )
        .await
        .unwrap();
    }
}
