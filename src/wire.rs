use std::io;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Semaphore;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, warn};
use ulid::Ulid;

use crate::limits::MAX_LINE_LENGTH;
use crate::request::{OverlapService, Response};

/// Serve one connection: newline-delimited JSON requests in, one JSON
/// response line out per request, in order. Blank lines are skipped.
///
/// An over-long line or one that is not UTF-8 is answered with a 400 and ends
/// the connection, since the framed stream yields nothing after a decode error.
pub async fn process_connection<S>(
    socket: S,
    service: Arc<OverlapService>,
) -> Result<(), LinesCodecError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut lines = Framed::new(socket, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

    while let Some(next) = lines.next().await {
        let line = match next {
            Ok(line) => line,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                warn!("request line exceeds {MAX_LINE_LENGTH} bytes, closing");
                let response = Response::error(Ulid::new(), 400, "request line too long");
                lines.send(response.to_line()).await?;
                return Ok(());
            }
            Err(LinesCodecError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
                warn!("request line is not valid UTF-8, closing");
                let response = Response::error(Ulid::new(), 400, "room_id is required");
                lines.send(response.to_line()).await?;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if line.trim().is_empty() {
            continue;
        }

        let response = service.handle(&line).await;
        lines.send(response.to_line()).await?;
    }

    debug!("connection closed by peer");
    Ok(())
}

/// Wait until every connection permit is back on `semaphore` or `timeout`
/// elapses. Returns how many connections were still open.
pub async fn drain_connections(semaphore: &Semaphore, max_connections: usize, timeout: Duration) -> usize {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let open = max_connections.saturating_sub(semaphore.available_permits());
        if open == 0 || tokio::time::Instant::now() >= deadline {
            return open;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
