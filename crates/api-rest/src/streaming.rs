//! Bridges blocking range bodies onto async HTTP bodies.

use axum::body::Body;
use axum::response::Response;
use std::io::{self, Read, Seek};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use vault_range::{RangeBody, RangeResponse};

/// Chunks buffered between the blocking reader and the connection.
const CHANNEL_DEPTH: usize = 4;

/// Turns a computed range response into an axum response with a streaming body.
pub fn into_http_response<R>(range: RangeResponse<R>) -> Response
where
    R: Read + Seek + Send + 'static,
{
    let RangeResponse {
        status,
        headers,
        body,
    } = range;

    let mut response = Response::new(stream_body(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Reads `body` on the blocking pool and forwards it chunk by chunk.
///
/// The reader stops as soon as the client goes away; the source is dropped with the body.
pub fn stream_body<R>(mut body: RangeBody<R>) -> Body
where
    R: Read + Seek + Send + 'static,
{
    if body.is_empty() {
        return Body::empty();
    }

    let (tx, rx) = mpsc::channel::<io::Result<Vec<u8>>>(CHANNEL_DEPTH);
    tokio::task::spawn_blocking(move || {
        let mut buf = vec![0u8; body.buffer_size().max(1)];
        loop {
            match body.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.blocking_send(Ok(buf[..n].to_vec())).is_err() {
                        tracing::debug!("client went away, stopping stream");
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!("stream read failed: {}", e);
                    let _ = tx.blocking_send(Err(e));
                    break;
                }
            }
        }
    });

    Body::from_stream(ReceiverStream::new(rx))
}
