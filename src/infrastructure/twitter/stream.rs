//! Filtered stream framing

use futures_util::{Stream, StreamExt};

use super::wire::StreamEnvelope;
use crate::application::errors::SocialError;
use crate::domain::entities::StreamEvent;
use crate::domain::traits::EventStream;

/// Parse one line of the stream; keep-alive newlines yield Ok(None)
pub fn parse_stream_line(line: &str) -> Result<Option<StreamEvent>, SocialError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let envelope: StreamEnvelope =
        serde_json::from_str(line).map_err(|e| SocialError::Parse(e.to_string()))?;
    if let Some(error) = envelope.errors.first() {
        if envelope.data.is_none() {
            return Err(SocialError::Api { status: 200, message: error.describe() });
        }
    }
    Ok(envelope.into_event())
}

/// Split a chunked body into newline-delimited events
pub fn ndjson_events<S, B, E>(body: S) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<SocialError> + Send + 'static,
{
    let lines = futures_util::stream::unfold((body.boxed(), Vec::new()), |(mut body, mut buf)| async move {
        loop {
            if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                return Some((Ok(line), (body, buf)));
            }
            match body.next().await {
                Some(Ok(chunk)) => buf.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => return Some((Err(e.into()), (body, buf))),
                None if buf.is_empty() => return None,
                // Last line without a trailing newline
                None => return Some((Ok(std::mem::take(&mut buf)), (body, buf))),
            }
        }
    });

    lines
        .filter_map(|line| async move {
            match line {
                Ok(bytes) => parse_stream_line(&String::from_utf8_lossy(&bytes)).transpose(),
                Err(e) => Some(Err(e)),
            }
        })
        .boxed()
}
