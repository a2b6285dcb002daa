//! Incremental server-sent-events decoding.
//!
//! Only the `data` field is interpreted. Each dispatched event with
//! non-empty data becomes one text chunk.

use bytes::Bytes;
use futures::{Stream, StreamExt, stream};
use std::collections::VecDeque;

use crate::error::{GenerationError, Result};

/// Line-oriented SSE decoder fed with raw network reads.
///
/// Bytes are buffered until a full line is available, so multi-byte UTF-8
/// sequences split across reads are reassembled before decoding.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one read and return the data of every event it completed.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>> {
        self.buf.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(line) = self.next_line() {
            let line = String::from_utf8(line)?;
            if let Some(data) = self.feed_line(&line) {
                events.push(data);
            }
        }
        Ok(events)
    }

    /// Flush at end of stream: a trailing line without a newline is
    /// processed and a pending event is dispatched.
    pub fn finish(mut self) -> Result<Option<String>> {
        if !self.buf.is_empty() {
            let mut line = String::from_utf8(std::mem::take(&mut self.buf))?;
            if line.ends_with('\r') {
                line.pop();
            }
            if let Some(data) = self.feed_line(&line) {
                return Ok(Some(data));
            }
        }
        Ok(self.dispatch())
    }

    // Take one complete line off the buffer. Lines end in LF, CRLF or a
    // bare CR; a CR at the very end waits for the next read in case an LF
    // follows.
    fn next_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.buf.iter().position(|&b| b == b'\n' || b == b'\r')?;
        let terminator = if self.buf[pos] == b'\r' {
            match self.buf.get(pos + 1) {
                Some(b'\n') => 2,
                Some(_) => 1,
                None => return None,
            }
        } else {
            1
        };

        let mut line: Vec<u8> = self.buf.drain(..pos + terminator).collect();
        line.truncate(pos);
        Some(line)
    }

    fn feed_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }
        // comment / keep-alive
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        // event, id, retry and unknown fields are ignored
        if field == "data" {
            self.data.push(value.to_string());
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        let data = self.data.join("\n");
        self.data.clear();
        if data.is_empty() { None } else { Some(data) }
    }
}

/// Turn a body byte stream into an ordered stream of event payloads.
///
/// The stream ends after the body ends or after the first error, which is
/// yielded as the final item.
pub fn data_stream<S, E>(input: S) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    GenerationError: From<E>,
{
    let state = Some((input, SseDecoder::new(), VecDeque::new()));

    stream::unfold(state, |state| async move {
        let (mut input, mut decoder, mut pending) = state?;

        loop {
            if let Some(data) = pending.pop_front() {
                return Some((Ok(data), Some((input, decoder, pending))));
            }

            match input.next().await {
                Some(Ok(bytes)) => match decoder.push(&bytes) {
                    Ok(events) => pending.extend(events),
                    Err(e) => return Some((Err(e), None)),
                },
                Some(Err(e)) => return Some((Err(GenerationError::from(e)), None)),
                None => {
                    return match decoder.finish() {
                        Ok(Some(data)) => Some((Ok(data), None)),
                        Ok(None) => None,
                        Err(e) => Some((Err(e), None)),
                    };
                }
            }
        }
    })
}
