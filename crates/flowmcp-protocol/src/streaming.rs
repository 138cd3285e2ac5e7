//! # Streaming response encoder
//!
//! Lazy producer for `resources/read` responses. Given an ordered list of
//! content streams it yields the byte slices of a syntactically valid
//! JSON-RPC response whose `result.contents` entries are built by draining
//! each stream chunk by chunk, so the payload is never materialized.
//!
//! A stream is binary iff its mime type does not start with `text/`. Binary
//! bodies are a concatenation of base64-encoded chunks; the chunk size must
//! be a multiple of 3 so base64 never pads mid-stream. Text bodies are the
//! JSON string encoding of each chunk with the surrounding quotes stripped;
//! chunks are re-split on UTF-8 boundaries so every yielded slice stays
//! valid UTF-8.

use std::io::{self, Cursor, Read};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;

use crate::error::ProtocolError;
use crate::jsonrpc::RequestId;

/// Default streaming chunk size.
///
/// Must be a multiple of 3 to ensure that base64 encoding doesn't add
/// padding characters (`=`) within the stream, only potentially at the
/// very end.
pub const CHUNK_SIZE: usize = 10 * 1024 + 2;

/// One `result.contents` entry: a URI, a mime type, and the byte source
pub struct ContentStream {
    /// URI advertised in the entry
    pub uri: String,
    /// Mime type advertised in the entry; decides binary vs text framing
    pub mime_type: String,
    reader: Box<dyn Read + Send>,
}

impl ContentStream {
    /// Entry reading from an arbitrary source
    pub fn from_reader(
        uri: impl Into<String>,
        mime_type: impl Into<String>,
        reader: Box<dyn Read + Send>,
    ) -> Self {
        Self {
            uri: uri.into(),
            mime_type: mime_type.into(),
            reader,
        }
    }

    /// Entry over an in-memory string
    pub fn from_text(uri: impl Into<String>, mime_type: impl Into<String>, text: String) -> Self {
        Self::from_reader(uri, mime_type, Box::new(Cursor::new(text.into_bytes())))
    }

    /// Entry over in-memory bytes
    pub fn from_bytes(uri: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self::from_reader(uri, mime_type, Box::new(Cursor::new(data)))
    }

    fn is_binary(&self) -> bool {
        !self.mime_type.starts_with("text/")
    }
}

impl std::fmt::Debug for ContentStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStream")
            .field("uri", &self.uri)
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Prefix,
    Header(usize),
    Body(usize),
    Close,
    Done,
}

/// Lazy `resources/read` response over a list of content streams.
///
/// Yields `io::Result<Bytes>`; the first read error ends the iteration
/// (the response cannot be completed once a stream fails mid-body).
/// Readers are owned by the iterator, so dropping it releases them on
/// every exit path.
pub struct StreamingResponse {
    id_json: String,
    streams: Vec<ContentStream>,
    chunk_size: usize,
    state: State,
    carry: Vec<u8>,
}

impl StreamingResponse {
    /// Response with the default chunk size
    pub fn new(id: &RequestId, streams: Vec<ContentStream>) -> Self {
        // CHUNK_SIZE is a multiple of 3 by construction.
        Self::with_chunk_size(id, streams, CHUNK_SIZE).expect("default chunk size is valid")
    }

    /// Response with an explicit chunk size.
    ///
    /// # Errors
    ///
    /// Rejects sizes that are zero or not a multiple of 3; base64 would
    /// otherwise pad mid-stream and corrupt binary bodies.
    pub fn with_chunk_size(
        id: &RequestId,
        streams: Vec<ContentStream>,
        chunk_size: usize,
    ) -> Result<Self, ProtocolError> {
        if chunk_size == 0 || chunk_size % 3 != 0 {
            return Err(ProtocolError::InvalidChunkSize(chunk_size));
        }

        Ok(Self {
            id_json: serde_json::to_string(id).unwrap_or_else(|_| "null".to_owned()),
            streams,
            chunk_size,
            state: State::Prefix,
            carry: Vec::new(),
        })
    }

    fn header(&self, index: usize) -> Bytes {
        let stream = &self.streams[index];
        let sep = if index == 0 { "" } else { "," };
        let key = if stream.is_binary() { "blob" } else { "text" };

        Bytes::from(format!(
            "{sep}{{\"uri\":\"{}\",\"mimeType\":\"{}\",\"{key}\":\"",
            escape_json(&stream.uri),
            escape_json(&stream.mime_type),
        ))
    }

    /// Read the next body chunk of the stream at `index`.
    ///
    /// Returns `None` at end of stream, after which the entry tail is due.
    fn body_chunk(&mut self, index: usize) -> io::Result<Option<Bytes>> {
        let chunk_size = self.chunk_size;
        let binary = self.streams[index].is_binary();

        let mut buf = Vec::with_capacity(chunk_size);
        buf.append(&mut self.carry);
        fill(&mut self.streams[index].reader, &mut buf, chunk_size)?;

        if buf.is_empty() {
            return Ok(None);
        }

        if binary {
            return Ok(Some(Bytes::from(BASE64.encode(&buf))));
        }

        // Text framing: hold back a trailing incomplete UTF-8 sequence for
        // the next chunk; a truncated or invalid sequence is a hard error.
        let valid_len = match std::str::from_utf8(&buf) {
            Ok(_) => buf.len(),
            Err(error) => {
                let valid = error.valid_up_to();
                if error.error_len().is_some() || valid + 4 < buf.len() {
                    return Err(invalid_utf8());
                }
                valid
            }
        };
        if valid_len < buf.len() {
            self.carry = buf.split_off(valid_len);
        }
        if buf.is_empty() {
            // No progress possible: the stream ended (or the chunk size is
            // too small to fit) an incomplete code point.
            return Err(invalid_utf8());
        }

        let text = std::str::from_utf8(&buf).map_err(|_| invalid_utf8())?;
        Ok(Some(Bytes::from(escape_json(text))))
    }
}

impl Iterator for StreamingResponse {
    type Item = io::Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.state {
                State::Prefix => {
                    self.state = if self.streams.is_empty() {
                        State::Close
                    } else {
                        State::Header(0)
                    };
                    return Some(Ok(Bytes::from(format!(
                        "{{\"jsonrpc\":\"2.0\",\"id\":{},\"result\":{{\"contents\":[",
                        self.id_json
                    ))));
                }
                State::Header(index) => {
                    self.state = State::Body(index);
                    self.carry.clear();
                    return Some(Ok(self.header(index)));
                }
                State::Body(index) => match self.body_chunk(index) {
                    Ok(Some(chunk)) => return Some(Ok(chunk)),
                    Ok(None) => {
                        self.state = if index + 1 < self.streams.len() {
                            State::Header(index + 1)
                        } else {
                            State::Close
                        };
                        return Some(Ok(Bytes::from_static(b"\"}")));
                    }
                    Err(error) => {
                        self.state = State::Done;
                        return Some(Err(error));
                    }
                },
                State::Close => {
                    self.state = State::Done;
                    return Some(Ok(Bytes::from_static(b"]}}")));
                }
                State::Done => return None,
            }
        }
    }
}

impl std::fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("id", &self.id_json)
            .field("streams", &self.streams.len())
            .field("chunk_size", &self.chunk_size)
            .field("state", &self.state)
            .finish()
    }
}

fn invalid_utf8() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, ProtocolError::InvalidUtf8)
}

/// JSON string encoding without the surrounding double quotes
fn escape_json(text: &str) -> String {
    let quoted = serde_json::to_string(text).unwrap_or_default();
    match quoted.len() {
        0 | 1 => String::new(),
        len => quoted[1..len - 1].to_owned(),
    }
}

/// Fill `buf` up to `target` bytes, stopping early only at end of stream
fn fill(reader: &mut (impl Read + ?Sized), buf: &mut Vec<u8>, target: usize) -> io::Result<()> {
    let mut chunk = [0u8; 4096];
    while buf.len() < target {
        let want = (target - buf.len()).min(chunk.len());
        match reader.read(&mut chunk[..want]) {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => return Err(error),
        }
    }

    Ok(())
}
