//! STOMP 1.2 frame encoding.
//!
//! ```text
//! COMMAND
//! header1:value1
//! header2:value2
//!
//! body^@
//! ```
//!
//! Header names and values escape `\r`, `\n`, `:` and `\` except in the
//! `CONNECT` and `CONNECTED` frames. Bodies are delimited by `content-length`
//! when present, by the NUL octet otherwise. Bare end-of-line octets between
//! frames are heart-beats and are skipped.

use crate::broker::BrokerError;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("Stream ended in the middle of a frame")]
    Truncated,
    #[error("Header line without a ':' separator: '{0}'")]
    InvalidHeader(String),
    #[error("Undefined escape sequence in header '{0}'")]
    InvalidEscape(String),
    #[error("Invalid content-length '{0}'")]
    InvalidContentLength(String),
    #[error("Frame body is not followed by a NUL octet")]
    MissingTerminator,
    #[error("Frame body exceeds {} bytes", MAX_BODY_LENGTH)]
    TooLarge,
    #[error("Frame is not valid UTF-8")]
    NotUtf8,
}

/// Largest body accepted from the broker.
pub const MAX_BODY_LENGTH: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Frame {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Value of a header. When a header repeats, the first occurrence wins.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn body_text(&self) -> Result<&str, FrameError> {
        std::str::from_utf8(&self.body).map_err(|_| FrameError::NotUtf8)
    }

    fn escapes_headers(&self) -> bool {
        !matches!(self.command.as_str(), "CONNECT" | "CONNECTED")
    }

    pub fn encode(&self) -> Vec<u8> {
        let escaped = self.escapes_headers();
        let mut out = Vec::with_capacity(self.body.len() + 64);
        out.extend_from_slice(self.command.as_bytes());
        out.push(b'\n');
        for (name, value) in &self.headers {
            if escaped {
                out.extend_from_slice(escape(name).as_bytes());
                out.push(b':');
                out.extend_from_slice(escape(value).as_bytes());
            } else {
                out.extend_from_slice(name.as_bytes());
                out.push(b':');
                out.extend_from_slice(value.as_bytes());
            }
            out.push(b'\n');
        }
        if !self.body.is_empty() && self.get("content-length").is_none() {
            out.extend_from_slice(format!("content-length:{}\n", self.body.len()).as_bytes());
        }
        out.push(b'\n');
        out.extend_from_slice(&self.body);
        out.push(0);
        out
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(raw: &str) -> Result<String, FrameError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('c') => out.push(':'),
            _ => return Err(FrameError::InvalidEscape(raw.to_string())),
        }
    }
    Ok(out)
}

async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<Option<String>> {
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf).await? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    String::from_utf8(buf)
        .map(Some)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Reads the next frame, or `None` if the stream ended between frames.
pub async fn read_frame<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Option<Frame>, BrokerError> {
    let command = loop {
        match read_line(reader).await? {
            None => return Ok(None),
            Some(line) if line.is_empty() => continue,
            Some(line) => break line,
        }
    };

    let mut frame = Frame::new(command);
    let escaped = frame.escapes_headers();
    loop {
        let line = read_line(reader).await?.ok_or(FrameError::Truncated)?;
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| FrameError::InvalidHeader(line.clone()))?;
        let header = if escaped {
            (unescape(name)?, unescape(value)?)
        } else {
            (name.to_string(), value.to_string())
        };
        frame.headers.push(header);
    }

    match frame.get("content-length").map(str::to_string) {
        Some(length) => {
            let length: usize = length
                .trim()
                .parse()
                .ok()
                .filter(|&length| length <= MAX_BODY_LENGTH)
                .ok_or_else(|| FrameError::InvalidContentLength(length.clone()))?;
            let mut body = Vec::with_capacity(length.min(8 * 1024));
            (&mut *reader).take(length as u64).read_to_end(&mut body).await?;
            if body.len() < length {
                return Err(FrameError::Truncated.into());
            }
            let terminator = reader.read_u8().await.map_err(|_| FrameError::Truncated)?;
            if terminator != 0 {
                return Err(FrameError::MissingTerminator.into());
            }
            frame.body = body;
        }
        None => {
            let mut body = Vec::new();
            (&mut *reader)
                .take(MAX_BODY_LENGTH as u64 + 1)
                .read_until(0, &mut body)
                .await?;
            if body.pop() != Some(0) {
                let error = if body.len() >= MAX_BODY_LENGTH {
                    FrameError::TooLarge
                } else {
                    FrameError::Truncated
                };
                return Err(error.into());
            }
            frame.body = body;
        }
    }
    Ok(Some(frame))
}

pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &Frame) -> Result<(), BrokerError> {
    writer.write_all(&frame.encode()).await?;
    writer.flush().await?;
    Ok(())
}
