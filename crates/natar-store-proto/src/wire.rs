// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Framing for the store's text/binary reply protocol (RESP2).
//!
//! Every frame starts with a one-byte marker and a CRLF-terminated header line:
//!
//! ``+status\r\n`` · ``-error\r\n`` · ``:integer\r\n`` ·
//! ``$len\r\n<len bytes>\r\n`` · ``*count\r\n<count frames>``
//!
//! Commands travel as arrays of bulk strings, so the same decoder reads both
//! directions. Decoding never consumes a partial frame: callers keep
//! accumulating bytes until [`decode_reply`] returns a complete frame.

use thiserror::Error;

/// Largest bulk payload accepted from the wire (depth and color frames fit easily).
pub const MAX_BULK_LEN: usize = 64 * 1024 * 1024;
/// Largest array accepted from the wire.
pub const MAX_ARRAY_LEN: usize = 1024 * 1024;
/// Nesting limit for arrays (replies used by the client nest at most twice).
pub const MAX_DEPTH: usize = 8;

/// Framing errors. A decoder that hits one of these has lost sync and the
/// connection must be dropped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    /// First byte of a frame is not a known marker.
    #[error("unknown frame marker 0x{0:02x}")]
    UnknownMarker(u8),
    /// Length or integer header is not a decimal number.
    #[error("malformed header line: {0:?}")]
    BadHeader(String),
    /// Declared bulk or array length exceeds the configured ceiling.
    #[error("declared length {0} exceeds limit")]
    TooLarge(usize),
    /// Arrays nest deeper than [`MAX_DEPTH`].
    #[error("arrays nested deeper than {MAX_DEPTH}")]
    TooDeep,
    /// A CR was not followed by LF, or a bulk body was not CRLF-terminated.
    #[error("missing CRLF terminator")]
    MissingTerminator,
    /// Status or error line is not valid UTF-8.
    #[error("status line is not utf-8")]
    Utf8,
}

/// A single decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+OK` style status line.
    Status(String),
    /// `-ERR ...` line reported by the server.
    Error(String),
    /// `:n` integer.
    Integer(i64),
    /// `$len` bulk string; `None` for the nil bulk (`$-1`).
    Bulk(Option<Vec<u8>>),
    /// `*count` array; `None` for the nil array (`*-1`).
    Array(Option<Vec<Reply>>),
}

impl Reply {
    /// Bulk payload bytes, or the status line bytes; `None` for nil and other kinds.
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Reply::Bulk(data) => data,
            Reply::Status(s) => Some(s.into_bytes()),
            _ => None,
        }
    }

    /// Bulk or status payload read as UTF-8 text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Reply::Bulk(Some(data)) => std::str::from_utf8(data).ok(),
            Reply::Status(s) => Some(s),
            _ => None,
        }
    }

    /// Append the wire form of this frame to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Reply::Status(s) => push_line(out, b'+', s.as_bytes()),
            Reply::Error(s) => push_line(out, b'-', s.as_bytes()),
            Reply::Integer(n) => push_line(out, b':', n.to_string().as_bytes()),
            Reply::Bulk(None) => out.extend_from_slice(b"$-1\r\n"),
            Reply::Bulk(Some(data)) => push_bulk(out, data),
            Reply::Array(None) => out.extend_from_slice(b"*-1\r\n"),
            Reply::Array(Some(items)) => {
                push_line(out, b'*', items.len().to_string().as_bytes());
                for item in items {
                    item.encode(out);
                }
            }
        }
    }
}

/// Encode a command as an array of bulk strings.
pub fn encode_command(args: &[&[u8]]) -> Vec<u8> {
    let body: usize = args.iter().map(|a| a.len() + 16).sum();
    let mut out = Vec::with_capacity(16 + body);
    push_line(&mut out, b'*', args.len().to_string().as_bytes());
    for arg in args {
        push_bulk(&mut out, arg);
    }
    out
}

/// Decode one frame from the front of `buf`.
///
/// Returns `Ok(None)` when `buf` holds only a prefix of a frame, otherwise the
/// frame and the number of bytes it occupied.
pub fn decode_reply(buf: &[u8]) -> Result<Option<(Reply, usize)>, WireError> {
    parse(buf, 0, 0)
}

fn parse(buf: &[u8], pos: usize, depth: usize) -> Result<Option<(Reply, usize)>, WireError> {
    let Some(&marker) = buf.get(pos) else {
        return Ok(None);
    };
    let Some((line, next)) = read_line(buf, pos + 1)? else {
        return Ok(None);
    };
    match marker {
        b'+' => Ok(Some((Reply::Status(utf8(line)?), next))),
        b'-' => Ok(Some((Reply::Error(utf8(line)?), next))),
        b':' => Ok(Some((Reply::Integer(parse_int(line)?), next))),
        b'$' => {
            let declared = parse_int(line)?;
            if declared < 0 {
                return Ok(Some((Reply::Bulk(None), next)));
            }
            let len = declared as usize;
            if len > MAX_BULK_LEN {
                return Err(WireError::TooLarge(len));
            }
            let end = next + len;
            if buf.len() < end + 2 {
                return Ok(None);
            }
            if &buf[end..end + 2] != b"\r\n" {
                return Err(WireError::MissingTerminator);
            }
            Ok(Some((Reply::Bulk(Some(buf[next..end].to_vec())), end + 2)))
        }
        b'*' => {
            let declared = parse_int(line)?;
            if declared < 0 {
                return Ok(Some((Reply::Array(None), next)));
            }
            let count = declared as usize;
            if count > MAX_ARRAY_LEN {
                return Err(WireError::TooLarge(count));
            }
            if depth >= MAX_DEPTH {
                return Err(WireError::TooDeep);
            }
            let mut items = Vec::with_capacity(count.min(64));
            let mut cursor = next;
            for _ in 0..count {
                match parse(buf, cursor, depth + 1)? {
                    Some((item, used)) => {
                        items.push(item);
                        cursor = used;
                    }
                    None => return Ok(None),
                }
            }
            Ok(Some((Reply::Array(Some(items)), cursor)))
        }
        other => Err(WireError::UnknownMarker(other)),
    }
}

/// Header line starting at `start`, without its CRLF, plus the offset after it.
fn read_line(buf: &[u8], start: usize) -> Result<Option<(&[u8], usize)>, WireError> {
    let rest = buf.get(start..).unwrap_or_default();
    let Some(cr) = rest.iter().position(|&b| b == b'\r') else {
        return Ok(None);
    };
    match rest.get(cr + 1) {
        None => Ok(None),
        Some(b'\n') => Ok(Some((&rest[..cr], start + cr + 2))),
        Some(_) => Err(WireError::MissingTerminator),
    }
}

fn parse_int(line: &[u8]) -> Result<i64, WireError> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| WireError::BadHeader(String::from_utf8_lossy(line).into_owned()))
}

fn utf8(line: &[u8]) -> Result<String, WireError> {
    std::str::from_utf8(line)
        .map(str::to_owned)
        .map_err(|_| WireError::Utf8)
}

fn push_line(out: &mut Vec<u8>, marker: u8, body: &[u8]) {
    out.push(marker);
    out.extend_from_slice(body);
    out.extend_from_slice(b"\r\n");
}

fn push_bulk(out: &mut Vec<u8>, data: &[u8]) {
    push_line(out, b'$', data.len().to_string().as_bytes());
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
}

// --- Unit tests -----------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_layout_matches_vector() {
        let bytes = encode_command(&[b"GET", b"camera0:width"]);
        assert_eq!(bytes, b"*2\r\n$3\r\nGET\r\n$13\r\ncamera0:width\r\n".to_vec());
    }

    #[test]
    fn decodes_scalar_frames() {
        assert_eq!(
            decode_reply(b"+OK\r\n").unwrap(),
            Some((Reply::Status("OK".into()), 5))
        );
        assert_eq!(
            decode_reply(b":-42\r\n").unwrap(),
            Some((Reply::Integer(-42), 6))
        );
        assert_eq!(
            decode_reply(b"$-1\r\n").unwrap(),
            Some((Reply::Bulk(None), 5))
        );
        assert_eq!(
            decode_reply(b"-ERR unknown\r\n").unwrap(),
            Some((Reply::Error("ERR unknown".into()), 14))
        );
    }

    #[test]
    fn bulk_body_may_contain_crlf() {
        let (reply, used) = decode_reply(b"$4\r\n\r\n\r\n\r\n").unwrap().unwrap();
        assert_eq!(reply, Reply::Bulk(Some(b"\r\n\r\n".to_vec())));
        assert_eq!(used, 10);
    }

    #[test]
    fn partial_frames_are_not_consumed() {
        let full = b"*3\r\n$7\r\nmessage\r\n$7\r\ncamera0\r\n$3\r\n\x01\x02\x03\r\n";
        for cut in 0..full.len() {
            assert_eq!(decode_reply(&full[..cut]).unwrap(), None, "cut at {cut}");
        }
        let (reply, used) = decode_reply(full).unwrap().unwrap();
        assert_eq!(used, full.len());
        assert!(matches!(reply, Reply::Array(Some(ref items)) if items.len() == 3));
    }

    #[test]
    fn trailing_bytes_belong_to_the_next_frame() {
        let (first, used) = decode_reply(b"+OK\r\n:1\r\n").unwrap().unwrap();
        assert_eq!(first, Reply::Status("OK".into()));
        assert_eq!(
            decode_reply(&b"+OK\r\n:1\r\n"[used..]).unwrap(),
            Some((Reply::Integer(1), 4))
        );
    }

    #[test]
    fn rejects_desynchronized_input() {
        assert_eq!(decode_reply(b"?\r\n"), Err(WireError::UnknownMarker(b'?')));
        assert_eq!(
            decode_reply(b"$abc\r\n"),
            Err(WireError::BadHeader("abc".into()))
        );
        assert_eq!(decode_reply(b"+OK\rX"), Err(WireError::MissingTerminator));
        assert_eq!(decode_reply(b"$2\r\nabcd"), Err(WireError::MissingTerminator));
        let huge = format!("${}\r\n", MAX_BULK_LEN + 1);
        assert_eq!(
            decode_reply(huge.as_bytes()),
            Err(WireError::TooLarge(MAX_BULK_LEN + 1))
        );
    }

    #[test]
    fn nesting_is_bounded() {
        let nested = "*1\r\n".repeat(MAX_DEPTH + 1);
        assert_eq!(decode_reply(nested.as_bytes()), Err(WireError::TooDeep));
    }

    #[test]
    fn encoded_push_decodes_to_same_frame() {
        let push = Reply::Array(Some(vec![
            Reply::Bulk(Some(b"message".to_vec())),
            Reply::Bulk(Some(b"camera0:depth".to_vec())),
            Reply::Bulk(Some(vec![0, 1, 2, 255])),
        ]));
        let mut out = Vec::new();
        push.encode(&mut out);
        assert_eq!(decode_reply(&out).unwrap(), Some((push, out.len())));
    }
}
