//! Turns raw byte deltas read from a growing file into complete text lines.
//!
//! Nothing here knows about files: the caller hands in the bytes it just read
//! together with the partial line left over from the previous read, and gets
//! back the finished lines plus the new leftover.

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const UTF16LE_BOM: &[u8] = b"\xFF\xFE";

/// Text encoding of a tracked file, decided from its byte order mark
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// Written by some game client versions, always with an `FF FE` mark
    Utf16Le,
}

impl TextEncoding {
    /// Pick the encoding from the first bytes of a file.
    pub fn detect(head: &[u8]) -> Self {
        if head.starts_with(UTF16LE_BOM) {
            TextEncoding::Utf16Le
        } else {
            TextEncoding::Utf8
        }
    }

    pub fn strip_bom(self, bytes: &[u8]) -> &[u8] {
        match self {
            TextEncoding::Utf8 => strip_bom(bytes),
            TextEncoding::Utf16Le => bytes.strip_prefix(UTF16LE_BOM).unwrap_or(bytes),
        }
    }

    pub fn split(self, pending: &[u8], delta: &[u8]) -> Split {
        match self {
            TextEncoding::Utf8 => split_lines(pending, delta),
            TextEncoding::Utf16Le => split_utf16le_lines(pending, delta),
        }
    }

    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Utf8 => decode_line(bytes),
            TextEncoding::Utf16Le => decode_utf16le_line(bytes),
        }
    }
}

/// Output of one splitting step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Split {
    /// Complete lines, without their `\n` / `\r\n` terminator
    pub lines: Vec<String>,
    /// Trailing bytes that did not end with a newline yet
    pub fragment: Vec<u8>,
}

/// Split `delta` into lines, prefixing the first one with `pending`.
pub fn split_lines(pending: &[u8], delta: &[u8]) -> Split {
    let mut lines = Vec::new();
    let mut carry = if pending.is_empty() {
        None
    } else {
        Some(pending)
    };
    let mut start = 0;

    for (idx, byte) in delta.iter().enumerate() {
        if *byte != b'\n' {
            continue;
        }

        let piece = &delta[start..idx];
        let line = match carry.take() {
            Some(head) => {
                let mut joined = Vec::with_capacity(head.len() + piece.len());
                joined.extend_from_slice(head);
                joined.extend_from_slice(piece);
                decode_line(&joined)
            }
            None => decode_line(piece),
        };
        lines.push(line);
        start = idx + 1;
    }

    let rest = &delta[start..];
    let fragment = match carry {
        Some(head) => {
            let mut joined = Vec::with_capacity(head.len() + rest.len());
            joined.extend_from_slice(head);
            joined.extend_from_slice(rest);
            joined
        }
        None => rest.to_vec(),
    };

    Split { lines, fragment }
}

/// UTF-16LE counterpart of [`split_lines`].
///
/// `pending` always starts on a code unit boundary, so newlines are searched
/// for at even offsets of the joined bytes. An odd trailing byte stays in the
/// fragment until its partner arrives.
pub fn split_utf16le_lines(pending: &[u8], delta: &[u8]) -> Split {
    let mut joined = Vec::with_capacity(pending.len() + delta.len());
    joined.extend_from_slice(pending);
    joined.extend_from_slice(delta);

    let mut lines = Vec::new();
    let mut start = 0;
    let mut idx = 0;
    while idx + 1 < joined.len() {
        if joined[idx] == b'\n' && joined[idx + 1] == 0 {
            lines.push(decode_utf16le_line(&joined[start..idx]));
            start = idx + 2;
        }
        idx += 2;
    }

    joined.drain(..start);
    Split {
        lines,
        fragment: joined,
    }
}

/// Decode one UTF-16LE line, tolerating unpaired surrogates and CRLF endings.
pub fn decode_utf16le_line(bytes: &[u8]) -> String {
    let mut units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    if units.last() == Some(&u16::from(b'\r')) {
        units.pop();
    }
    let mut text = String::from_utf16_lossy(&units);
    if bytes.len() % 2 == 1 {
        text.push(char::REPLACEMENT_CHARACTER);
    }
    text
}

/// Drop a UTF-8 byte order mark from the first bytes of a file.
pub fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
}

/// Decode one line's bytes, tolerating invalid UTF-8 and CRLF endings.
pub fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
