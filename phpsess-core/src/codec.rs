//! `php_serialize` codec
//!
//! Reads and writes the format PHP produces with
//! `session.serialize_handler = php_serialize`: the whole session is one
//! serialized associative array. Lengths are byte lengths, strings are
//! expected to be UTF-8.

use crate::error::{SessionError, SessionResult};
use crate::types::{PhpValue, SessionRecord};
use indexmap::IndexMap;

/// Nesting limit for decoding, deep enough for any real session
const MAX_DEPTH: usize = 256;

/// Decode a stored session blob.
///
/// An empty blob is an empty session. Anything that is not exactly one
/// serialized array fails with [`SessionError::Decode`]; partial data is never
/// returned.
pub fn decode(blob: &[u8]) -> SessionResult<SessionRecord> {
    if blob.is_empty() {
        return Ok(SessionRecord::new());
    }

    let mut parser = Parser { input: blob, pos: 0 };
    let value = parser.value(0)?;
    if parser.pos != blob.len() {
        return Err(SessionError::decode(
            "unexpected trailing data after session array",
            parser.pos,
        ));
    }

    match value {
        PhpValue::Map(fields) => Ok(fields),
        PhpValue::Sequence(items) => Ok(items
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect()),
        other => Err(SessionError::decode(
            format!("session must be an array, found {}", other.kind()),
            0,
        )),
    }
}

/// Encode a session for storage. Infallible for every [`PhpValue`].
pub fn encode(record: &SessionRecord) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    write_map(&mut out, record);
    out
}

fn write_value(out: &mut Vec<u8>, value: &PhpValue) {
    match value {
        PhpValue::Null => out.extend_from_slice(b"N;"),
        PhpValue::Bool(b) => out.extend_from_slice(if *b { b"b:1;" } else { b"b:0;" }),
        PhpValue::Int(i) => out.extend_from_slice(format!("i:{};", i).as_bytes()),
        PhpValue::Float(f) => {
            out.extend_from_slice(b"d:");
            out.extend_from_slice(format_float(*f).as_bytes());
            out.push(b';');
        }
        PhpValue::String(s) => write_string(out, s),
        PhpValue::Sequence(items) => {
            out.extend_from_slice(format!("a:{}:{{", items.len()).as_bytes());
            for (index, item) in items.iter().enumerate() {
                out.extend_from_slice(format!("i:{};", index).as_bytes());
                write_value(out, item);
            }
            out.push(b'}');
        }
        PhpValue::Map(fields) => write_map(out, fields),
    }
}

fn write_map(out: &mut Vec<u8>, fields: &IndexMap<String, PhpValue>) {
    out.extend_from_slice(format!("a:{}:{{", fields.len()).as_bytes());
    for (key, value) in fields {
        // PHP stores decimal-integer string keys as integer keys
        match canonical_int_key(key) {
            Some(index) => out.extend_from_slice(format!("i:{};", index).as_bytes()),
            None => write_string(out, key),
        }
        write_value(out, value);
    }
    out.push(b'}');
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(format!("s:{}:\"", s.len()).as_bytes());
    out.extend_from_slice(s.as_bytes());
    out.extend_from_slice(b"\";");
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NAN".to_string()
    } else if f == f64::INFINITY {
        "INF".to_string()
    } else if f == f64::NEG_INFINITY {
        "-INF".to_string()
    } else {
        // Shortest representation that reads back to the same f64
        format!("{:?}", f)
    }
}

fn canonical_int_key(key: &str) -> Option<i64> {
    let index: i64 = key.parse().ok()?;
    (index.to_string() == key).then_some(index)
}

enum Key {
    Int(i64),
    Str(String),
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn value(&mut self, depth: usize) -> SessionResult<PhpValue> {
        if depth > MAX_DEPTH {
            return Err(SessionError::decode("nesting too deep", self.pos));
        }

        let tag_pos = self.pos;
        match self.next()? {
            b'N' => {
                self.expect(b';')?;
                Ok(PhpValue::Null)
            }
            b'b' => {
                self.expect(b':')?;
                let start = self.pos;
                match self.until(b';')? {
                    b"0" => Ok(PhpValue::Bool(false)),
                    b"1" => Ok(PhpValue::Bool(true)),
                    _ => Err(SessionError::decode("boolean must be 0 or 1", start)),
                }
            }
            b'i' => {
                self.expect(b':')?;
                Ok(PhpValue::Int(self.integer(b';')?))
            }
            b'd' => {
                self.expect(b':')?;
                let start = self.pos;
                let raw = self.until(b';')?;
                parse_float(raw)
                    .map(PhpValue::Float)
                    .ok_or_else(|| SessionError::decode("invalid float", start))
            }
            b's' => {
                self.expect(b':')?;
                Ok(PhpValue::String(self.string_body()?))
            }
            b'a' => {
                self.expect(b':')?;
                let count = self.length(b':')?;
                self.array_body(count, depth, true)
            }
            b'O' => {
                // Objects come back as plain maps, the class name is dropped
                self.expect(b':')?;
                let name_len = self.length(b':')?;
                self.expect(b'"')?;
                self.take(name_len)?;
                self.expect(b'"')?;
                self.expect(b':')?;
                let count = self.length(b':')?;
                self.array_body(count, depth, false)
            }
            other => Err(SessionError::decode(
                format!("unknown type tag '{}'", other.escape_ascii()),
                tag_pos,
            )),
        }
    }

    fn array_body(&mut self, count: usize, depth: usize, detect_list: bool) -> SessionResult<PhpValue> {
        self.expect(b'{')?;

        let mut fields = IndexMap::with_capacity(count.min(1024));
        let mut is_list = detect_list;
        for index in 0..count {
            let key = match self.key()? {
                Key::Int(i) => {
                    is_list &= i64::try_from(index).ok() == Some(i);
                    i.to_string()
                }
                Key::Str(s) => {
                    is_list = false;
                    s
                }
            };
            let value = self.value(depth + 1)?;
            fields.insert(key, value);
        }
        self.expect(b'}')?;

        if is_list {
            Ok(PhpValue::Sequence(fields.into_values().collect()))
        } else {
            Ok(PhpValue::Map(fields))
        }
    }

    fn key(&mut self) -> SessionResult<Key> {
        let tag_pos = self.pos;
        match self.next()? {
            b'i' => {
                self.expect(b':')?;
                Ok(Key::Int(self.integer(b';')?))
            }
            b's' => {
                self.expect(b':')?;
                Ok(Key::Str(self.string_body()?))
            }
            _ => Err(SessionError::decode(
                "array key must be an integer or a string",
                tag_pos,
            )),
        }
    }

    /// `<len>:"<bytes>";` after the `s:` prefix
    fn string_body(&mut self) -> SessionResult<String> {
        let len = self.length(b':')?;
        self.expect(b'"')?;
        let start = self.pos;
        let bytes = self.take(len)?;
        let s = std::str::from_utf8(bytes)
            .map_err(|_| SessionError::decode("string is not valid UTF-8", start))?
            .to_string();
        self.expect(b'"')?;
        self.expect(b';')?;
        Ok(s)
    }

    fn integer(&mut self, terminator: u8) -> SessionResult<i64> {
        let start = self.pos;
        let raw = self.until(terminator)?;
        std::str::from_utf8(raw)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| SessionError::decode("invalid integer", start))
    }

    fn length(&mut self, terminator: u8) -> SessionResult<usize> {
        let start = self.pos;
        let raw = self.until(terminator)?;
        if raw.is_empty() || !raw.iter().all(u8::is_ascii_digit) {
            return Err(SessionError::decode("invalid length", start));
        }
        std::str::from_utf8(raw)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| SessionError::decode("invalid length", start))
    }

    fn next(&mut self) -> SessionResult<u8> {
        let byte = *self
            .input
            .get(self.pos)
            .ok_or_else(|| SessionError::decode("unexpected end of data", self.pos))?;
        self.pos += 1;
        Ok(byte)
    }

    fn expect(&mut self, expected: u8) -> SessionResult<()> {
        let at = self.pos;
        let found = self.next()?;
        if found != expected {
            return Err(SessionError::decode(
                format!(
                    "expected '{}', found '{}'",
                    expected.escape_ascii(),
                    found.escape_ascii()
                ),
                at,
            ));
        }
        Ok(())
    }

    fn take(&mut self, len: usize) -> SessionResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.input.len())
            .ok_or_else(|| SessionError::decode("length exceeds remaining data", self.pos))?;
        let bytes = &self.input[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Bytes up to `terminator`, consuming the terminator
    fn until(&mut self, terminator: u8) -> SessionResult<&'a [u8]> {
        let rest = &self.input[self.pos..];
        let offset = rest
            .iter()
            .position(|b| *b == terminator)
            .ok_or_else(|| SessionError::decode("unexpected end of data", self.input.len()))?;
        let bytes = &rest[..offset];
        self.pos += offset + 1;
        Ok(bytes)
    }
}

fn parse_float(raw: &[u8]) -> Option<f64> {
    match raw {
        b"INF" => Some(f64::INFINITY),
        b"-INF" => Some(f64::NEG_INFINITY),
        b"NAN" => Some(f64::NAN),
        _ => {
            let s = std::str::from_utf8(raw).ok()?;
            // Rust also accepts "inf"/"nan" spellings PHP never writes
            if s.is_empty() || s.bytes().any(|b| b.is_ascii_alphabetic() && b != b'e' && b != b'E') {
                return None;
            }
            s.parse().ok()
        }
    }
}
