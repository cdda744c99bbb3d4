//! Compact JSON output.
//!
//! Scalars are written from their stored text without re-escaping: string
//! bodies are expected to be JSON-escaped already (parsed input is, and
//! constructed strings should go through [`crate::escape::encode`]). Binary
//! nodes are written as `nb`, a native-endian 32-bit length, and the payload.

use std::{convert::Infallible, fmt, io};

use bstr::BStr;

use crate::{
    buffer::{Buffer, PoolBuffer},
    value::{Kind, Value},
    walk::Event,
};

trait Sink {
    type Error;

    fn put(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;
}

impl Sink for Buffer {
    type Error = Infallible;

    fn put(&mut self, bytes: &[u8]) -> Result<(), Infallible> {
        self.append(bytes);
        Ok(())
    }
}

impl Sink for PoolBuffer<'_> {
    type Error = Infallible;

    fn put(&mut self, bytes: &[u8]) -> Result<(), Infallible> {
        self.append(bytes);
        Ok(())
    }
}

struct IoSink<W>(W);

impl<W: io::Write> Sink for IoSink<W> {
    type Error = io::Error;

    fn put(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.0.write_all(bytes)
    }
}

fn write_value<S: Sink>(out: &mut S, root: &Value<'_>) -> Result<(), S::Error> {
    let mut just_opened = true;
    let mut after_key = false;
    for event in root.walk() {
        match event {
            Event::Key(key) => {
                if !just_opened {
                    out.put(b",")?;
                }
                out.put(b"\"")?;
                out.put(key)?;
                out.put(b"\":")?;
                just_opened = false;
                after_key = true;
                continue;
            }
            Event::ObjectEnd => out.put(b"}")?,
            Event::ArrayEnd => out.put(b"]")?,
            Event::ObjectBegin | Event::ArrayBegin | Event::Scalar(_) => {
                if !just_opened && !after_key {
                    out.put(b",")?;
                }
            }
        }
        match event {
            Event::ObjectBegin => {
                out.put(b"{")?;
                just_opened = true;
            }
            Event::ArrayBegin => {
                out.put(b"[")?;
                just_opened = true;
            }
            Event::Scalar(value) => {
                write_scalar(out, value)?;
                just_opened = false;
            }
            _ => just_opened = false,
        }
        after_key = false;
    }
    Ok(())
}

fn write_scalar<S: Sink>(out: &mut S, value: &Value<'_>) -> Result<(), S::Error> {
    let bytes = value.value_bytes().unwrap_or_default();
    match value.kind() {
        Kind::String => {
            out.put(b"\"")?;
            out.put(bytes)?;
            out.put(b"\"")
        }
        Kind::Binary => {
            // Payloads are bounded by the constructors and the parser.
            #[allow(clippy::cast_possible_truncation)]
            let len = bytes.len() as u32;
            out.put(b"nb")?;
            out.put(&len.to_ne_bytes())?;
            out.put(bytes)
        }
        _ => out.put(bytes),
    }
}

impl Value<'_> {
    /// Appends the compact JSON text of this tree to `buffer`.
    pub fn dump_to_buffer(&self, buffer: &mut Buffer) {
        match write_value(buffer, self) {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }

    /// Appends the compact JSON text of this tree to a pool-backed buffer.
    pub fn dump_to_pool_buffer(&self, buffer: &mut PoolBuffer<'_>) {
        match write_value(buffer, self) {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }

    /// Writes the compact JSON text of this tree to `writer`.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by `writer`.
    pub fn write_to<W: io::Write>(&self, writer: W) -> io::Result<()> {
        write_value(&mut IoSink(writer), self)
    }

    /// The compact JSON text of this tree.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        let mut buffer = Buffer::new(256);
        self.dump_to_buffer(&mut buffer);
        buffer.into_vec()
    }
}

/// Compact JSON text, with invalid UTF-8 (binary payloads) shown lossily.
impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(BStr::new(&self.to_vec()), f)
    }
}

// Serializes the logical content: keys and strings unescaped, numbers as
// numbers, binary payloads as bytes.
#[cfg(any(test, feature = "serde"))]
mod serde_impls {
    use std::{borrow::Cow, str};

    use serde::{
        Serialize, Serializer,
        ser::{SerializeMap, SerializeSeq},
    };

    use crate::{
        escape,
        value::{Kind, Node, Value},
    };

    impl Serialize for Value<'_> {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match &self.node {
                Node::Object(object) => {
                    let mut map = serializer.serialize_map(Some(object.entries().count()))?;
                    for (key, value) in object.entries() {
                        let key = escape::unescape(key);
                        map.serialize_entry(&*String::from_utf8_lossy(&key), value)?;
                    }
                    map.end()
                }
                Node::Array(array) => {
                    let mut seq = serializer.serialize_seq(Some(array.values().count()))?;
                    for value in array.values() {
                        seq.serialize_element(value)?;
                    }
                    seq.end()
                }
                Node::Scalar(scalar) => {
                    let bytes = scalar.text.as_bytes();
                    match scalar.kind {
                        Kind::True => serializer.serialize_bool(true),
                        Kind::False => serializer.serialize_bool(false),
                        Kind::Zero => serializer.serialize_u64(0),
                        Kind::Number | Kind::Decimal => serialize_number(bytes, serializer),
                        Kind::String => {
                            let text = if scalar.decoded {
                                Cow::Borrowed(bytes)
                            } else {
                                escape::unescape(bytes)
                            };
                            serializer.serialize_str(&String::from_utf8_lossy(&text))
                        }
                        Kind::Binary => serializer.serialize_bytes(bytes),
                        Kind::Null | Kind::Object | Kind::Array => serializer.serialize_unit(),
                    }
                }
            }
        }
    }

    fn serialize_number<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let text = str::from_utf8(bytes).unwrap_or_default();
        if let Ok(n) = text.parse::<i64>() {
            serializer.serialize_i64(n)
        } else if let Ok(n) = text.parse::<u64>() {
            serializer.serialize_u64(n)
        } else if let Ok(n) = text.parse::<f64>() {
            serializer.serialize_f64(n)
        } else {
            serializer.serialize_str(text)
        }
    }

}
