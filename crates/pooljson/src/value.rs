//! The in-memory JSON tree.
//!
//! Every node lives in a [`Pool`] and is shared as `&'a Value<'a>`. Scalars
//! keep their raw JSON text, either borrowed from the parsed input or copied
//! into the pool. Containers link their children through intrusive lists (see
//! [`Object`] and [`Array`]) and every child points back at its container.

use std::{cell::Cell, fmt, ptr, str};

use bstr::BStr;

use crate::{array::Array, escape, object::Object, pool::Pool};

/// The ten node kinds.
///
/// `Zero` is the number `0` (including `-0`), `Number` any other integer and
/// `Decimal` a number with a fractional part. `Binary` is the `nb` extension:
/// a length-prefixed raw payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Kind {
    /// `{...}`
    Object = 1,
    /// `[...]`
    Array = 2,
    /// A length-prefixed raw payload.
    Binary = 3,
    /// A string.
    String = 4,
    /// `null`
    Null = 5,
    /// `false`
    False = 6,
    /// The number zero.
    Zero = 7,
    /// An integer other than zero.
    Number = 8,
    /// A number with a fractional part.
    Decimal = 9,
    /// `true`
    True = 10,
}

impl Kind {
    /// Whether this kind is `Zero`, `Number` or `Decimal`.
    #[must_use]
    pub fn is_number(self) -> bool {
        matches!(self, Kind::Zero | Kind::Number | Kind::Decimal)
    }
}

/// Where a scalar's bytes live.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Text<'a> {
    /// Aliases the parsed input or caller-provided bytes.
    Borrowed(&'a [u8]),
    /// A copy made in the pool.
    Pooled(&'a [u8]),
    /// A literal such as `true`.
    Static(&'static [u8]),
}

impl<'a> Text<'a> {
    /// The bytes, wherever they live.
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        match *self {
            Text::Borrowed(bytes) | Text::Pooled(bytes) => bytes,
            Text::Static(bytes) => bytes,
        }
    }

    /// Whether the bytes alias the input or caller memory.
    #[must_use]
    pub fn is_borrowed(&self) -> bool {
        matches!(self, Text::Borrowed(_))
    }
}

impl fmt::Debug for Text<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (tag, bytes) = match *self {
            Text::Borrowed(bytes) => ("Borrowed", bytes),
            Text::Pooled(bytes) => ("Pooled", bytes),
            Text::Static(bytes) => ("Static", bytes),
        };
        f.debug_tuple(tag).field(&BStr::new(bytes)).finish()
    }
}

/// A JSON node. See the [module documentation](self).
pub struct Value<'a> {
    pub(crate) parent: Cell<Option<&'a Value<'a>>>,
    pub(crate) node: Node<'a>,
}

pub(crate) enum Node<'a> {
    Object(Object<'a>),
    Array(Array<'a>),
    Scalar(Scalar<'a>),
}

pub(crate) struct Scalar<'a> {
    pub(crate) kind: Kind,
    pub(crate) text: Text<'a>,
    /// Escapes were already decoded in place.
    pub(crate) decoded: bool,
}

impl<'a> Value<'a> {
    /// A new, empty object.
    pub fn object(pool: &'a Pool) -> &'a Value<'a> {
        let value: &'a Value<'a> = pool.alloc_value(Value {
            parent: Cell::new(None),
            node: Node::Object(Object::new(pool)),
        });
        if let Node::Object(object) = &value.node {
            object.this.set(Some(value));
        }
        value
    }

    /// A new, empty array.
    pub fn array(pool: &'a Pool) -> &'a Value<'a> {
        let value: &'a Value<'a> = pool.alloc_value(Value {
            parent: Cell::new(None),
            node: Node::Array(Array::new(pool)),
        });
        if let Node::Array(array) = &value.node {
            array.this.set(Some(value));
        }
        value
    }

    pub(crate) fn scalar(pool: &'a Pool, kind: Kind, text: Text<'a>, decoded: bool) -> &'a Value<'a> {
        pool.alloc_value(Value {
            parent: Cell::new(None),
            node: Node::Scalar(Scalar {
                kind,
                text,
                decoded,
            }),
        })
    }

    /// A string holding a copy of `text`, which must already be JSON-escaped
    /// (see [`escape::encode`]).
    pub fn string(pool: &'a Pool, text: impl AsRef<[u8]>) -> &'a Value<'a> {
        let copy = pool.dup_unaligned(text.as_ref());
        Self::scalar(pool, Kind::String, Text::Pooled(copy), false)
    }

    /// A string aliasing `text`, which must already be JSON-escaped.
    pub fn string_borrowed(pool: &'a Pool, text: &'a [u8]) -> &'a Value<'a> {
        Self::scalar(pool, Kind::String, Text::Borrowed(text), false)
    }

    /// A binary payload holding a copy of `bytes`.
    ///
    /// # Panics
    ///
    /// Panics when the payload does not fit the 32-bit length prefix.
    pub fn binary(pool: &'a Pool, bytes: &[u8]) -> &'a Value<'a> {
        assert_binary_len(bytes);
        let copy = pool.dup_unaligned(bytes);
        Self::scalar(pool, Kind::Binary, Text::Pooled(copy), false)
    }

    /// A binary payload aliasing `bytes`.
    ///
    /// # Panics
    ///
    /// Panics when the payload does not fit the 32-bit length prefix.
    pub fn binary_borrowed(pool: &'a Pool, bytes: &'a [u8]) -> &'a Value<'a> {
        assert_binary_len(bytes);
        Self::scalar(pool, Kind::Binary, Text::Borrowed(bytes), false)
    }

    /// An integer. `0` yields a `Zero` node.
    pub fn number(pool: &'a Pool, n: i64) -> &'a Value<'a> {
        if n == 0 {
            return Self::zero(pool);
        }
        let text = pool.alloc_fmt(format_args!("{n}"));
        Self::scalar(pool, Kind::Number, Text::Pooled(text.as_bytes()), false)
    }

    /// An integer from preformatted text, copied into the pool.
    pub fn number_text(pool: &'a Pool, text: &str) -> &'a Value<'a> {
        let copy = pool.strdup(text);
        Self::scalar(pool, Kind::Number, Text::Pooled(copy.as_bytes()), false)
    }

    /// A decimal from preformatted text, copied into the pool.
    pub fn decimal_text(pool: &'a Pool, text: &str) -> &'a Value<'a> {
        let copy = pool.strdup(text);
        Self::scalar(pool, Kind::Decimal, Text::Pooled(copy.as_bytes()), false)
    }

    /// Allocates `true` or `false`.
    pub fn boolean(pool: &'a Pool, value: bool) -> &'a Value<'a> {
        if value {
            Self::scalar(pool, Kind::True, Text::Static(b"true"), false)
        } else {
            Self::scalar(pool, Kind::False, Text::Static(b"false"), false)
        }
    }

    /// Allocates `null`.
    pub fn null(pool: &'a Pool) -> &'a Value<'a> {
        Self::scalar(pool, Kind::Null, Text::Static(b"null"), false)
    }

    /// Allocates the number `0`.
    pub fn zero(pool: &'a Pool) -> &'a Value<'a> {
        Self::scalar(pool, Kind::Zero, Text::Static(b"0"), false)
    }

    /// The node's kind.
    #[must_use]
    pub fn kind(&self) -> Kind {
        match &self.node {
            Node::Object(_) => Kind::Object,
            Node::Array(_) => Kind::Array,
            Node::Scalar(scalar) => scalar.kind,
        }
    }

    /// Whether this is an object.
    #[must_use]
    pub fn is_object(&self) -> bool {
        matches!(self.node, Node::Object(_))
    }

    /// Whether this is an array.
    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self.node, Node::Array(_))
    }

    /// Whether this is an object or an array.
    #[must_use]
    pub fn is_container(&self) -> bool {
        !matches!(self.node, Node::Scalar(_))
    }

    /// Whether this is a string.
    #[must_use]
    pub fn is_string(&self) -> bool {
        self.kind() == Kind::String
    }

    /// Whether this is a `Zero`, `Number` or `Decimal` node.
    #[must_use]
    pub fn is_number(&self) -> bool {
        self.kind().is_number()
    }

    /// Whether this is `null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.kind() == Kind::Null
    }

    /// The value of a `True` or `False` node.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self.kind() {
            Kind::True => Some(true),
            Kind::False => Some(false),
            _ => None,
        }
    }

    /// The container holding this node, if any.
    #[must_use]
    pub fn parent(&self) -> Option<&'a Value<'a>> {
        self.parent.get()
    }

    /// The object view of an `Object` node.
    #[must_use]
    pub fn as_object(&self) -> Option<&Object<'a>> {
        match &self.node {
            Node::Object(object) => Some(object),
            _ => None,
        }
    }

    /// The array view of an `Array` node.
    #[must_use]
    pub fn as_array(&self) -> Option<&Array<'a>> {
        match &self.node {
            Node::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Where a scalar's bytes live; `None` for containers.
    #[must_use]
    pub fn text(&self) -> Option<Text<'a>> {
        match &self.node {
            Node::Scalar(scalar) => Some(scalar.text),
            _ => None,
        }
    }

    /// The raw bytes of a scalar: string bodies without quotes and still
    /// escaped (unless decoded while parsing), number and literal text, or a
    /// binary payload. `None` for containers.
    #[must_use]
    pub fn value_bytes(&self) -> Option<&'a [u8]> {
        self.text().map(|text| text.as_bytes())
    }

    /// [`value_bytes`](Self::value_bytes) as UTF-8.
    #[must_use]
    pub fn as_str(&self) -> Option<&'a str> {
        self.value_bytes().and_then(|bytes| str::from_utf8(bytes).ok())
    }

    /// The payload of a `Binary` node.
    #[must_use]
    pub fn binary_bytes(&self) -> Option<&'a [u8]> {
        match &self.node {
            Node::Scalar(Scalar {
                kind: Kind::Binary,
                text,
                ..
            }) => Some(text.as_bytes()),
            _ => None,
        }
    }

    /// Whether a string's escapes were already decoded while parsing.
    #[must_use]
    pub fn is_decoded(&self) -> bool {
        matches!(&self.node, Node::Scalar(scalar) if scalar.decoded)
    }

    /// Scalar bytes with string escapes decoded. Decoding allocates only when
    /// the string holds a backslash and was not decoded already.
    pub fn decoded(&self, pool: &'a Pool) -> Option<&'a [u8]> {
        let Node::Scalar(scalar) = &self.node else {
            return None;
        };
        let bytes = scalar.text.as_bytes();
        if scalar.kind == Kind::String && !scalar.decoded {
            Some(escape::decode(pool, bytes))
        } else {
            Some(bytes)
        }
    }

    /// Integer value of a `Zero` or `Number` node.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self.kind() {
            Kind::Zero => Some(0),
            Kind::Number => self.as_str()?.parse().ok(),
            _ => None,
        }
    }

    /// Value of any numeric node.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self.kind() {
            Kind::Zero => Some(0.0),
            Kind::Number | Kind::Decimal => self.as_str()?.parse().ok(),
            _ => None,
        }
    }

    /// Follows a dotted path such as `a.b.0.name`.
    ///
    /// Segments select object members by (raw) key and array elements by
    /// index. On an array, a `key=value` segment selects the first element
    /// object whose `key` member has the raw text `value`.
    #[must_use]
    pub fn path(&'a self, path: &str) -> Option<&'a Value<'a>> {
        path.split('.').try_fold(self, |node, segment| node.step(segment))
    }

    /// Raw bytes of the scalar at `path`.
    #[must_use]
    pub fn path_value(&'a self, path: &str) -> Option<&'a [u8]> {
        self.path(path)?.value_bytes()
    }

    /// Decoded bytes of the scalar at `path`.
    pub fn path_decoded(&'a self, pool: &'a Pool, path: &str) -> Option<&'a [u8]> {
        self.path(path)?.decoded(pool)
    }

    fn step(&self, segment: &str) -> Option<&'a Value<'a>> {
        match &self.node {
            Node::Object(object) => object.scan(segment)?.value(),
            Node::Array(array) => {
                if let Some((key, wanted)) = segment.split_once('=') {
                    array.values().find(|element| {
                        element
                            .as_object()
                            .and_then(|object| object.scan(key))
                            .and_then(|member| member.value())
                            .and_then(Value::value_bytes)
                            == Some(wanted.as_bytes())
                    })
                } else {
                    array.scan(segment.parse().ok()?)
                }
            }
            Node::Scalar(_) => None,
        }
    }

    /// Links `child` under this container. Scalars have no children.
    pub(crate) fn link_child(&self, key: &'a [u8], child: &'a Value<'a>) {
        match &self.node {
            Node::Object(object) => {
                object.link(key, child);
            }
            Node::Array(array) => {
                array.link(child);
            }
            Node::Scalar(_) => debug_assert!(false, "scalars have no children"),
        }
    }
}

fn assert_binary_len(bytes: &[u8]) {
    assert!(
        u32::try_from(bytes.len()).is_ok(),
        "binary payload of {} bytes exceeds the 32-bit length prefix",
        bytes.len()
    );
}

/// Identity comparison of optional node references.
pub(crate) fn same_node(a: Option<&Value<'_>>, b: Option<&Value<'_>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => ptr::eq(a.cast_ptr(), b.cast_ptr()),
        _ => false,
    }
}

impl Value<'_> {
    fn cast_ptr(&self) -> *const () {
        ptr::from_ref(self).cast()
    }
}

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            Node::Object(object) => {
                f.write_str("Object ")?;
                f.debug_map()
                    .entries(object.entries().map(|(key, value)| (BStr::new(key), value)))
                    .finish()
            }
            Node::Array(array) => {
                f.write_str("Array ")?;
                f.debug_list().entries(array.values()).finish()
            }
            Node::Scalar(scalar) => write!(f, "{:?}({:?})", scalar.kind, BStr::new(scalar.text.as_bytes())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_copy;

    #[test]
    fn kinds_keep_their_wire_order() {
        assert_eq!(Kind::Object as u8, 1);
        assert_eq!(Kind::Binary as u8, 3);
        assert_eq!(Kind::True as u8, 10);
        assert!(Kind::Zero.is_number() && !Kind::String.is_number());
    }

    #[test]
    fn number_zero_is_its_own_kind() {
        let pool = Pool::new(64);
        assert_eq!(Value::number(&pool, 0).kind(), Kind::Zero);
        let n = Value::number(&pool, -42);
        assert_eq!(n.kind(), Kind::Number);
        assert_eq!(n.value_bytes(), Some(&b"-42"[..]));
        assert_eq!(n.as_i64(), Some(-42));
    }

    #[test]
    fn constructors_copy_or_borrow() {
        let pool = Pool::new(64);
        let source = b"abc".to_vec();
        let copied = Value::string(&pool, &source);
        assert!(matches!(copied.text(), Some(Text::Pooled(b"abc"))));
        let borrowed = Value::string_borrowed(&pool, b"xyz");
        assert!(borrowed.text().is_some_and(|text| text.is_borrowed()));
        assert_eq!(Value::boolean(&pool, true).as_bool(), Some(true));
        assert!(Value::null(&pool).is_null());
        assert_eq!(Value::binary(&pool, &[0, 1]).binary_bytes(), Some(&[0u8, 1][..]));
        assert_eq!(Value::decimal_text(&pool, "1.5").as_f64(), Some(1.5));
    }

    #[test]
    fn decoded_allocates_only_for_escapes() {
        let pool = Pool::new(256);
        let plain = Value::string_borrowed(&pool, b"plain");
        let before = pool.size();
        assert_eq!(plain.decoded(&pool), Some(&b"plain"[..]));
        assert_eq!(pool.size(), before);
        let escaped = Value::string_borrowed(&pool, br"a\tb");
        assert_eq!(escaped.decoded(&pool), Some(&b"a\tb"[..]));
    }

    #[test]
    fn path_navigation() {
        let pool = Pool::new(1024);
        let root = parse_copy(
            &pool,
            br#"{"a":{"list":[{"id":"x","n":1},{"id":"y","n":2}],"s":"q\nr"}}"#,
        )
        .unwrap();
        assert_eq!(root.path_value("a.list.1.n"), Some(&b"2"[..]));
        assert_eq!(root.path_value("a.list.id=y.n"), Some(&b"2"[..]));
        assert_eq!(root.path_value("a.list.id=z.n"), None);
        assert_eq!(root.path_value("a.list.7"), None);
        assert_eq!(root.path_value("a.s.deeper"), None);
        assert_eq!(root.path_decoded(&pool, "a.s"), Some(&b"q\nr"[..]));
        assert!(root.path("a").unwrap().is_object());
    }

    #[test]
    fn children_point_at_their_container() {
        let pool = Pool::new(1024);
        let root = parse_copy(&pool, br#"{"a":[true]}"#).unwrap();
        let list = root.path("a").unwrap();
        let first = list.path("0").unwrap();
        assert!(same_node(first.parent(), Some(list)));
        assert!(same_node(list.parent(), Some(root)));
        assert!(root.parent().is_none());
    }

    #[test]
    fn debug_is_compact() {
        let pool = Pool::new(1024);
        let root = parse_copy(&pool, br#"{"a":[1,"s",null]}"#).unwrap();
        assert_eq!(
            format!("{root:?}"),
            r#"Object {"a": Array [Number("1"), String("s"), Null("null")]}"#
        );
    }
}
