//! Depth-first traversal of a value tree as a flat event stream.
//!
//! [`Walk`] keeps its own stack, so arbitrarily deep trees are visited
//! without recursion. Soft-deleted members and elements are skipped.

use crate::{
    array::Element,
    object::Member,
    value::{Node, Value},
};

/// One step of a [`Walk`].
#[derive(Debug, Clone, Copy)]
pub enum Event<'v, 'a> {
    /// Start of an object.
    ObjectBegin,
    /// End of an object.
    ObjectEnd,
    /// Start of an array.
    ArrayBegin,
    /// End of an array.
    ArrayEnd,
    /// A member key, as it appears in the JSON text. The member's value
    /// follows.
    Key(&'a [u8]),
    /// A scalar value.
    Scalar(&'v Value<'a>),
}

/// Iterator produced by [`Value::walk`].
pub struct Walk<'v, 'a> {
    pending: Option<&'v Value<'a>>,
    stack: Vec<Cursor<'a>>,
}

enum Cursor<'a> {
    Members(Option<&'a Member<'a>>),
    Elements(Option<&'a Element<'a>>),
}

impl<'a> Value<'a> {
    /// Walks the tree rooted at this node.
    #[must_use]
    pub fn walk(&self) -> Walk<'_, 'a> {
        Walk {
            pending: Some(self),
            stack: Vec::new(),
        }
    }
}

impl<'v, 'a> Walk<'v, 'a> {
    fn open(&mut self, value: &'v Value<'a>) -> Event<'v, 'a> {
        match &value.node {
            Node::Object(object) => {
                self.stack.push(Cursor::Members(object.first()));
                Event::ObjectBegin
            }
            Node::Array(array) => {
                self.stack.push(Cursor::Elements(array.first()));
                Event::ArrayBegin
            }
            Node::Scalar(_) => Event::Scalar(value),
        }
    }
}

impl<'v, 'a> Iterator for Walk<'v, 'a> {
    type Item = Event<'v, 'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(value) = self.pending.take() {
            return Some(self.open(value));
        }
        match self.stack.last_mut()? {
            Cursor::Members(cursor) => {
                let mut member = *cursor;
                while let Some(current) = member {
                    if let Some(value) = current.value() {
                        *cursor = current.next();
                        self.pending = Some(value);
                        return Some(Event::Key(current.key()));
                    }
                    member = current.next();
                }
                self.stack.pop();
                Some(Event::ObjectEnd)
            }
            Cursor::Elements(cursor) => {
                let mut element = *cursor;
                while let Some(current) = element {
                    if let Some(value) = current.value() {
                        *cursor = current.next();
                        return Some(self.open(value));
                    }
                    element = current.next();
                }
                self.stack.pop();
                Some(Event::ArrayEnd)
            }
        }
    }
}

/// Structural equality: same kinds, same raw bytes, same children in the
/// same order. Soft-deleted entries are ignored and keys compare raw.
impl<'b> PartialEq<Value<'b>> for Value<'_> {
    fn eq(&self, other: &Value<'b>) -> bool {
        let mut left = self.walk();
        let mut right = other.walk();
        loop {
            let same = match (left.next(), right.next()) {
                (None, None) => return true,
                (Some(Event::Key(a)), Some(Event::Key(b))) => a == b,
                (Some(Event::Scalar(a)), Some(Event::Scalar(b))) => {
                    a.kind() == b.kind() && a.value_bytes() == b.value_bytes()
                }
                (Some(Event::ObjectBegin), Some(Event::ObjectBegin))
                | (Some(Event::ObjectEnd), Some(Event::ObjectEnd))
                | (Some(Event::ArrayBegin), Some(Event::ArrayBegin))
                | (Some(Event::ArrayEnd), Some(Event::ArrayEnd)) => true,
                _ => false,
            };
            if !same {
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Pool, parse_copy};

    #[test]
    fn events_follow_document_order() {
        let pool = Pool::new(1024);
        let root = parse_copy(&pool, br#"{"a":[1,{}],"b":null}"#).unwrap();
        let rendered: Vec<String> = root
            .walk()
            .map(|event| match event {
                Event::Key(key) => format!("key {}", String::from_utf8_lossy(key)),
                Event::Scalar(value) => format!("{:?}", value.kind()),
                other => format!("{other:?}"),
            })
            .collect();
        assert_eq!(
            rendered,
            [
                "ObjectBegin",
                "key a",
                "ArrayBegin",
                "Number",
                "ObjectBegin",
                "ObjectEnd",
                "ArrayEnd",
                "key b",
                "Null",
                "ObjectEnd",
            ]
        );
    }

    #[test]
    fn soft_deleted_entries_are_skipped() {
        let pool = Pool::new(1024);
        let root = parse_copy(&pool, br#"{"a":1,"b":[1,2]}"#).unwrap();
        let object = root.as_object().unwrap();
        object.scan("a").unwrap().clear_value();
        let list = object.scan("b").unwrap().value().unwrap().as_array().unwrap();
        list.first().unwrap().clear_value();
        let expected = parse_copy(&pool, br#"{"b":[2]}"#).unwrap();
        assert_eq!(root, expected);
    }

    #[test]
    fn equality_is_structural() {
        let pool = Pool::new(1024);
        let a = parse_copy(&pool, br#"{"x":[true,"s",1.5]}"#).unwrap();
        let b = parse_copy(&pool, br#" { "x" : [ true , "s" , 1.5 ] } "#).unwrap();
        let c = parse_copy(&pool, br#"{"x":[true,"s",1.50]}"#).unwrap();
        let d = parse_copy(&pool, br#"{"x":[true,"s"]}"#).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_ne!(*Value::zero(&pool), *Value::number_text(&pool, "0"));
    }

    #[test]
    fn deep_nesting_does_not_recurse() {
        let pool = Pool::new(1 << 20);
        let depth = 100_000;
        let mut doc = vec![b'['; depth];
        doc.extend(std::iter::repeat_n(b']', depth));
        let root = parse_copy(&pool, &doc).unwrap();
        assert_eq!(root.walk().count(), depth * 2);
        assert_eq!(root, root);
    }
}
