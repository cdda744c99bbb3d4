//! JSON arrays: an ordered element list with a lazily built position index.
//!
//! [`Array::nth`] builds a contiguous index of element references in the pool
//! on first use. Appending discards the index. Erasing the first or last
//! element narrows it in place; erasing any other element discards it.

use std::{cell::Cell, fmt, ptr};

use crate::{
    pool::Pool,
    value::{Value, same_node},
};

/// A JSON array. Obtained from [`Value::as_array`].
pub struct Array<'a> {
    pool: &'a Pool,
    pub(crate) this: Cell<Option<&'a Value<'a>>>,
    len: Cell<usize>,
    head: Cell<Option<&'a Element<'a>>>,
    tail: Cell<Option<&'a Element<'a>>>,
    index: Cell<Option<&'a [&'a Element<'a>]>>,
    index_builds: Cell<u32>,
}

/// One slot of an [`Array`].
pub struct Element<'a> {
    value: Cell<Option<&'a Value<'a>>>,
    owner: Cell<Option<&'a Value<'a>>>,
    next: Cell<Option<&'a Element<'a>>>,
    prev: Cell<Option<&'a Element<'a>>>,
}

impl<'a> Element<'a> {
    /// The value, or `None` once [`clear_value`](Self::clear_value) was called.
    #[must_use]
    pub fn value(&self) -> Option<&'a Value<'a>> {
        self.value.get()
    }

    /// Replaces the element's value.
    pub fn set_value(&self, value: &'a Value<'a>) {
        value.parent.set(self.owner.get());
        self.value.set(Some(value));
    }

    /// Soft-deletes the element. It keeps its position.
    pub fn clear_value(&self) {
        self.value.set(None);
    }

    /// The following element, if any.
    #[must_use]
    pub fn next(&self) -> Option<&'a Element<'a>> {
        self.next.get()
    }

    /// The preceding element, if any.
    #[must_use]
    pub fn previous(&self) -> Option<&'a Element<'a>> {
        self.prev.get()
    }
}

impl fmt::Debug for Element<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Element").field(&self.value.get()).finish()
    }
}

impl<'a> Array<'a> {
    pub(crate) fn new(pool: &'a Pool) -> Self {
        Self {
            pool,
            this: Cell::new(None),
            len: Cell::new(0),
            head: Cell::new(None),
            tail: Cell::new(None),
            index: Cell::new(None),
            index_builds: Cell::new(0),
        }
    }

    /// Number of elements, soft-deleted ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len.get()
    }

    /// Whether the array has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The first element, including soft-deleted ones.
    #[must_use]
    pub fn first(&self) -> Option<&'a Element<'a>> {
        self.head.get()
    }

    /// The last element, including soft-deleted ones.
    #[must_use]
    pub fn last(&self) -> Option<&'a Element<'a>> {
        self.tail.get()
    }

    /// Iterates over every element in order, soft-deleted ones included.
    #[must_use]
    pub fn iter(&self) -> Elements<'a> {
        Elements {
            next: self.head.get(),
            remaining: self.len(),
        }
    }

    /// Values in order, skipping soft-deleted elements.
    #[must_use]
    pub fn values(&self) -> Values<'a> {
        Values(self.iter())
    }

    /// Appends `value` at the end and returns its element.
    pub fn append(&self, value: &'a Value<'a>) -> &'a Element<'a> {
        self.link(value)
    }

    /// Unlinks `element`. Returns `false` when it does not belong to this
    /// array.
    pub fn erase(&self, element: &'a Element<'a>) -> bool {
        if !same_node(element.owner.get(), self.this.get()) {
            return false;
        }

        let index = self.index.get().and_then(|index| match index {
            [first, rest @ ..] if ptr::eq(*first, element) => Some(rest),
            [rest @ .., last] if ptr::eq(*last, element) => Some(rest),
            _ => None,
        });
        self.index.set(index);

        match element.prev.get() {
            Some(prev) => prev.next.set(element.next.get()),
            None => self.head.set(element.next.get()),
        }
        match element.next.get() {
            Some(next) => next.prev.set(element.prev.get()),
            None => self.tail.set(element.prev.get()),
        }
        element.next.set(None);
        element.prev.set(None);
        element.owner.set(None);
        self.len.set(self.len.get() - 1);
        true
    }

    /// The element at `n`, via the position index.
    pub fn nth_element(&self, n: usize) -> Option<&'a Element<'a>> {
        if n >= self.len() {
            return None;
        }
        self.positions().get(n).copied()
    }

    /// The value at `n`, via the position index.
    pub fn nth(&self, n: usize) -> Option<&'a Value<'a>> {
        self.nth_element(n)?.value()
    }

    /// The value at `n`, walking the list from the nearer end.
    pub fn scan(&self, n: usize) -> Option<&'a Value<'a>> {
        let len = self.len();
        if n >= len {
            return None;
        }
        let element = if n * 2 > len {
            let mut element = self.tail.get();
            for _ in 0..len - 1 - n {
                element = element?.prev.get();
            }
            element
        } else {
            self.iter().nth(n)
        };
        element?.value()
    }

    /// Whether the position index is live.
    #[must_use]
    pub fn is_indexed(&self) -> bool {
        self.index.get().is_some()
    }

    /// How many times the position index was built.
    #[must_use]
    pub fn index_builds(&self) -> u32 {
        self.index_builds.get()
    }

    pub(crate) fn link(&self, value: &'a Value<'a>) -> &'a Element<'a> {
        let element: &'a Element<'a> = self.pool.alloc_value(Element {
            value: Cell::new(Some(value)),
            owner: Cell::new(self.this.get()),
            next: Cell::new(None),
            prev: Cell::new(self.tail.get()),
        });
        value.parent.set(self.this.get());
        match self.tail.get() {
            Some(tail) => tail.next.set(Some(element)),
            None => self.head.set(Some(element)),
        }
        self.tail.set(Some(element));
        self.len.set(self.len.get() + 1);
        self.index.set(None);
        element
    }

    fn positions(&self) -> &'a [&'a Element<'a>] {
        if let Some(index) = self.index.get() {
            return index;
        }
        let index: &'a [&'a Element<'a>] = self.pool.alloc_slice_fill_iter(self.iter());
        self.index.set(Some(index));
        self.index_builds.set(self.index_builds.get() + 1);
        index
    }
}

/// Iterator over an array's elements.
///
/// Elements appended while iterating are not visited.
#[derive(Clone)]
pub struct Elements<'a> {
    next: Option<&'a Element<'a>>,
    remaining: usize,
}

impl<'a> Iterator for Elements<'a> {
    type Item = &'a Element<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let element = self.next?;
        self.next = element.next.get();
        self.remaining -= 1;
        Some(element)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Elements<'_> {}

/// Iterator over an array's values, skipping soft-deleted elements.
#[derive(Clone)]
pub struct Values<'a>(Elements<'a>);

impl<'a> Iterator for Values<'a> {
    type Item = &'a Value<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.by_ref().find_map(Element::value)
    }
}
