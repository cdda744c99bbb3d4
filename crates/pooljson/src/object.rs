//! JSON objects: an ordered member list with lazily built lookup overlays.
//!
//! Members keep their insertion order in a doubly linked list, which is what
//! the serializer and [`Object::scan`] walk. Faster lookups come from one of
//! two overlays built on demand:
//!
//! - a **sorted** array of member references, built by [`Object::get`] and
//!   searched with a binary search. Any append or erase discards it.
//! - a **tree** (a treap threaded through the members), built by
//!   [`Object::find`] and [`Object::insert`] and kept up to date by every
//!   append, insert and erase.
//!
//! Only one overlay is live at a time. Alternating between `get` and `find`
//! rebuilds an overlay on every switch; each switch is logged and counted in
//! [`IndexStats`].
//!
//! All lookups agree with a linear scan: when keys repeat, the first member
//! in list order wins.

use std::{cell::Cell, fmt, str};

use bstr::BStr;

use crate::{
    pool::Pool,
    tree,
    value::{Value, same_node},
};

/// Which lookup overlay is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexKind {
    /// No overlay; lookups scan the list.
    #[default]
    None,
    /// A key-sorted array of members.
    Sorted,
    /// A balanced search tree threaded through the members.
    Tree,
}

/// Overlay bookkeeping for one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexStats {
    /// Times the sorted overlay was built.
    pub sorted_builds: u32,
    /// Times the tree overlay was built.
    pub tree_builds: u32,
    /// Builds that replaced an overlay of the other kind.
    pub switches: u32,
}

#[derive(Clone, Copy)]
enum Index<'a> {
    None,
    Sorted(&'a [&'a Member<'a>]),
    Tree(tree::Link<'a>),
}

/// A JSON object. Obtained from [`Value::as_object`].
pub struct Object<'a> {
    pool: &'a Pool,
    pub(crate) this: Cell<Option<&'a Value<'a>>>,
    len: Cell<usize>,
    head: Cell<Option<&'a Member<'a>>>,
    tail: Cell<Option<&'a Member<'a>>>,
    index: Cell<Index<'a>>,
    /// The live tree leaves out at least one duplicate key.
    shadowed: Cell<bool>,
    last_built: Cell<IndexKind>,
    stats: Cell<IndexStats>,
}

/// One key/value entry of an [`Object`].
pub struct Member<'a> {
    key: &'a [u8],
    value: Cell<Option<&'a Value<'a>>>,
    owner: Cell<Option<&'a Value<'a>>>,
    next: Cell<Option<&'a Member<'a>>>,
    prev: Cell<Option<&'a Member<'a>>>,
    pub(crate) left: Cell<tree::Link<'a>>,
    pub(crate) right: Cell<tree::Link<'a>>,
}

impl<'a> Member<'a> {
    /// The key as it appears in the JSON text, escapes included.
    #[must_use]
    pub fn key(&self) -> &'a [u8] {
        self.key
    }

    /// The key as a `str`, when it is valid UTF-8.
    #[must_use]
    pub fn key_str(&self) -> Option<&'a str> {
        str::from_utf8(self.key).ok()
    }

    /// The value, or `None` once [`clear_value`](Self::clear_value) was called.
    #[must_use]
    pub fn value(&self) -> Option<&'a Value<'a>> {
        self.value.get()
    }

    /// Replaces the value, re-parenting `value` under this member's object.
    pub fn set_value(&self, value: &'a Value<'a>) {
        value.parent.set(self.owner.get());
        self.value.set(Some(value));
    }

    /// Soft-deletes the entry: it stays in the list and the overlays, but
    /// serialization and iteration over entries skip it.
    pub fn clear_value(&self) {
        self.value.set(None);
    }

    /// The following member, if any.
    #[must_use]
    pub fn next(&self) -> Option<&'a Member<'a>> {
        self.next.get()
    }

    /// The preceding member, if any.
    #[must_use]
    pub fn previous(&self) -> Option<&'a Member<'a>> {
        self.prev.get()
    }
}

impl fmt::Debug for Member<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("key", &BStr::new(self.key))
            .field("value", &self.value.get())
            .finish()
    }
}

impl<'a> Object<'a> {
    pub(crate) fn new(pool: &'a Pool) -> Self {
        Self {
            pool,
            this: Cell::new(None),
            len: Cell::new(0),
            head: Cell::new(None),
            tail: Cell::new(None),
            index: Cell::new(Index::None),
            shadowed: Cell::new(false),
            last_built: Cell::new(IndexKind::None),
            stats: Cell::new(IndexStats::default()),
        }
    }

    /// Number of members, soft-deleted ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len.get()
    }

    /// Whether the object has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The first member, including soft-deleted ones.
    #[must_use]
    pub fn first(&self) -> Option<&'a Member<'a>> {
        self.head.get()
    }

    /// The last member, including soft-deleted ones.
    #[must_use]
    pub fn last(&self) -> Option<&'a Member<'a>> {
        self.tail.get()
    }

    /// Members in insertion order.
    #[must_use]
    pub fn iter(&self) -> Members<'a> {
        Members {
            next: self.head.get(),
            remaining: self.len(),
        }
    }

    /// Keys and values in insertion order, skipping soft-deleted members.
    #[must_use]
    pub fn entries(&self) -> Entries<'a> {
        Entries(self.iter())
    }

    /// Appends a member without checking for an existing key.
    pub fn append<K>(&self, key: &'a K, value: &'a Value<'a>) -> &'a Member<'a>
    where
        K: AsRef<[u8]> + ?Sized,
    {
        self.link(key.as_ref(), value)
    }

    /// [`append`](Self::append) with a key copied into the pool.
    pub fn append_owned(&self, key: &[u8], value: &'a Value<'a>) -> &'a Member<'a> {
        let key = self.pool.dup_unaligned(key);
        self.link(key, value)
    }

    /// First member with `key`, by walking the list.
    pub fn scan(&self, key: impl AsRef<[u8]>) -> Option<&'a Member<'a>> {
        let key = key.as_ref();
        self.iter().find(|member| member.key == key)
    }

    /// Last member with `key`, by walking the list backwards.
    pub fn scan_reverse(&self, key: impl AsRef<[u8]>) -> Option<&'a Member<'a>> {
        let key = key.as_ref();
        let mut member = self.tail.get();
        while let Some(current) = member {
            if current.key == key {
                return Some(current);
            }
            member = current.prev.get();
        }
        None
    }

    /// First member with `key`, via the sorted overlay.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<&'a Member<'a>> {
        let key = key.as_ref();
        let (sorted, _) = self.sorted();
        let at = sorted.partition_point(|member| member.key < key);
        sorted.get(at).copied().filter(|member| member.key == key)
    }

    /// The value of the first member with `key`, via the sorted overlay.
    pub fn get_value(&self, key: impl AsRef<[u8]>) -> Option<&'a Value<'a>> {
        self.get(key)?.value()
    }

    /// First member with `key`, via the tree overlay.
    pub fn find(&self, key: impl AsRef<[u8]>) -> Option<&'a Member<'a>> {
        let (root, _) = self.tree();
        tree::find(root, key.as_ref())
    }

    /// Sets `key` to `value`: replaces the value of the member [`find`]
    /// returns, or appends a new member.
    ///
    /// [`find`]: Self::find
    pub fn insert<K>(&self, key: &'a K, value: &'a Value<'a>) -> &'a Member<'a>
    where
        K: AsRef<[u8]> + ?Sized,
    {
        let key = key.as_ref();
        if let Some(existing) = self.find(key) {
            existing.set_value(value);
            return existing;
        }
        self.link(key, value)
    }

    /// [`insert`](Self::insert) with the key copied into the pool only when a
    /// new member is appended.
    pub fn insert_owned(&self, key: &[u8], value: &'a Value<'a>) -> &'a Member<'a> {
        if let Some(existing) = self.find(key) {
            existing.set_value(value);
            return existing;
        }
        let key = self.pool.dup_unaligned(key);
        self.link(key, value)
    }

    /// Unlinks `member`. Returns `false` when it does not belong to this
    /// object. The member's value is left intact.
    pub fn erase(&self, member: &'a Member<'a>) -> bool {
        if !same_node(member.owner.get(), self.this.get()) {
            return false;
        }

        match member.prev.get() {
            Some(prev) => prev.next.set(member.next.get()),
            None => self.head.set(member.next.get()),
        }
        match member.next.get() {
            Some(next) => next.prev.set(member.prev.get()),
            None => self.tail.set(member.prev.get()),
        }
        member.next.set(None);
        member.prev.set(None);
        member.owner.set(None);
        self.len.set(self.len.get() - 1);

        match self.index.get() {
            Index::None => {}
            Index::Sorted(_) => self.index.set(Index::None),
            Index::Tree(root) => {
                let (mut root, removed) = tree::remove(root, member);
                if removed && self.shadowed.get() {
                    if let Some(next) = self.scan(member.key) {
                        root = Some(tree::insert(root, next).0);
                    }
                }
                self.index.set(Index::Tree(root));
            }
        }
        true
    }

    /// Builds the sorted overlay unless it is live. Returns whether a build
    /// happened.
    pub fn build_sorted_index(&self) -> bool {
        self.sorted().1
    }

    /// Builds the tree overlay unless it is live. Returns whether a build
    /// happened.
    pub fn build_tree_index(&self) -> bool {
        self.tree().1
    }

    /// The overlay currently maintained for lookups.
    #[must_use]
    pub fn index_kind(&self) -> IndexKind {
        match self.index.get() {
            Index::None => IndexKind::None,
            Index::Sorted(_) => IndexKind::Sorted,
            Index::Tree(_) => IndexKind::Tree,
        }
    }

    /// Counts of overlay builds so far.
    #[must_use]
    pub fn stats(&self) -> IndexStats {
        self.stats.get()
    }

    pub(crate) fn link(&self, key: &'a [u8], value: &'a Value<'a>) -> &'a Member<'a> {
        let member: &'a Member<'a> = self.pool.alloc_value(Member {
            key,
            value: Cell::new(Some(value)),
            owner: Cell::new(self.this.get()),
            next: Cell::new(None),
            prev: Cell::new(self.tail.get()),
            left: Cell::new(None),
            right: Cell::new(None),
        });
        value.parent.set(self.this.get());
        match self.tail.get() {
            Some(tail) => tail.next.set(Some(member)),
            None => self.head.set(Some(member)),
        }
        self.tail.set(Some(member));
        self.len.set(self.len.get() + 1);

        match self.index.get() {
            Index::None => {}
            Index::Sorted(_) => self.index.set(Index::None),
            Index::Tree(root) => {
                let (root, inserted) = tree::insert(root, member);
                if !inserted {
                    self.shadowed.set(true);
                }
                self.index.set(Index::Tree(Some(root)));
            }
        }
        member
    }

    fn sorted(&self) -> (&'a [&'a Member<'a>], bool) {
        if let Index::Sorted(sorted) = self.index.get() {
            return (sorted, false);
        }
        self.note_build(IndexKind::Sorted);
        let sorted = self.pool.alloc_slice_fill_iter(self.iter());
        sorted.sort_by(|a, b| a.key.cmp(b.key));
        let sorted: &'a [&'a Member<'a>] = sorted;
        self.index.set(Index::Sorted(sorted));
        (sorted, true)
    }

    fn tree(&self) -> (tree::Link<'a>, bool) {
        if let Index::Tree(root) = self.index.get() {
            return (root, false);
        }
        self.note_build(IndexKind::Tree);
        let mut root = None;
        let mut shadowed = false;
        for member in self.iter() {
            let (new_root, inserted) = tree::insert(root, member);
            root = Some(new_root);
            shadowed |= !inserted;
        }
        self.shadowed.set(shadowed);
        self.index.set(Index::Tree(root));
        (root, true)
    }

    fn note_build(&self, kind: IndexKind) {
        let mut stats = self.stats.get();
        match kind {
            IndexKind::Sorted => stats.sorted_builds += 1,
            IndexKind::Tree => stats.tree_builds += 1,
            IndexKind::None => {}
        }
        let previous = self.last_built.get();
        if previous != IndexKind::None && previous != kind {
            stats.switches += 1;
            tracing::debug!(
                from = ?previous,
                to = ?kind,
                members = self.len(),
                switches = stats.switches,
                "object lookup overlay rebuilt as the other kind"
            );
        }
        self.last_built.set(kind);
        self.stats.set(stats);
    }
}

/// Iterator over an object's members in insertion order.
///
/// The length is fixed when the iterator is created; members appended while
/// iterating are not visited.
#[derive(Clone)]
pub struct Members<'a> {
    next: Option<&'a Member<'a>>,
    remaining: usize,
}

impl<'a> Iterator for Members<'a> {
    type Item = &'a Member<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let member = self.next?;
        self.next = member.next.get();
        self.remaining -= 1;
        Some(member)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Members<'_> {}

/// Iterator over `(key, value)` pairs, skipping soft-deleted members.
#[derive(Clone)]
pub struct Entries<'a>(Members<'a>);

impl<'a> Iterator for Entries<'a> {
    type Item = (&'a [u8], &'a Value<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        self.0
            .by_ref()
            .find_map(|member| Some((member.key, member.value.get()?)))
    }
}
