//! Intrusive treap over object members.
//!
//! Nodes are the [`Member`]s themselves, linked through their `left`/`right`
//! cells. Priorities are a hash of the member's address, which keeps the tree
//! balanced in expectation without any per-pool state. Keys compare
//! bytewise; a key already present is not inserted again.

use std::{cmp::Ordering, ptr};

use crate::object::Member;

pub(crate) type Link<'a> = Option<&'a Member<'a>>;

fn priority(member: &Member<'_>) -> u64 {
    let mut z = (ptr::from_ref(member) as usize as u64).wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

pub(crate) fn find<'a>(mut node: Link<'a>, key: &[u8]) -> Link<'a> {
    while let Some(current) = node {
        node = match key.cmp(current.key()) {
            Ordering::Equal => return Some(current),
            Ordering::Less => current.left.get(),
            Ordering::Greater => current.right.get(),
        };
    }
    None
}

/// Inserts `member` unless its key is present. Returns the new root and
/// whether the member went in.
pub(crate) fn insert<'a>(root: Link<'a>, member: &'a Member<'a>) -> (&'a Member<'a>, bool) {
    let Some(node) = root else {
        member.left.set(None);
        member.right.set(None);
        return (member, true);
    };
    match member.key().cmp(node.key()) {
        Ordering::Equal => (node, false),
        Ordering::Less => {
            let (child, inserted) = insert(node.left.get(), member);
            node.left.set(Some(child));
            if inserted && priority(child) > priority(node) {
                (rotate_right(node, child), true)
            } else {
                (node, inserted)
            }
        }
        Ordering::Greater => {
            let (child, inserted) = insert(node.right.get(), member);
            node.right.set(Some(child));
            if inserted && priority(child) > priority(node) {
                (rotate_left(node, child), true)
            } else {
                (node, inserted)
            }
        }
    }
}

/// Removes exactly `member` (not another entry sharing its key). Returns the
/// new root and whether it was found.
pub(crate) fn remove<'a>(root: Link<'a>, member: &'a Member<'a>) -> (Link<'a>, bool) {
    let Some(node) = root else {
        return (None, false);
    };
    match member.key().cmp(node.key()) {
        Ordering::Equal if ptr::eq(node, member) => {
            let merged = merge(node.left.get(), node.right.get());
            node.left.set(None);
            node.right.set(None);
            (merged, true)
        }
        Ordering::Equal => (Some(node), false),
        Ordering::Less => {
            let (child, removed) = remove(node.left.get(), member);
            node.left.set(child);
            (Some(node), removed)
        }
        Ordering::Greater => {
            let (child, removed) = remove(node.right.get(), member);
            node.right.set(child);
            (Some(node), removed)
        }
    }
}

fn merge<'a>(left: Link<'a>, right: Link<'a>) -> Link<'a> {
    match (left, right) {
        (None, other) | (other, None) => other,
        (Some(l), Some(r)) => {
            if priority(l) > priority(r) {
                l.right.set(merge(l.right.get(), Some(r)));
                Some(l)
            } else {
                r.left.set(merge(Some(l), r.left.get()));
                Some(r)
            }
        }
    }
}

fn rotate_right<'a>(node: &'a Member<'a>, pivot: &'a Member<'a>) -> &'a Member<'a> {
    node.left.set(pivot.right.get());
    pivot.right.set(Some(node));
    pivot
}

fn rotate_left<'a>(node: &'a Member<'a>, pivot: &'a Member<'a>) -> &'a Member<'a> {
    node.right.set(pivot.left.get());
    pivot.left.set(Some(node));
    pivot
}

/// In-order walk, for checking the tree shape.
#[cfg(test)]
pub(crate) fn in_order<'a>(root: Link<'a>, out: &mut Vec<&'a Member<'a>>) {
    if let Some(node) = root {
        in_order(node.left.get(), out);
        out.push(node);
        in_order(node.right.get(), out);
    }
}

/// Whether every parent outranks its children.
#[cfg(test)]
pub(crate) fn is_heap_ordered(root: Link<'_>) -> bool {
    let Some(node) = root else { return true };
    [node.left.get(), node.right.get()]
        .into_iter()
        .flatten()
        .all(|child| priority(child) <= priority(node))
        && is_heap_ordered(node.left.get())
        && is_heap_ordered(node.right.get())
}
