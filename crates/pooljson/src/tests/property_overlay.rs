use std::ptr;

use quickcheck::QuickCheck;

use super::arbitrary::Op;
use crate::{Array, Element, Member, Object, Pool, Value};

const KEYS: [&str; 5] = ["a", "b", "c", "dd", ""];

fn tests() -> u64 {
    #[cfg(not(miri))]
    let tests = if is_ci::cached() { 2_000 } else { 300 };
    #[cfg(miri)]
    let tests = 5;
    tests
}

fn same<T>(a: Option<&T>, b: Option<&T>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => ptr::eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn object_agrees<'a>(object: &Object<'a>, model: &[&'a Member<'a>]) -> bool {
    if object.len() != model.len() || !object.iter().zip(model).all(|(a, b)| ptr::eq(a, *b)) {
        return false;
    }
    KEYS.iter().all(|key| {
        let first = model.iter().copied().find(|m| m.key() == key.as_bytes());
        let last = model.iter().copied().rev().find(|m| m.key() == key.as_bytes());
        same(object.scan(key), first)
            && same(object.scan_reverse(key), last)
            && same(object.get(key), first)
            && same(object.find(key), first)
    })
}

/// Property: under any mix of appends, inserts and erases, both lookup
/// overlays keep agreeing with a linear scan, including across overlay
/// switches.
#[test]
fn object_overlays_agree_with_scan() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(ops: Vec<Op>) -> bool {
        let pool = Pool::new(1024);
        let root = Value::object(&pool);
        let object = root.as_object().unwrap();
        let mut model: Vec<&Member<'_>> = Vec::new();
        for op in ops {
            match op {
                Op::Append(n) => {
                    let key = KEYS[usize::from(n) % KEYS.len()];
                    model.push(object.append(key, Value::number(&pool, n.into())));
                }
                Op::Insert(n) => {
                    let key = KEYS[usize::from(n) % KEYS.len()];
                    let member = object.insert(key, Value::null(&pool));
                    if !model.iter().any(|m| ptr::eq(*m, member)) {
                        model.push(member);
                    }
                    let parent = member.value().and_then(Value::parent);
                    if !parent.is_some_and(|parent| ptr::eq(parent, root)) {
                        return false;
                    }
                }
                Op::Erase(n) if !model.is_empty() => {
                    let member = model.remove(usize::from(n) % model.len());
                    if !object.erase(member) || object.erase(member) {
                        return false;
                    }
                }
                Op::Erase(_) => {}
                Op::Build(n) => {
                    if n % 2 == 0 {
                        object.build_sorted_index();
                    } else {
                        object.build_tree_index();
                    }
                }
            }
            if !object_agrees(object, &model) {
                return false;
            }
        }
        true
    }

    QuickCheck::new()
        .tests(tests())
        .quickcheck(prop as fn(Vec<Op>) -> bool);
}

fn array_agrees<'a>(array: &Array<'a>, model: &[&'a Element<'a>]) -> bool {
    array.len() == model.len()
        && array.iter().zip(model).all(|(a, b)| ptr::eq(a, *b))
        && (0..=model.len()).all(|i| {
            let expected = model.get(i).and_then(|element| element.value());
            same(array.nth(i), expected) && same(array.scan(i), expected)
        })
}

/// Property: positional lookups through the index agree with walking the
/// list while elements are appended and erased at any position.
#[test]
fn array_index_agrees_with_walk() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(ops: Vec<Op>) -> bool {
        let pool = Pool::new(1024);
        let root = Value::array(&pool);
        let array = root.as_array().unwrap();
        let mut model: Vec<&Element<'_>> = Vec::new();
        for op in ops {
            match op {
                Op::Append(n) | Op::Insert(n) => {
                    model.push(array.append(Value::number(&pool, n.into())));
                }
                Op::Erase(n) if !model.is_empty() => {
                    let element = model.remove(usize::from(n) % model.len());
                    if !array.erase(element) || array.erase(element) {
                        return false;
                    }
                }
                Op::Erase(_) | Op::Build(_) => {}
            }
            if !array_agrees(array, &model) {
                return false;
            }
        }
        true
    }

    QuickCheck::new()
        .tests(tests())
        .quickcheck(prop as fn(Vec<Op>) -> bool);
}
