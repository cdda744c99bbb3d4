use quickcheck::QuickCheck;

use super::arbitrary::{Doc, Padding};
use crate::{ParserOptions, Pool, parse_copy, parse_copy_with_options};

fn tests() -> u64 {
    #[cfg(not(miri))]
    let tests = if is_ci::cached() { 10_000 } else { 1_000 };
    #[cfg(miri)]
    let tests = 10;
    tests
}

/// Property: parsing any document, with any whitespace, and serializing it
/// again yields the compact text, and the trees compare equal.
#[test]
fn reserialize_is_compact_text() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(doc: Doc, pad: Padding) -> bool {
        let compact = doc.compact();
        let padded = doc.padded(&pad);
        let pool = Pool::new(512);
        let (Ok(a), Ok(b)) = (
            parse_copy(&pool, compact.as_bytes()),
            parse_copy(&pool, padded.as_bytes()),
        ) else {
            return false;
        };
        a.to_vec() == compact.as_bytes() && b.to_vec() == compact.as_bytes() && a == b
    }

    QuickCheck::new()
        .tests(tests())
        .quickcheck(prop as fn(Doc, Padding) -> bool);
}

/// Property: the logical content seen through `serde` matches what
/// `serde_json` reads from the same text, with and without in-place decoding.
#[test]
fn content_matches_serde_json() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(doc: Doc, decode_strings: bool) -> bool {
        let text = doc.compact();
        let expected: serde_json::Value = serde_json::from_str(&text).unwrap();
        let pool = Pool::new(512);
        let options = ParserOptions {
            decode_strings,
            ..Default::default()
        };
        parse_copy_with_options(&pool, text.as_bytes(), options)
            .is_ok_and(|root| serde_json::to_value(root).ok() == Some(expected))
    }

    QuickCheck::new()
        .tests(tests())
        .quickcheck(prop as fn(Doc, bool) -> bool);
}

/// Property: truncating a valid document never panics, and the error offset
/// stays inside the truncated input.
#[test]
fn truncation_reports_in_bounds() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(doc: Doc, cut: usize) -> bool {
        let text = doc.compact();
        let cut = cut % (text.len() + 1);
        let pool = Pool::new(512);
        match parse_copy(&pool, &text.as_bytes()[..cut]) {
            Ok(_) => true,
            Err(err) => err.offset() <= cut,
        }
    }

    QuickCheck::new()
        .tests(tests())
        .quickcheck(prop as fn(Doc, usize) -> bool);
}
