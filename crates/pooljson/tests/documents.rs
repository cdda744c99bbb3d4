#![expect(missing_docs)]

use std::fmt::Write;

use pooljson::{Kind, Pool, PoolOptions, Value, parse, parse_copy};
use rstest::rstest;

fn render_results(inputs: &[&str]) -> String {
    let pool = Pool::new(256);
    let mut out = String::new();
    for input in inputs {
        match parse_copy(&pool, input.as_bytes()) {
            Ok(value) => writeln!(out, "ok: {value}"),
            Err(err) => writeln!(out, "{err} | {}", err.describe(input.as_bytes())),
        }
        .unwrap();
    }
    out
}

#[test]
fn snapshot_error_reports() {
    let inputs = [r#"{"a":1,}"#, r#"{"a" 1}"#, "[1,\n2,\n]]", r#""open"#];
    insta::assert_snapshot!(render_results(&inputs), @r#"
    ok: {"a":1}
    invalid character '1' at byte 5 | Error at row 1, column: 6 (5 bytes into json)
    trailing characters after the root value at byte 8 | Error at row 3, column: 2 (8 bytes into json)
    unexpected end of input at byte 5 | Error at row 1, column: 6 (5 bytes into json)
    "#);
}

#[test]
fn edit_a_parsed_document() {
    let pool = Pool::new(1024);
    let mut input =
        br#"{"name":"svc","ports":[80,443],"env":{"mode":"dev"},"name":"dup"}"#.to_vec();
    let root = parse(&pool, &mut input).unwrap();
    let object = root.as_object().unwrap();

    let first = object.insert("name", Value::string(&pool, "api"));
    assert!(std::ptr::eq(first, object.first().unwrap()));
    let duplicate = object.scan_reverse("name").unwrap();
    assert!(object.erase(duplicate));

    let ports = object.get_value("ports").and_then(Value::as_array).unwrap();
    ports.append(Value::number(&pool, 8080));
    assert!(ports.erase(ports.first().unwrap()));

    let env = object.find("env").and_then(|member| member.value()).unwrap();
    env.as_object()
        .unwrap()
        .insert_owned(b"level", Value::number_text(&pool, "3"));
    object.append("tags", Value::array(&pool));

    insta::assert_snapshot!(root, @r#"{"name":"api","ports":[443,8080],"env":{"mode":"dev","level":3},"tags":[]}"#);
    insta::assert_snapshot!(format!("{root:?}"), @r#"Object {"name": String("api"), "ports": Array [Number("443"), Number("8080")], "env": Object {"mode": String("dev"), "level": Number("3")}, "tags": Array []}"#);
    assert_eq!(object.stats().switches, 2);
}

#[rstest]
#[case::flat(r#"{"a":[1,2,3],"b":null}"#)]
#[case::nested(r#"[[[{"x":[true,false]}]],{"y":{"z":-0.5}}]"#)]
#[case::strings(r#"{"k\"ey":"v\\alé","":""}"#)]
fn clear_and_reparse(#[case] doc: &str) {
    let mut pool = Pool::new(128);
    for _ in 0..10 {
        {
            let root = parse_copy(&pool, doc.as_bytes()).unwrap();
            assert_eq!(root.to_string(), doc);
        }
        pool.clear();
        assert_eq!(pool.block_count(), 1);
        assert_eq!(pool.size(), 0);
    }
}

#[test]
fn checkpoint_discards_a_scratch_parse() {
    let mut pool = Pool::with_options(PoolOptions {
        initial_size: 4096,
        minimum_growth_size: Some(1024),
    });
    let kept = parse_copy(&pool, b"[1]").unwrap().to_string();
    let mark = pool.checkpoint();
    let size = pool.size();

    let big = format!("[{}1]", "1,".repeat(1000));
    let scratch = parse_copy(&pool, big.as_bytes()).unwrap();
    assert_eq!(scratch.as_array().map(|array| array.len()), Some(1001));
    let blocks = pool.block_count();
    assert!(blocks > 1);

    pool.reset(mark);
    assert_eq!(pool.size(), size);
    assert_eq!(kept, "[1]");

    // A second scratch parse of the same shape fits in the kept blocks.
    let again = parse_copy(&pool, big.as_bytes()).unwrap();
    assert_eq!(again.to_string(), big);
    assert_eq!(pool.block_count(), blocks);
}

#[test]
fn escaped_root_string_decodes() {
    let pool = Pool::new(64);
    let mut input = br#""\u0041\u0042""#.to_vec();
    let root = parse(&pool, &mut input).unwrap();
    assert_eq!(root.kind(), Kind::String);
    assert_eq!(root.value_bytes(), Some(&br"\u0041\u0042"[..]));
    assert_eq!(root.decoded(&pool), Some(&b"AB"[..]));
}

#[rstest]
#[case("0", Kind::Zero)]
#[case("-0", Kind::Zero)]
#[case("12", Kind::Number)]
#[case("1.25", Kind::Decimal)]
#[case("true", Kind::True)]
#[case("false", Kind::False)]
#[case("null", Kind::Null)]
#[case(r#""s""#, Kind::String)]
#[case("[]", Kind::Array)]
#[case("{}", Kind::Object)]
fn root_kinds(#[case] doc: &str, #[case] kind: Kind) {
    let pool = Pool::new(64);
    assert_eq!(parse_copy(&pool, doc.as_bytes()).unwrap().kind(), kind);
}

#[cfg(feature = "tracking")]
#[test]
fn tracked_pools_release_everything() {
    use std::sync::Arc;

    use pooljson::TrackingAllocator;

    let tracker = Arc::new(TrackingAllocator::new("documents"));
    {
        let pool = Pool::with_allocator(
            PoolOptions {
                initial_size: 64,
                minimum_growth_size: None,
            },
            tracker.clone(),
        );
        let doc = format!("[{}0]", r#"{"k":"v"},"#.repeat(100));
        let root = parse_copy(&pool, doc.as_bytes()).unwrap();
        assert_eq!(root.as_array().map(|array| array.len()), Some(101));
        assert!(tracker.report().live_blocks > 1);
    }
    let report = tracker.finish();
    assert_eq!(report.live_blocks, 0);
    assert_eq!(report.allocations, report.deallocations);
}
