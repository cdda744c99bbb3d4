#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pooljson::{ParserOptions, Pool, parse_copy, parse_with_options};

#[derive(Debug, Arbitrary)]
struct Input {
    decode_strings: bool,
    disallow_binary: bool,
    allow_trailing_data: bool,
    /// Small pools force block growth in the middle of a parse.
    pool_size: u8,
    data: Vec<u8>,
}

fn run(input: Input) {
    let options = ParserOptions {
        decode_strings: input.decode_strings,
        disallow_binary: input.disallow_binary,
        allow_trailing_data: input.allow_trailing_data,
    };
    let mut pool = Pool::new(usize::from(input.pool_size).max(1));
    let mut data = input.data;
    let len = data.len();

    let text = match parse_with_options(&pool, &mut data, options) {
        Ok(root) => root.to_vec(),
        Err(err) => {
            assert!(err.offset() <= len, "{err} past the end of {len} bytes");
            pool.assert_consistent();
            return;
        }
    };
    pool.assert_consistent();
    pool.clear();
    pool.assert_consistent();

    // Decoded strings are no longer valid string bodies.
    if input.decode_strings {
        return;
    }
    let again = parse_copy(&pool, &text).expect("serialized output parses");
    assert_eq!(again.to_vec(), text);
}

fuzz_target!(|input: Input| run(input));
