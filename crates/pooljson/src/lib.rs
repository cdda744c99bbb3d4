//! Arena-backed, zero-copy JSON.
//!
//! Documents are parsed straight out of a mutable input buffer: strings,
//! keys and numbers keep pointing into it, and the tree nodes live in a
//! [`Pool`]. Both borrows share one lifetime, so a tree can outlive neither
//! its input nor its pool, and clearing the pool requires every tree built in
//! it to be gone.
//!
//! ```
//! use pooljson::{Pool, Value, parse};
//!
//! let pool = Pool::new(4096);
//! let mut input = br#"{"name":"pool","sizes":[1,2,3]}"#.to_vec();
//! let root = parse(&pool, &mut input)?;
//!
//! assert_eq!(root.path_value("name"), Some(&b"pool"[..]));
//! let sizes = root.path("sizes").and_then(Value::as_array).unwrap();
//! sizes.append(Value::number(&pool, 4));
//! assert_eq!(root.to_string(), r#"{"name":"pool","sizes":[1,2,3,4]}"#);
//! # Ok::<(), pooljson::ParseError>(())
//! ```
//!
//! Objects keep insertion order and allow duplicate keys. Lookups go through
//! lazily built overlays: [`Object::get`] uses a sorted index,
//! [`Object::find`] a balanced tree that also supports
//! [`Object::insert`], and [`Array::nth`] a positional index.

mod array;
mod buffer;
pub mod escape;
mod object;
mod parser;
mod pool;
mod serialize;
#[cfg(feature = "tracking")]
mod tracking;
mod tree;
mod value;
mod walk;

#[cfg(test)]
mod tests;

pub use array::{Array, Element, Elements, Values};
pub use buffer::{Buffer, PoolBuffer};
pub use object::{Entries, IndexKind, IndexStats, Member, Members, Object};
pub use parser::{
    Location, ParseError, ParserOptions, SyntaxError, parse, parse_copy, parse_copy_with_options,
    parse_with_options,
};
pub use pool::{BlockAllocator, Checkpoint, Pool, PoolOptions, SystemAllocator};
#[cfg(feature = "tracking")]
pub use tracking::{AllocationReport, FlushHandle, TrackingAllocator};
pub use value::{Kind, Text, Value};
pub use walk::{Event, Walk};
