//! A growable byte buffer that always keeps a NUL byte after its contents.

use std::{fmt, mem::MaybeUninit};

use bstr::BStr;

use crate::pool::Pool;

/// Growable byte string with a trailing NUL maintained after every mutation.
///
/// The terminator is not part of [`len`](Buffer::len) or
/// [`as_bytes`](Buffer::as_bytes); [`as_bytes_with_nul`](Buffer::as_bytes_with_nul)
/// exposes it for consumers that want C-style strings.
///
/// When more room is needed the buffer grows to `needed + 50 + capacity / 8`.
#[derive(Clone, PartialEq, Eq)]
pub struct Buffer {
    data: Vec<u8>,
}

impl Buffer {
    /// Creates an empty buffer with room for `initial` bytes.
    #[must_use]
    pub fn new(initial: usize) -> Self {
        let mut data = Vec::with_capacity(initial + 1);
        data.push(0);
        Self { data }
    }

    /// Length of the contents, not counting the terminator.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() - 1
    }

    /// Whether the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes the buffer can hold without growing.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.capacity() - 1
    }

    /// The contents without the terminator.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len()]
    }

    /// The contents followed by the terminating NUL.
    #[must_use]
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        &self.data
    }

    /// The contents as a byte string.
    #[must_use]
    pub fn as_bstr(&self) -> &BStr {
        BStr::new(self.as_bytes())
    }

    /// The contents from `pos` on; empty past the end.
    #[must_use]
    pub fn at(&self, pos: usize) -> &[u8] {
        self.as_bytes().get(pos..).unwrap_or_default()
    }

    /// Consumes the buffer, dropping the terminator.
    #[must_use]
    pub fn into_vec(mut self) -> Vec<u8> {
        self.data.pop();
        self.data
    }

    /// Empties the buffer, keeping its allocation.
    pub fn clear(&mut self) {
        self.data.clear();
        self.data.push(0);
    }

    /// Appends `bytes`, growing when needed.
    pub fn append(&mut self, bytes: &[u8]) {
        self.reserve_for(self.len() + bytes.len());
        self.data.pop();
        self.data.extend_from_slice(bytes);
        self.data.push(0);
    }

    /// Appends a single byte.
    pub fn append_byte(&mut self, byte: u8) {
        self.reserve_for(self.len() + 1);
        let len = self.len();
        self.data[len] = byte;
        self.data.push(0);
    }

    /// Appends the UTF-8 bytes of `s`.
    pub fn append_str(&mut self, s: &str) {
        self.append(s.as_bytes());
    }

    /// Appends `byte` `n` times.
    pub fn append_repeated(&mut self, byte: u8, n: usize) {
        self.reserve_for(self.len() + n);
        self.data.pop();
        self.data.resize(self.data.len() + n, byte);
        self.data.push(0);
    }

    /// Appends formatted text, writing straight into spare capacity when it
    /// fits and growing exactly once otherwise.
    ///
    /// # Panics
    ///
    /// Panics if a formatting implementation reports an error.
    pub fn append_fmt(&mut self, args: fmt::Arguments<'_>) {
        if let Some(s) = args.as_str() {
            self.append_str(s);
            return;
        }

        let len = self.len();
        self.data.pop();
        let mut writer = WindowWriter::new(self.data.spare_capacity_mut());
        fmt::write(&mut writer, args)
            .expect("a formatting trait implementation returned an error");
        let needed = writer.needed();

        if needed <= self.data.capacity() - len {
            // SAFETY: the writer initialised `needed` bytes of spare capacity.
            unsafe { self.data.set_len(len + needed) };
            self.data.push(0);
            return;
        }

        self.data.push(0);
        self.reserve_for(len + needed);
        self.data.pop();
        let mut sink = VecSink(&mut self.data);
        fmt::write(&mut sink, args)
            .expect("a formatting trait implementation returned an error");
        self.data.push(0);
    }

    /// Replaces the contents with `bytes`.
    pub fn set(&mut self, bytes: &[u8]) {
        self.clear();
        self.append(bytes);
    }

    /// Replaces the contents with formatted text.
    pub fn set_fmt(&mut self, args: fmt::Arguments<'_>) {
        self.clear();
        self.append_fmt(args);
    }

    /// Sets the length to `len`, keeping the existing prefix and zero-filling
    /// any new bytes.
    pub fn resize(&mut self, len: usize) {
        self.reserve_for(len);
        self.data.pop();
        self.data.resize(len, 0);
        self.data.push(0);
    }

    /// Sets the length to `len` with zeroed contents and returns them.
    pub fn alloc(&mut self, len: usize) -> &mut [u8] {
        self.clear();
        self.resize(len);
        let end = self.len();
        &mut self.data[..end]
    }

    /// Grows by `len` zeroed bytes and returns them.
    pub fn append_alloc(&mut self, len: usize) -> &mut [u8] {
        let start = self.len();
        self.resize(start + len);
        let end = self.len();
        &mut self.data[start..end]
    }

    /// Drops `len` bytes from the end, or everything if `len` exceeds the
    /// length.
    pub fn shrink_by(&mut self, len: usize) {
        let keep = self.len().saturating_sub(len);
        self.data.truncate(keep);
        self.data.push(0);
    }

    fn reserve_for(&mut self, needed: usize) {
        let capacity = self.capacity();
        if needed <= capacity {
            return;
        }
        let target = needed + 50 + capacity / 8;
        self.data.reserve_exact(target + 1 - self.data.len());
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new(0)
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_bstr(), f)
    }
}

impl fmt::Write for Buffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.append_str(s);
        Ok(())
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// A [`Buffer`] whose storage comes from a [`Pool`].
///
/// Growth copies the contents into a larger pool allocation with the same
/// `needed + 50 + capacity / 8` rule; the old storage stays in the pool until
/// it is cleared. There is nothing to free, and
/// [`into_bytes`](PoolBuffer::into_bytes) hands out the contents for as long
/// as the pool lives.
pub struct PoolBuffer<'a> {
    pool: &'a Pool,
    /// `capacity + 1` bytes; `data[len]` is always NUL.
    data: &'a mut [u8],
    len: usize,
}

impl<'a> PoolBuffer<'a> {
    /// Creates an empty buffer with room for `initial` bytes.
    #[must_use]
    pub fn new(pool: &'a Pool, initial: usize) -> Self {
        Self {
            pool,
            data: pool.alloc_zeroed(initial + 1),
            len: 0,
        }
    }

    /// Length of the contents, not counting the terminator.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes the buffer can hold without growing.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len() - 1
    }

    /// The contents without the terminator.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// The contents followed by the terminating NUL.
    #[must_use]
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        &self.data[..=self.len]
    }

    /// The contents as a byte string.
    #[must_use]
    pub fn as_bstr(&self) -> &BStr {
        BStr::new(self.as_bytes())
    }

    /// Gives up the buffer, keeping the contents in the pool.
    #[must_use]
    pub fn into_bytes(self) -> &'a [u8] {
        let data: &'a [u8] = self.data;
        &data[..self.len]
    }

    /// Empties the buffer, keeping its storage.
    pub fn clear(&mut self) {
        self.len = 0;
        self.data[0] = 0;
    }

    /// Appends `bytes`, growing when needed.
    pub fn append(&mut self, bytes: &[u8]) {
        let end = self.len + bytes.len();
        self.reserve_for(end);
        self.data[self.len..end].copy_from_slice(bytes);
        self.data[end] = 0;
        self.len = end;
    }

    /// Appends a single byte.
    pub fn append_byte(&mut self, byte: u8) {
        self.append(&[byte]);
    }

    /// Appends the UTF-8 bytes of `s`.
    pub fn append_str(&mut self, s: &str) {
        self.append(s.as_bytes());
    }

    /// Appends formatted text.
    ///
    /// # Panics
    ///
    /// Panics if a formatting implementation reports an error.
    pub fn append_fmt(&mut self, args: fmt::Arguments<'_>) {
        fmt::write(self, args).expect("a formatting trait implementation returned an error");
    }

    /// Replaces the contents with `bytes`.
    pub fn set(&mut self, bytes: &[u8]) {
        self.clear();
        self.append(bytes);
    }

    /// Drops `len` bytes from the end, or everything if `len` exceeds the
    /// length.
    pub fn shrink_by(&mut self, len: usize) {
        self.len = self.len.saturating_sub(len);
        self.data[self.len] = 0;
    }

    fn reserve_for(&mut self, needed: usize) {
        let capacity = self.capacity();
        if needed <= capacity {
            return;
        }
        let target = needed + 50 + capacity / 8;
        let data = self.pool.alloc_zeroed(target + 1);
        data[..self.len].copy_from_slice(&self.data[..self.len]);
        self.data = data;
    }
}

impl fmt::Debug for PoolBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_bstr(), f)
    }
}

impl fmt::Write for PoolBuffer<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.append_str(s);
        Ok(())
    }
}

impl AsRef<[u8]> for PoolBuffer<'_> {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Formats into a fixed window, copying each piece only while it fits and
/// counting the total length regardless.
pub(crate) struct WindowWriter<'w> {
    window: &'w mut [MaybeUninit<u8>],
    needed: usize,
}

impl<'w> WindowWriter<'w> {
    pub(crate) fn new(window: &'w mut [MaybeUninit<u8>]) -> Self {
        Self { window, needed: 0 }
    }

    /// Total bytes the formatted text needs. When this does not exceed the
    /// window length, exactly that prefix of the window is initialised.
    pub(crate) fn needed(&self) -> usize {
        self.needed
    }
}

impl fmt::Write for WindowWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let start = self.needed;
        self.needed += s.len();
        if let Some(dst) = self.window.get_mut(start..self.needed) {
            for (slot, &byte) in dst.iter_mut().zip(s.as_bytes()) {
                slot.write(byte);
            }
        }
        Ok(())
    }
}

struct VecSink<'v>(&'v mut Vec<u8>);

impl fmt::Write for VecSink<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Write as _;

    use super::*;

    #[test]
    fn terminator_follows_every_mutation() {
        let mut buffer = Buffer::new(2);
        buffer.append(b"abc");
        assert_eq!(buffer.as_bytes_with_nul(), b"abc\0");
        buffer.append_byte(b'd');
        buffer.append_repeated(b'-', 3);
        assert_eq!(buffer.as_bytes_with_nul(), b"abcd---\0");
        buffer.shrink_by(2);
        assert_eq!(buffer.as_bytes_with_nul(), b"abcd-\0");
        buffer.shrink_by(100);
        assert_eq!(buffer.as_bytes_with_nul(), b"\0");
        assert!(buffer.is_empty());
    }

    #[test]
    fn growth_adds_slack() {
        let mut buffer = Buffer::new(0);
        buffer.append(&[1; 100]);
        assert!(buffer.capacity() >= 150);
    }

    #[test]
    fn formatted_appends() {
        let mut buffer = Buffer::new(4);
        buffer.append_fmt(format_args!("{}:{}", "key", 42));
        buffer.append_fmt(format_args!(",{}", 7));
        assert_eq!(buffer.as_bytes(), b"key:42,7");
        write!(buffer, "|{:>3}", 5).unwrap();
        assert_eq!(buffer.as_bstr(), "key:42,7|  5");
        buffer.set_fmt(format_args!("{}", -1));
        assert_eq!(buffer.as_bytes_with_nul(), b"-1\0");
    }

    #[test]
    fn resize_keeps_prefix_and_alloc_discards() {
        let mut buffer = Buffer::new(0);
        buffer.set(b"hello");
        buffer.resize(7);
        assert_eq!(buffer.as_bytes(), b"hello\0\0");
        buffer.resize(2);
        assert_eq!(buffer.as_bytes(), b"he");
        let fresh = buffer.alloc(3);
        assert_eq!(fresh, &[0, 0, 0]);
        fresh.copy_from_slice(b"xyz");
        buffer.append_alloc(2).copy_from_slice(b"!!");
        assert_eq!(buffer.as_bytes_with_nul(), b"xyz!!\0");
    }

    #[test]
    fn at_returns_suffix() {
        let mut buffer = Buffer::new(0);
        buffer.set(b"abcdef");
        assert_eq!(buffer.at(4), b"ef");
        assert_eq!(buffer.at(9), b"");
        assert_eq!(buffer.clone().into_vec(), b"abcdef".to_vec());
    }

    #[test]
    fn pool_buffer_grows_inside_the_pool() {
        let pool = Pool::new(64);
        let mut buffer = PoolBuffer::new(&pool, 2);
        buffer.append(b"abc");
        assert_eq!(buffer.capacity(), 53);
        assert_eq!(buffer.as_bytes_with_nul(), b"abc\0");
        buffer.append_byte(b'd');
        write!(buffer, "-{}", 12).unwrap();
        buffer.append_fmt(format_args!("{}", '!'));
        assert_eq!(buffer.as_bstr(), "abcd-12!");
        buffer.shrink_by(4);
        assert_eq!(buffer.as_bytes_with_nul(), b"abcd\0");
        buffer.set(b"xy");
        assert_eq!(buffer.as_bytes_with_nul(), b"xy\0");
        assert_eq!(pool.size(), 3 + 54);
        let kept = buffer.into_bytes();
        assert_eq!(kept, b"xy");
    }

    #[test]
    fn pool_buffer_clear_keeps_storage() {
        let pool = Pool::new(256);
        let mut buffer = PoolBuffer::new(&pool, 16);
        buffer.append_str("0123456789");
        let size = pool.size();
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.as_bytes_with_nul(), b"\0");
        buffer.append_str("abc");
        assert_eq!(pool.size(), size);
        assert_eq!(format!("{buffer:?}"), "\"abc\"");
    }

    #[allow(clippy::needless_pass_by_value)]
    #[quickcheck_macros::quickcheck]
    fn appends_concatenate(chunks: Vec<Vec<u8>>, cut: usize) -> bool {
        let mut buffer = Buffer::new(1);
        for chunk in &chunks {
            buffer.append(chunk);
        }
        let mut expected = chunks.concat();
        let cut = cut % (expected.len() + 1);
        buffer.shrink_by(cut);
        expected.truncate(expected.len() - cut);
        expected.push(0);
        buffer.as_bytes_with_nul() == expected.as_slice()
    }
}
