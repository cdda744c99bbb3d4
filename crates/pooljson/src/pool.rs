//! A growable bump arena.
//!
//! A [`Pool`] hands out memory from a chain of raw blocks. Allocation only
//! moves a cursor; individual allocations are never freed. The whole arena is
//! released at once by [`Pool::clear`] or dropped. [`Pool::reset`] only
//! rewinds the cursor: blocks grown after a checkpoint stay chained and are
//! reused by later growth.
//!
//! Every lifecycle operation that invalidates memory takes `&mut self`, so any
//! reference still pointing into the arena turns into a borrow error instead of
//! a dangling pointer.
//!
//! Values stored with [`Pool::alloc_value`] are never dropped; the arena
//! refuses types that need dropping at compile time.

use std::{
    alloc::Layout,
    cell::Cell,
    fmt,
    mem::{self, MaybeUninit},
    ptr::{self, NonNull},
    slice, str,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::buffer::WindowWriter;

const WORD: usize = mem::size_of::<usize>();
const HEADER_SIZE: usize = mem::size_of::<BlockHeader>();
const BLOCK_ALIGN: usize = mem::align_of::<BlockHeader>();

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(0);

/// Source of the raw blocks backing a [`Pool`].
///
/// Allocation failure is fatal: implementations are expected to call
/// [`std::alloc::handle_alloc_error`] rather than return.
pub trait BlockAllocator: Send + Sync {
    /// Allocates a block for `layout`. The layout size is never zero.
    fn allocate(&self, layout: Layout) -> NonNull<u8>;

    /// Releases a block.
    ///
    /// # Safety
    ///
    /// `block` must have been returned by [`BlockAllocator::allocate`] on this
    /// allocator with the same `layout`, and must not be used afterwards.
    unsafe fn deallocate(&self, block: NonNull<u8>, layout: Layout);
}

/// Blocks straight from the global allocator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAllocator;

impl BlockAllocator for SystemAllocator {
    fn allocate(&self, layout: Layout) -> NonNull<u8> {
        // SAFETY: pool blocks always include a header, so the size is non-zero.
        let raw = unsafe { std::alloc::alloc(layout) };
        NonNull::new(raw).unwrap_or_else(|| std::alloc::handle_alloc_error(layout))
    }

    unsafe fn deallocate(&self, block: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded from the caller.
        unsafe { std::alloc::dealloc(block.as_ptr(), layout) }
    }
}

/// Sizing for a new [`Pool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
    /// Usable bytes in the first block. Must be non-zero.
    pub initial_size: usize,
    /// Smallest block allocated when the pool grows. Defaults to
    /// `initial_size`.
    pub minimum_growth_size: Option<usize>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            initial_size: 4096,
            minimum_growth_size: None,
        }
    }
}

#[repr(C)]
struct BlockHeader {
    next: Option<NonNull<BlockHeader>>,
    /// Usable bytes following the header.
    capacity: usize,
}

/// A saved allocation position, restored with [`Pool::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pool: u64,
    generation: u64,
    block: NonNull<BlockHeader>,
    cursor: NonNull<u8>,
    size: usize,
}

/// A bump arena. See the [module documentation](self).
pub struct Pool {
    cursor: Cell<NonNull<u8>>,
    end: Cell<NonNull<u8>>,
    current: Cell<NonNull<BlockHeader>>,
    first: NonNull<BlockHeader>,
    last: Cell<NonNull<BlockHeader>>,
    id: u64,
    minimum_growth_size: Cell<usize>,
    size: Cell<usize>,
    used: Cell<usize>,
    blocks: Cell<usize>,
    generation: u64,
    allocator: Option<Arc<dyn BlockAllocator>>,
}

// SAFETY: the pool exclusively owns its blocks and the allocator hook is
// `Send + Sync`. The interior `Cell`s keep it `!Sync`.
unsafe impl Send for Pool {}

impl Pool {
    /// Creates a pool whose first block holds `initial_size` bytes.
    ///
    /// # Panics
    ///
    /// Panics when `initial_size` is zero.
    #[must_use]
    pub fn new(initial_size: usize) -> Self {
        Self::with_options(PoolOptions {
            initial_size,
            minimum_growth_size: None,
        })
    }

    /// Creates a pool with explicit sizing.
    ///
    /// # Panics
    ///
    /// Panics when either size is zero.
    #[must_use]
    pub fn with_options(options: PoolOptions) -> Self {
        Self::build(options, None)
    }

    /// Creates a pool whose blocks come from `allocator`.
    ///
    /// # Panics
    ///
    /// Panics when either size is zero.
    #[must_use]
    pub fn with_allocator(options: PoolOptions, allocator: Arc<dyn BlockAllocator>) -> Self {
        Self::build(options, Some(allocator))
    }

    fn build(options: PoolOptions, allocator: Option<Arc<dyn BlockAllocator>>) -> Self {
        assert!(options.initial_size > 0, "a pool needs a non-zero initial size");
        let initial = round_up(options.initial_size, WORD);
        let growth = options.minimum_growth_size.unwrap_or(initial);
        assert!(growth > 0, "a pool needs a non-zero growth size");

        let first = allocate_block(allocator.as_deref(), initial);
        let start = data_start(first);
        Self {
            cursor: Cell::new(start),
            // SAFETY: the block holds `initial` bytes after its header.
            end: Cell::new(unsafe { start.add(initial) }),
            current: Cell::new(first),
            first,
            last: Cell::new(first),
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            minimum_growth_size: Cell::new(growth),
            size: Cell::new(0),
            used: Cell::new(HEADER_SIZE + initial),
            blocks: Cell::new(1),
            generation: 0,
            allocator,
        }
    }

    /// Allocates `len` word-aligned bytes.
    #[inline]
    pub fn alloc(&self, len: usize) -> NonNull<u8> {
        self.bump(len, WORD)
    }

    /// Allocates `len` bytes without padding the cursor.
    #[inline]
    pub fn alloc_unaligned(&self, len: usize) -> NonNull<u8> {
        self.bump(len, 1)
    }

    /// Allocates memory for `layout`.
    #[inline]
    pub fn alloc_layout(&self, layout: Layout) -> NonNull<u8> {
        self.bump(layout.size(), layout.align())
    }

    /// Allocates `len` word-aligned bytes set to zero.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_zeroed(&self, len: usize) -> &mut [u8] {
        let ptr = self.alloc(len);
        // SAFETY: `ptr` addresses `len` fresh bytes owned by the pool.
        unsafe {
            ptr.as_ptr().write_bytes(0, len);
            slice::from_raw_parts_mut(ptr.as_ptr(), len)
        }
    }

    /// Allocates `len` word-aligned, uninitialised bytes.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_uninit(&self, len: usize) -> &mut [MaybeUninit<u8>] {
        let ptr = self.alloc(len);
        // SAFETY: `ptr` addresses `len` fresh bytes owned by the pool.
        unsafe { slice::from_raw_parts_mut(ptr.as_ptr().cast(), len) }
    }

    /// Allocates at least `min` and at most `max` bytes, taking as much of the
    /// current block as possible. The returned slice has the actual length.
    ///
    /// # Panics
    ///
    /// Panics when `min > max`.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_min_max(&self, min: usize, max: usize) -> &mut [MaybeUninit<u8>] {
        assert!(min <= max, "alloc_min_max: min {min} exceeds max {max}");
        let cursor = self.cursor.get().as_ptr() as usize;
        let room = self.end.get().as_ptr() as usize - cursor;
        let pad = padding(cursor, WORD);
        let len = match room.checked_sub(pad) {
            Some(fits) if fits >= min => fits.min(max),
            _ => min,
        };
        let ptr = self.alloc(len);
        // SAFETY: `ptr` addresses `len` fresh bytes owned by the pool.
        unsafe { slice::from_raw_parts_mut(ptr.as_ptr().cast(), len) }
    }

    /// Copies `bytes` into word-aligned pool memory.
    #[allow(clippy::mut_from_ref)]
    pub fn dup(&self, bytes: &[u8]) -> &mut [u8] {
        let ptr = self.alloc(bytes.len());
        // SAFETY: `ptr` addresses `bytes.len()` fresh bytes owned by the pool.
        unsafe { copy_into(ptr, bytes) }
    }

    /// Copies `bytes` into the pool without aligning the cursor.
    #[allow(clippy::mut_from_ref)]
    pub fn dup_unaligned(&self, bytes: &[u8]) -> &mut [u8] {
        let ptr = self.alloc_unaligned(bytes.len());
        // SAFETY: as above.
        unsafe { copy_into(ptr, bytes) }
    }

    /// Copies a string into the pool.
    #[allow(clippy::mut_from_ref)]
    pub fn strdup(&self, s: &str) -> &mut str {
        let bytes = self.dup_unaligned(s.as_bytes());
        // SAFETY: copied verbatim from a `str`.
        unsafe { str::from_utf8_unchecked_mut(bytes) }
    }

    /// Copies at most `limit` bytes of `s`, backing off to a character
    /// boundary.
    #[allow(clippy::mut_from_ref)]
    pub fn strndup(&self, s: &str, limit: usize) -> &mut str {
        let mut end = limit.min(s.len());
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        self.strdup(&s[..end])
    }

    /// Formats `args` into the pool.
    ///
    /// The text is written straight into the unused tail of the current
    /// block. Only when it does not fit is the length measured and an exact
    /// allocation made.
    ///
    /// # Panics
    ///
    /// Panics if a formatting implementation reports an error, or produces
    /// output of a different length on the second pass.
    pub fn alloc_fmt(&self, args: fmt::Arguments<'_>) -> &str {
        if let Some(s) = args.as_str() {
            return self.strdup(s);
        }

        let start = self.cursor.get();
        let block = self.current.get();
        let room = self.end.get().as_ptr() as usize - start.as_ptr() as usize;
        // Reserve the whole tail so re-entrant allocations land elsewhere.
        self.cursor.set(self.end.get());
        // SAFETY: the tail of the current block is not handed out and is now
        // reserved.
        let window = unsafe { slice::from_raw_parts_mut(start.as_ptr().cast(), room) };
        let mut writer = WindowWriter::new(window);
        fmt::write(&mut writer, args)
            .expect("a formatting trait implementation returned an error");
        let needed = writer.needed();

        if needed <= room {
            if self.current.get() == block {
                // SAFETY: `needed <= room`, within the current block.
                self.cursor.set(unsafe { start.add(needed) });
            }
            self.size.set(self.size.get() + needed);
            // SAFETY: the writer filled `needed` bytes with whole `str`s.
            return unsafe {
                str::from_utf8_unchecked(slice::from_raw_parts(start.as_ptr(), needed))
            };
        }

        if self.current.get() == block {
            self.cursor.set(start);
        }
        let exact = self.alloc_unaligned(needed);
        // SAFETY: `exact` addresses `needed` fresh bytes.
        let window = unsafe { slice::from_raw_parts_mut(exact.as_ptr().cast(), needed) };
        let mut writer = WindowWriter::new(window);
        fmt::write(&mut writer, args)
            .expect("a formatting trait implementation returned an error");
        assert_eq!(
            writer.needed(),
            needed,
            "formatting produced output of a different length on the second pass"
        );
        // SAFETY: the second pass filled exactly `needed` bytes.
        unsafe { str::from_utf8_unchecked(slice::from_raw_parts(exact.as_ptr(), needed)) }
    }

    /// Moves `value` into the pool. It is never dropped.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_value<T>(&self, value: T) -> &mut T {
        const { assert!(!mem::needs_drop::<T>(), "pool values are never dropped") };
        let slot = self.alloc_layout(Layout::new::<T>()).cast::<T>();
        // SAFETY: `slot` is fresh, aligned memory for one `T`.
        unsafe {
            slot.as_ptr().write(value);
            &mut *slot.as_ptr()
        }
    }

    /// Copies a slice into the pool.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_slice_copy<T: Copy>(&self, src: &[T]) -> &mut [T] {
        let layout = Layout::for_value(src);
        let dst = self.alloc_layout(layout).cast::<T>();
        // SAFETY: `dst` is fresh, aligned memory for `src.len()` values.
        unsafe {
            ptr::copy_nonoverlapping(src.as_ptr(), dst.as_ptr(), src.len());
            slice::from_raw_parts_mut(dst.as_ptr(), src.len())
        }
    }

    /// Collects an exact-size iterator into a pool slice.
    ///
    /// # Panics
    ///
    /// Panics when the slice size overflows the address space.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_slice_fill_iter<T, I>(&self, iter: I) -> &mut [T]
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator,
    {
        const { assert!(!mem::needs_drop::<T>(), "pool values are never dropped") };
        let iter = iter.into_iter();
        let len = iter.len();
        let layout = Layout::array::<T>(len).expect("slice size overflows the address space");
        let base = self.alloc_layout(layout).cast::<T>();
        let mut written = 0;
        for item in iter.take(len) {
            // SAFETY: `written < len`, inside the allocation.
            unsafe { base.as_ptr().add(written).write(item) };
            written += 1;
        }
        // SAFETY: the first `written` slots are initialised.
        unsafe { slice::from_raw_parts_mut(base.as_ptr(), written) }
    }

    /// Records the current allocation position.
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pool: self.id,
            generation: self.generation,
            block: self.current.get(),
            cursor: self.cursor.get(),
            size: self.size.get(),
        }
    }

    /// Rolls the cursor back to `checkpoint`. The next allocation reuses the
    /// checkpointed address.
    ///
    /// No block is freed: blocks grown since the checkpoint stay chained
    /// behind it and are filled again before the pool asks for new ones.
    ///
    /// # Panics
    ///
    /// Panics when the checkpoint was taken on another pool or before a
    /// [`clear`](Pool::clear).
    pub fn reset(&mut self, checkpoint: Checkpoint) {
        assert!(
            checkpoint.pool == self.id && checkpoint.generation == self.generation,
            "checkpoint does not belong to this pool generation"
        );
        let start = data_start(checkpoint.block);
        // SAFETY: the checkpoint names this pool, whose blocks are only freed
        // by `clear`, which bumps the generation.
        let capacity = unsafe { checkpoint.block.as_ref().capacity };
        let offset = (checkpoint.cursor.as_ptr() as usize).wrapping_sub(start.as_ptr() as usize);
        assert!(offset <= capacity, "checkpoint cursor lies outside its block");

        self.current.set(checkpoint.block);
        self.cursor.set(checkpoint.cursor);
        // SAFETY: `capacity` is the usable size of the checkpoint block.
        self.end.set(unsafe { start.add(capacity) });
        self.size.set(checkpoint.size);
        tracing::trace!(size = checkpoint.size, "pool reset to checkpoint");
    }

    /// Frees every block but the first and rewinds to its start.
    pub fn clear(&mut self) {
        // SAFETY: the first block lives as long as the pool.
        let mut next = unsafe { self.first.as_mut().next.take() };
        let mut freed = 0usize;
        while let Some(block) = next {
            // SAFETY: every chained block is live until released here.
            next = unsafe { block.as_ref().next };
            self.release(block);
            freed += 1;
        }
        self.last.set(self.first);
        self.enter(self.first);
        self.size.set(0);
        self.generation += 1;
        tracing::trace!(freed, "pool cleared");
    }

    /// Bytes handed out to callers since creation, the last clear, or the
    /// restored checkpoint.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size.get()
    }

    /// Bytes held from the block allocator, headers included.
    #[must_use]
    pub fn used(&self) -> usize {
        self.used.get()
    }

    /// Number of live blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.get()
    }

    /// Bytes left in the current block.
    #[must_use]
    pub fn available(&self) -> usize {
        self.end.get().as_ptr() as usize - self.cursor.get().as_ptr() as usize
    }

    /// Usable bytes in the first block.
    #[must_use]
    pub fn initial_size(&self) -> usize {
        // SAFETY: the first block lives as long as the pool.
        unsafe { self.first.as_ref().capacity }
    }

    /// Smallest block allocated when the pool grows.
    #[must_use]
    pub fn minimum_growth_size(&self) -> usize {
        self.minimum_growth_size.get()
    }

    /// # Panics
    ///
    /// Panics when `size` is zero.
    pub fn set_minimum_growth_size(&self, size: usize) {
        assert!(size > 0, "a pool needs a non-zero growth size");
        self.minimum_growth_size.set(size);
    }

    #[inline]
    fn bump(&self, len: usize, align: usize) -> NonNull<u8> {
        let cursor = self.cursor.get();
        let room = self.end.get().as_ptr() as usize - cursor.as_ptr() as usize;
        let pad = padding(cursor.as_ptr() as usize, align);
        if pad <= room && len <= room - pad {
            // SAFETY: `pad + len <= room`, inside the current block.
            let start = unsafe { cursor.add(pad) };
            // SAFETY: as above.
            self.cursor.set(unsafe { start.add(len) });
            self.size.set(self.size.get() + len);
            return start;
        }
        self.grow(len, align)
    }

    #[cold]
    #[inline(never)]
    fn grow(&self, len: usize, align: usize) -> NonNull<u8> {
        let needed = if align > BLOCK_ALIGN {
            len.saturating_add(align - 1)
        } else {
            len
        };

        // SAFETY: chained blocks stay live until `clear` or drop.
        let mut next = unsafe { self.current.get().as_ref().next };
        while let Some(block) = next {
            // SAFETY: as above.
            let header = unsafe { block.as_ref() };
            if header.capacity >= needed {
                self.enter(block);
                tracing::trace!(capacity = header.capacity, "pool reused a block");
                return self.bump(len, align);
            }
            next = header.next;
        }

        let capacity = round_up(needed.max(self.minimum_growth_size.get()), WORD);
        let block = allocate_block(self.allocator.as_deref(), capacity);
        // SAFETY: `last` is live and nothing else borrows its header.
        unsafe { (*self.last.get().as_ptr()).next = Some(block) };
        self.last.set(block);
        self.enter(block);
        self.used.set(self.used.get() + HEADER_SIZE + capacity);
        self.blocks.set(self.blocks.get() + 1);
        tracing::trace!(capacity, blocks = self.blocks.get(), "pool grew a block");

        self.bump(len, align)
    }

    /// Walks the block chain and panics if the accounting, the cursor or the
    /// chain links disagree.
    #[cfg(any(test, feature = "fuzzing"))]
    pub fn assert_consistent(&self) {
        let mut blocks = 0usize;
        let mut used = 0usize;
        let mut seen_current = false;
        let mut tail = self.first;
        let mut block = Some(self.first);
        while let Some(current) = block {
            // SAFETY: every chained block is live.
            let header = unsafe { current.as_ref() };
            blocks += 1;
            used += HEADER_SIZE + header.capacity;
            seen_current |= current == self.current.get();
            tail = current;
            block = header.next;
        }
        assert_eq!(blocks, self.blocks.get(), "block count disagrees with the chain");
        assert_eq!(used, self.used.get(), "used bytes disagree with the chain");
        assert!(tail == self.last.get(), "last block is not the chain tail");
        assert!(seen_current, "current block is not on the chain");

        let start = data_start(self.current.get()).as_ptr() as usize;
        let cursor = self.cursor.get().as_ptr() as usize;
        let end = self.end.get().as_ptr() as usize;
        // SAFETY: the current block is live.
        let capacity = unsafe { self.current.get().as_ref().capacity };
        assert!(start <= cursor && cursor <= end, "cursor outside the current block");
        assert_eq!(end - start, capacity, "end does not match the current block");
        assert!(self.size.get() <= self.used.get(), "size exceeds used bytes");
    }

    fn enter(&self, block: NonNull<BlockHeader>) {
        let start = data_start(block);
        // SAFETY: `block` is live.
        let capacity = unsafe { block.as_ref().capacity };
        self.current.set(block);
        self.cursor.set(start);
        // SAFETY: the block holds `capacity` bytes after its header.
        self.end.set(unsafe { start.add(capacity) });
    }

    fn release(&self, block: NonNull<BlockHeader>) {
        // SAFETY: the caller has unlinked `block` from the chain.
        let capacity = unsafe { block.as_ref().capacity };
        // SAFETY: `block` was produced by `allocate_block` with this allocator.
        unsafe { free_block(self.allocator.as_deref(), block) };
        self.used.set(self.used.get() - HEADER_SIZE - capacity);
        self.blocks.set(self.blocks.get() - 1);
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        let mut block = Some(self.first);
        while let Some(current) = block {
            // SAFETY: every chained block is live until freed here.
            block = unsafe { current.as_ref().next };
            // SAFETY: as above.
            unsafe { free_block(self.allocator.as_deref(), current) };
        }
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("size", &self.size())
            .field("used", &self.used())
            .field("blocks", &self.block_count())
            .field("available", &self.available())
            .field("minimum_growth_size", &self.minimum_growth_size())
            .finish_non_exhaustive()
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::with_options(PoolOptions::default())
    }
}

#[inline]
fn padding(addr: usize, align: usize) -> usize {
    addr.wrapping_neg() & (align - 1)
}

fn round_up(n: usize, to: usize) -> usize {
    n.checked_next_multiple_of(to)
        .expect("pool block size overflows the address space")
}

fn block_layout(capacity: usize) -> Layout {
    HEADER_SIZE
        .checked_add(capacity)
        .and_then(|size| Layout::from_size_align(size, BLOCK_ALIGN).ok())
        .expect("pool block size overflows the address space")
}

fn allocate_block(allocator: Option<&dyn BlockAllocator>, capacity: usize) -> NonNull<BlockHeader> {
    let layout = block_layout(capacity);
    let raw = match allocator {
        Some(allocator) => allocator.allocate(layout),
        None => SystemAllocator.allocate(layout),
    };
    let header = raw.cast::<BlockHeader>();
    // SAFETY: `raw` is a fresh allocation aligned for the header.
    unsafe { header.as_ptr().write(BlockHeader {
            next: None,
            capacity,
        }) };
    header
}

/// # Safety
///
/// `block` must come from [`allocate_block`] with the same allocator and must
/// not be used afterwards.
unsafe fn free_block(allocator: Option<&dyn BlockAllocator>, block: NonNull<BlockHeader>) {
    // SAFETY: the header is live until freed below.
    let layout = block_layout(unsafe { block.as_ref().capacity });
    match allocator {
        // SAFETY: forwarded from the caller.
        Some(allocator) => unsafe { allocator.deallocate(block.cast(), layout) },
        // SAFETY: forwarded from the caller.
        None => unsafe { SystemAllocator.deallocate(block.cast(), layout) },
    }
}

fn data_start(block: NonNull<BlockHeader>) -> NonNull<u8> {
    // SAFETY: every block is at least `HEADER_SIZE` bytes long.
    unsafe { block.cast::<u8>().add(HEADER_SIZE) }
}

/// # Safety
///
/// `dst` must address `src.len()` writable bytes disjoint from `src`.
unsafe fn copy_into<'p>(dst: NonNull<u8>, src: &[u8]) -> &'p mut [u8] {
    // SAFETY: forwarded from the caller.
    unsafe {
        ptr::copy_nonoverlapping(src.as_ptr(), dst.as_ptr(), src.len());
        slice::from_raw_parts_mut(dst.as_ptr(), src.len())
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Write as _;

    use super::*;

    #[test]
    #[should_panic(expected = "non-zero initial size")]
    fn zero_initial_size_is_rejected() {
        let _ = Pool::new(0);
    }

    #[test]
    fn allocations_are_word_aligned() {
        let pool = Pool::new(256);
        pool.alloc_unaligned(3);
        let ptr = pool.alloc(16);
        assert_eq!(ptr.as_ptr() as usize % WORD, 0);
    }

    #[test]
    fn unaligned_allocations_are_contiguous() {
        let pool = Pool::new(256);
        let a = pool.alloc_unaligned(3);
        let b = pool.alloc_unaligned(5);
        assert_eq!(b.as_ptr() as usize, a.as_ptr() as usize + 3);
    }

    #[test]
    fn growth_chains_new_blocks() {
        let pool = Pool::new(64);
        assert_eq!(pool.block_count(), 1);
        let big = pool.dup(&[7u8; 500]);
        assert_eq!(big.len(), 500);
        assert!(big.iter().all(|&b| b == 7));
        assert_eq!(pool.block_count(), 2);
        assert!(pool.size() <= pool.used());
    }

    #[test]
    fn growth_respects_minimum_growth_size() {
        let pool = Pool::with_options(PoolOptions {
            initial_size: 16,
            minimum_growth_size: Some(1024),
        });
        pool.alloc(32);
        assert_eq!(pool.block_count(), 2);
        assert_eq!(pool.available(), 1024 - 32);
    }

    #[test]
    fn clear_keeps_only_the_first_block() {
        let mut pool = Pool::new(1024);
        for _ in 0..10 {
            pool.alloc(100_000);
        }
        assert!(pool.block_count() > 1);
        pool.clear();
        assert_eq!(pool.block_count(), 1);
        assert_eq!(pool.size(), 0);
        assert_eq!(pool.available(), 1024);
        assert_eq!(pool.used(), HEADER_SIZE + 1024);
    }

    #[test]
    fn reset_reuses_the_checkpointed_address() {
        let mut pool = Pool::new(128);
        pool.alloc(24);
        let checkpoint = pool.checkpoint();
        let first = pool.alloc(40).as_ptr() as usize;
        pool.alloc(4096);
        assert_eq!(pool.block_count(), 2);
        let used = pool.used();
        pool.reset(checkpoint);
        assert_eq!(pool.size(), 24);
        assert_eq!(pool.alloc(40).as_ptr() as usize, first);

        // Growth after the reset refills the kept block.
        pool.alloc(4096);
        assert_eq!(pool.block_count(), 2);
        assert_eq!(pool.used(), used);
        pool.assert_consistent();
    }

    #[test]
    fn growth_skips_kept_blocks_that_are_too_small() {
        let mut pool = Pool::with_options(PoolOptions {
            initial_size: 64,
            minimum_growth_size: Some(64),
        });
        let checkpoint = pool.checkpoint();
        pool.alloc(64);
        pool.alloc(64);
        assert_eq!(pool.block_count(), 2);
        pool.reset(checkpoint);
        pool.alloc(64);
        pool.alloc(256);
        assert_eq!(pool.block_count(), 3);
        assert_eq!(pool.available(), 0);
        pool.assert_consistent();
        pool.clear();
        assert_eq!(pool.block_count(), 1);
        assert_eq!(pool.used(), HEADER_SIZE + 64);
        pool.assert_consistent();
    }

    #[test]
    #[should_panic(expected = "does not belong")]
    fn reset_after_clear_is_rejected() {
        let mut pool = Pool::new(128);
        let checkpoint = pool.checkpoint();
        pool.clear();
        pool.reset(checkpoint);
    }

    #[test]
    #[should_panic(expected = "does not belong")]
    fn reset_with_a_dropped_pools_checkpoint_is_rejected() {
        let old = Pool::new(64);
        old.alloc(100);
        let checkpoint = old.checkpoint();
        drop(old);
        let mut pool = Pool::new(64);
        pool.reset(checkpoint);
    }

    #[test]
    #[should_panic(expected = "does not belong")]
    fn reset_with_another_pools_checkpoint_is_rejected() {
        let other = Pool::new(64);
        let mut pool = Pool::new(64);
        pool.reset(other.checkpoint());
    }

    #[test]
    fn oversized_allocations_each_grow_and_clear_rewinds() {
        let mut pool = Pool::new(64);
        let start = pool.checkpoint();
        for _ in 0..3 {
            pool.alloc(100);
        }
        assert!(pool.block_count() >= 3);
        pool.clear();
        assert_eq!(pool.block_count(), 1);
        assert_eq!(pool.available(), 64);
        assert_eq!(pool.alloc(8), start.cursor);
    }

    #[test]
    fn fmt_writes_into_the_current_block() {
        let pool = Pool::new(256);
        let before = pool.available();
        let s = pool.alloc_fmt(format_args!("{}-{}", 12, "ab"));
        assert_eq!(s, "12-ab");
        assert_eq!(pool.available(), before - 5);
        assert_eq!(pool.block_count(), 1);
    }

    #[test]
    fn fmt_falls_back_to_an_exact_allocation() {
        let pool = Pool::new(8);
        let long = "x".repeat(100);
        let s = pool.alloc_fmt(format_args!("<{long}>"));
        assert_eq!(s.len(), 102);
        assert!(s.starts_with("<x") && s.ends_with("x>"));
        assert_eq!(pool.block_count(), 2);
    }

    #[test]
    fn strndup_backs_off_to_a_char_boundary() {
        let pool = Pool::new(64);
        assert_eq!(&*pool.strndup("añb", 2), "a");
        assert_eq!(&*pool.strndup("abc", 10), "abc");
    }

    #[test]
    fn min_max_takes_what_fits() {
        let pool = Pool::new(64);
        let got = pool.alloc_min_max(8, 1000).len();
        assert_eq!(got, 64);
        let got = pool.alloc_min_max(16, 32).len();
        assert_eq!(got, 16);
    }

    #[test]
    fn value_and_slice_helpers() {
        let pool = Pool::new(64);
        let n = pool.alloc_value(41u64);
        *n += 1;
        assert_eq!(*n, 42);
        let squares = pool.alloc_slice_fill_iter((1..5u32).map(|i| i * i));
        assert_eq!(squares, &[1, 4, 9, 16]);
        let copy = pool.alloc_slice_copy(&[1u16, 2, 3]);
        assert_eq!(copy, &[1, 2, 3]);
    }

    #[test]
    fn debug_shows_accounting() {
        let pool = Pool::new(32);
        pool.alloc(8);
        let mut out = String::new();
        write!(out, "{pool:?}").unwrap();
        assert!(out.starts_with("Pool { size: 8,"), "{out}");
    }
}
