//! Per-thread allocation accounting.
//!
//! `CountingAllocator` wraps another global allocator and adds the size of
//! every allocation to a counter local to the allocating thread. The counter
//! is a const-initialized `Cell`, so reading or bumping it never allocates.
//!
//! ```ignore
//! #[global_allocator]
//! static ALLOC: CountingAllocator = CountingAllocator::system();
//! ```

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};

thread_local! {
    static ALLOCATED: Cell<u64> = const { Cell::new(0) };
}

static INSTALLED: AtomicBool = AtomicBool::new(false);

#[inline]
fn record(bytes: usize) {
    // try_with: the slot may already be gone during thread teardown
    let _ = ALLOCATED.try_with(|c| c.set(c.get().wrapping_add(bytes as u64)));
    if !INSTALLED.load(Ordering::Relaxed) {
        INSTALLED.store(true, Ordering::Relaxed);
    }
}

/// Global allocator wrapper that counts bytes allocated per thread.
/// Reallocations count the full new size, like a fresh allocation would.
pub struct CountingAllocator<A = System> {
    inner: A,
}

impl<A> CountingAllocator<A> {
    pub const fn new(inner: A) -> Self {
        Self { inner }
    }
}

impl CountingAllocator<System> {
    pub const fn system() -> Self {
        Self::new(System)
    }
}

unsafe impl<A: GlobalAlloc> GlobalAlloc for CountingAllocator<A> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { self.inner.alloc(layout) };
        if !ptr.is_null() {
            record(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { self.inner.alloc_zeroed(layout) };
        if !ptr.is_null() {
            record(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { self.inner.dealloc(ptr, layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { self.inner.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            record(new_size);
        }
        new_ptr
    }
}

/// True once any allocation went through a `CountingAllocator`.
pub fn is_counting() -> bool {
    INSTALLED.load(Ordering::Relaxed)
}

/// Total bytes allocated so far by the current thread.
pub fn thread_allocated_bytes() -> u64 {
    ALLOCATED.try_with(Cell::get).unwrap_or(0)
}

/// Bytes allocated on the current thread between `start` and `finish`.
#[derive(Debug, Clone, Copy)]
pub struct AllocProbe {
    start: Option<u64>,
}

impl AllocProbe {
    pub fn start() -> Self {
        let start = is_counting().then(thread_allocated_bytes);
        Self { start }
    }

    /// `None` when no counting allocator is installed.
    pub fn finish(self) -> Option<u64> {
        self.start
            .map(|start| thread_allocated_bytes().wrapping_sub(start))
    }
}
