//! Allocation-tracking wrapper for heap diagnostics.
//!
//! [`TrackingAlloc`] wraps any [`GlobalAlloc`] and maintains process-wide
//! counters: live allocation count, live bytes, their peaks, and the number
//! of failed allocations. The counters feed the diagnostic surface the way a
//! constrained target reports heap watermarks; they are global because the
//! allocator itself is.
//!
//! Install it as the global allocator to track the whole process:
//!
//! ```ignore
//! #[global_allocator]
//! static ALLOC: TrackingAlloc<std::alloc::System> = TrackingAlloc::new(std::alloc::System);
//! ```

use std::{
    alloc::{GlobalAlloc, Layout},
    sync::atomic::{AtomicUsize, Ordering},
};

static LIVE_OBJECTS: AtomicUsize = AtomicUsize::new(0);
static LIVE_BYTES: AtomicUsize = AtomicUsize::new(0);
static PEAK_OBJECTS: AtomicUsize = AtomicUsize::new(0);
static PEAK_BYTES: AtomicUsize = AtomicUsize::new(0);
static FAILED_ALLOCS: AtomicUsize = AtomicUsize::new(0);

/// Snapshot of the allocation counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    /// Allocations currently live.
    pub live_objects: usize,
    /// Bytes currently allocated.
    pub live_bytes: usize,
    /// Highest observed live allocation count.
    pub peak_objects: usize,
    /// Highest observed live byte count.
    pub peak_bytes: usize,
    /// Allocation requests the inner allocator refused.
    pub failed_allocs: usize,
}

/// Instrumented allocator wrapping an inner [`GlobalAlloc`].
#[derive(Debug, Default)]
pub struct TrackingAlloc<A> {
    inner: A,
}

impl<A> TrackingAlloc<A> {
    /// Wrap `inner` with allocation tracking.
    pub const fn new(inner: A) -> Self { Self { inner } }

    /// Read the current counters.
    #[must_use]
    pub fn snapshot() -> MemoryStats {
        MemoryStats {
            live_objects: LIVE_OBJECTS.load(Ordering::Relaxed),
            live_bytes: LIVE_BYTES.load(Ordering::Relaxed),
            peak_objects: PEAK_OBJECTS.load(Ordering::Relaxed),
            peak_bytes: PEAK_BYTES.load(Ordering::Relaxed),
            failed_allocs: FAILED_ALLOCS.load(Ordering::Relaxed),
        }
    }
}

fn record_alloc(size: usize) {
    let objects = LIVE_OBJECTS.fetch_add(1, Ordering::Relaxed) + 1;
    let bytes = LIVE_BYTES.fetch_add(size, Ordering::Relaxed) + size;
    PEAK_OBJECTS.fetch_max(objects, Ordering::Relaxed);
    PEAK_BYTES.fetch_max(bytes, Ordering::Relaxed);
}

fn record_dealloc(size: usize) {
    LIVE_OBJECTS.fetch_sub(1, Ordering::Relaxed);
    LIVE_BYTES.fetch_sub(size, Ordering::Relaxed);
}

// SAFETY: delegates directly to the inner allocator; the counters never
// influence the returned pointers or layouts.
unsafe impl<A: GlobalAlloc> GlobalAlloc for TrackingAlloc<A> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { self.inner.alloc(layout) };
        if ptr.is_null() {
            FAILED_ALLOCS.fetch_add(1, Ordering::Relaxed);
        } else {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        record_dealloc(layout.size());
        unsafe { self.inner.dealloc(ptr, layout) };
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { self.inner.realloc(ptr, layout, new_size) };
        if new_ptr.is_null() {
            FAILED_ALLOCS.fetch_add(1, Ordering::Relaxed);
        } else {
            record_dealloc(layout.size());
            record_alloc(new_size);
        }
        new_ptr
    }
}

#[cfg(test)]
mod tests {
    use std::{
        alloc::System,
        sync::Mutex,
    };

    use super::*;

    // Counters are process-wide; serialise the tests so one test's deltas do
    // not leak into another's snapshots.
    static LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn counters_follow_alloc_and_dealloc() {
        let _guard = LOCK.lock().expect("counter lock");
        let alloc = TrackingAlloc::new(System);
        let layout = Layout::from_size_align(64, 8).expect("valid layout");

        let before = TrackingAlloc::<System>::snapshot();
        let ptr = unsafe { alloc.alloc(layout) };
        assert!(!ptr.is_null());
        let during = TrackingAlloc::<System>::snapshot();
        assert_eq!(during.live_objects, before.live_objects + 1);
        assert_eq!(during.live_bytes, before.live_bytes + 64);
        assert!(during.peak_bytes >= during.live_bytes);

        unsafe { alloc.dealloc(ptr, layout) };
        let after = TrackingAlloc::<System>::snapshot();
        assert_eq!(after.live_objects, before.live_objects);
        assert_eq!(after.live_bytes, before.live_bytes);
    }

    #[test]
    fn realloc_tracks_size_delta() {
        let _guard = LOCK.lock().expect("counter lock");
        let alloc = TrackingAlloc::new(System);
        let layout = Layout::from_size_align(32, 8).expect("valid layout");

        let before = TrackingAlloc::<System>::snapshot();
        let ptr = unsafe { alloc.alloc(layout) };
        assert!(!ptr.is_null());
        let grown = unsafe { alloc.realloc(ptr, layout, 128) };
        assert!(!grown.is_null());

        let during = TrackingAlloc::<System>::snapshot();
        assert_eq!(during.live_bytes, before.live_bytes + 128);

        let grown_layout = Layout::from_size_align(128, 8).expect("valid layout");
        unsafe { alloc.dealloc(grown, grown_layout) };
        let after = TrackingAlloc::<System>::snapshot();
        assert_eq!(after.live_bytes, before.live_bytes);
    }
}
