// Counted pointer packed into a single 128-bit word.
//
// Word layout:
//   Bits  0..64  : pointer address
//   Bits 64..128 : generation counter
//
// The counter is the ABA defense: it advances on every successful pop, so
// two words holding the same address but produced at different times never
// compare equal. A compare-exchange on the packed word therefore rejects a
// stale snapshot even when the pointer value has come back around.
//
// std has no stable 128-bit atomic; portable-atomic provides one on every
// target (native where the ISA has a wide CAS, lock-based fallback where it
// does not).
//
const COUNT_SHIFT: u32 = 64;
const PTR_MASK: u128 = (1u128 << COUNT_SHIFT) - 1;

use std::fmt;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::Ordering;

use portable_atomic::AtomicU128;

/// A (pointer, generation counter) pair handled as one value.
pub(crate) struct CountedPtr<T> {
    ptr: *mut T,
    count: u64,
}

// Manual Copy/Clone: derive would require T: Clone.
impl<T> Copy for CountedPtr<T> {}

impl<T> Clone for CountedPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

// Manual Debug for the same reason: the pair itself is printable without
// any bound on T.
impl<T> fmt::Debug for CountedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CountedPtr({:p}, {})", self.ptr, self.count)
    }
}

impl<T> CountedPtr<T> {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Create a new CountedPtr from a pointer and a generation count.
    #[inline]
    pub(crate) fn new(ptr: *mut T, count: u64) -> Self {
        CountedPtr { ptr, count }
    }

    /// The empty head: null pointer, generation zero.
    #[inline]
    pub(crate) fn null() -> Self {
        CountedPtr {
            ptr: ptr::null_mut(),
            count: 0,
        }
    }

    // =========================================================================
    // Extraction
    // =========================================================================

    /// Get the pointer half of the pair (the one you dereference).
    #[inline]
    pub(crate) fn as_ptr(&self) -> *mut T {
        self.ptr
    }

    /// Get the generation counter half of the pair.
    #[inline]
    pub(crate) fn count(&self) -> u64 {
        self.count
    }

    // =========================================================================
    // Predicates
    // =========================================================================

    /// Check whether the pointer half is null.
    #[inline]
    pub(crate) fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    // =========================================================================
    // Word encoding
    // =========================================================================

    /// Pack the pair into a single u128 word.
    #[inline]
    fn pack(self) -> u128 {
        (self.ptr as usize as u128) | ((self.count as u128) << COUNT_SHIFT)
    }

    /// Unpack a u128 word back into a pair.
    #[inline]
    fn unpack(word: u128) -> Self {
        CountedPtr {
            ptr: (word & PTR_MASK) as usize as *mut T,
            count: (word >> COUNT_SHIFT) as u64,
        }
    }
}

/// An atomically updatable `CountedPtr<T>`.
///
/// Both halves of the pair are read and replaced in one atomic operation;
/// there is no window where another thread can observe a pointer from one
/// generation next to the counter of another.
pub(crate) struct AtomicCountedPtr<T> {
    word: AtomicU128,
    _marker: PhantomData<*mut T>,
}

// The raw pointer in PhantomData suppresses the auto impls; the word itself
// is just bits. Thread-safety of the pointee is the owning structure's
// contract, not this cell's.
unsafe impl<T> Send for AtomicCountedPtr<T> {}
unsafe impl<T> Sync for AtomicCountedPtr<T> {}

impl<T> AtomicCountedPtr<T> {
    #[inline]
    pub(crate) fn new(value: CountedPtr<T>) -> Self {
        AtomicCountedPtr {
            word: AtomicU128::new(value.pack()),
            _marker: PhantomData,
        }
    }

    /// Load the current (pointer, counter) pair.
    #[inline]
    pub(crate) fn load(&self, order: Ordering) -> CountedPtr<T> {
        CountedPtr::unpack(self.word.load(order))
    }

    /// CAS the whole pair. Fails if either half differs from `current`.
    #[inline]
    pub(crate) fn compare_exchange(
        &self,
        current: CountedPtr<T>,
        new: CountedPtr<T>,
        success: Ordering,
        failure: Ordering,
    ) -> Result<CountedPtr<T>, CountedPtr<T>> {
        self.word
            .compare_exchange(current.pack(), new.pack(), success, failure)
            .map(CountedPtr::unpack)
            .map_err(CountedPtr::unpack)
    }
}
