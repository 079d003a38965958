use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::data_structures::AtomicCountedPtr;
use crate::data_structures::CountedPtr;

type NodePtr<T> = *mut StackNode<T>;

///
/// Lock-free LIFO stack using the counted-pointer (tagged pointer) technique
/// to defeat the ABA problem.
///
// The head is a (pointer, generation) pair updated by a single wide CAS.
// The generation advances on every successful pop, so a thread holding a
// stale snapshot fails its CAS even when the same node address has been
// popped and pushed back in the meantime - the pop-then-repush cycle that
// breaks a pointer-only Treiber stack.
//
// MEMORY RECLAMATION
// ==================
// None is performed beyond ownership transfer. A node is owned by exactly
// one of: the stack head, another node's link, or the caller holding the
// Box returned by pop(). The caller frees popped nodes; Drop frees whatever
// is still linked at teardown. There is no hazard-pointer or epoch scheme
// here - the counted pointer defends the head CAS against recycled
// addresses, which is the technique this structure isolates.
//
// ORDERING
// ========
// The head CAS is the single synchronization point. push publishes with
// Release; pop loads its snapshot with Acquire (the candidate node's link
// field is dereferenced before the CAS, so the publishing push must be
// visible first) and retires the node with AcqRel. Failure paths and the
// node-link stores are Relaxed - a node's payload and link are immutable
// from the moment it is published until it is popped.
//
pub struct StackNode<T> {
    data: T,
    next: AtomicPtr<StackNode<T>>,
}

impl<T> StackNode<T> {
    /// Allocate a node ready to be pushed. Callers own nodes before push
    /// and after pop; the stack owns them in between.
    pub fn new(data: T) -> Box<Self> {
        Box::new(StackNode {
            data,
            next: AtomicPtr::new(ptr::null_mut()),
        })
    }

    /// Borrow the payload.
    #[inline]
    pub fn data(&self) -> &T {
        &self.data
    }

    /// Consume a popped node and take the payload out of it.
    pub fn into_data(self: Box<Self>) -> T {
        self.data
    }

    // =========================================================================
    // Link accessors
    // =========================================================================

    /// Load the link (Relaxed - links are frozen while a node is reachable)
    #[inline]
    fn get_next(&self) -> NodePtr<T> {
        self.next.load(Ordering::Relaxed)
    }

    /// Store the link (Relaxed - only ever written before publication)
    #[inline]
    fn set_next(&self, ptr: NodePtr<T>) {
        self.next.store(ptr, Ordering::Relaxed)
    }
}

pub struct TaggedStack<T> {
    top: AtomicCountedPtr<StackNode<T>>,
}

// The stack hands nodes across threads by value, so T must be Send; it
// never hands out shared references to payloads still in the stack.
unsafe impl<T: Send> Send for TaggedStack<T> {}
unsafe impl<T: Send> Sync for TaggedStack<T> {}

impl<T> TaggedStack<T> {
    /// Create an empty stack.
    pub fn new() -> Self {
        TaggedStack {
            top: AtomicCountedPtr::new(CountedPtr::null()),
        }
    }

    /// Push an owned node onto the stack.
    ///
    /// Retries on CAS contention until it succeeds; lock-free, so some
    /// thread always completes even if this one keeps losing the race.
    pub fn push(&self, node: Box<StackNode<T>>) {
        let node = Box::into_raw(node);
        loop {
            let old = self.top.load(Ordering::Relaxed);

            // The node is unpublished until the CAS below succeeds, so this
            // plain store cannot race with a reader.
            unsafe { (*node).set_next(old.as_ptr()) };

            // Push keeps the generation unchanged; only pop advances it.
            let new = CountedPtr::new(node, old.count());
            if self
                .top
                .compare_exchange(old, new, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
        }
    }

    /// Pop the top node, or `None` if the stack was observed empty.
    ///
    /// Empty is the normal "no element available" outcome, not an error,
    /// and is returned immediately without a retry.
    pub fn pop(&self) -> Option<Box<StackNode<T>>> {
        loop {
            let old = self.top.load(Ordering::Acquire);
            if old.is_null() {
                return None;
            }

            // The snapshot's node may be popped and freed by another thread
            // between this read and the CAS; the CAS then fails on the
            // advanced generation and we never act on the stale link. The
            // read itself is the caller-reclamation trade-off documented in
            // the module header: popped nodes must not be freed while
            // sibling threads are still inside pop().
            let next = unsafe { (*old.as_ptr()).get_next() };

            let new = CountedPtr::new(next, old.count() + 1);
            if self
                .top
                .compare_exchange(old, new, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                // The stack no longer references the node; its stale link
                // is meaningless from here on.
                return Some(unsafe { Box::from_raw(old.as_ptr()) });
            }
        }
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// Current generation counter. Monotonically non-decreasing; advances
    /// once per successful pop.
    pub fn generation(&self) -> u64 {
        self.top.load(Ordering::Relaxed).count()
    }

    /// Whether the stack was empty at the moment of the load. Like any
    /// concurrent observer this is already stale when it returns.
    pub fn is_empty(&self) -> bool {
        self.top.load(Ordering::Relaxed).is_null()
    }
}

impl<T> Default for TaggedStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for TaggedStack<T> {
    fn drop(&mut self) {
        // &mut self: no other thread can touch the head, walk it plainly.
        let mut node = self.top.load(Ordering::Relaxed).as_ptr();
        while !node.is_null() {
            let boxed = unsafe { Box::from_raw(node) };
            node = boxed.get_next();
        }
    }
}
