//! Internal implementation details.
//!
//! These are pub(crate) and not intended for external use.

pub mod counted_ptr;

pub(crate) use counted_ptr::AtomicCountedPtr;
pub(crate) use counted_ptr::CountedPtr;
