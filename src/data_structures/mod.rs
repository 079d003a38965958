//! Lock-free data structures.
//!
//! # Organization
//!
//! - [`tagged_stack`] - Lock-free LIFO stack with an ABA-safe counted head
//! - [`internal`] - Internal implementation details (pub(crate))

// Submodules
pub(crate) mod internal;
pub mod tagged_stack;

// Re-exports for convenience
pub use tagged_stack::{StackNode, TaggedStack};

// CountedPtr stays pub(crate) - truly internal implementation detail
pub(crate) use internal::{AtomicCountedPtr, CountedPtr};
