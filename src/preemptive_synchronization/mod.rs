//! Preemptive (OS-thread) synchronization primitives.
//!
//! # Organization
//!
//! - [`peterson_lock`] - Peterson's two-participant mutual exclusion

pub mod peterson_lock;

pub use peterson_lock::{PetersonGuard, PetersonLock};
