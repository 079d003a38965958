pub mod data_structures;
pub mod preemptive_synchronization;

// Re-export the primitive types for convenience
pub use data_structures::{StackNode, TaggedStack};
pub use preemptive_synchronization::{PetersonGuard, PetersonLock};
