//! Shared memory: the content-addressed object store and the
//! fixed-slot queues that move control messages to/from module processes.

pub mod queue;
pub mod store;

pub use queue::{ModuleQueues, ShmQueue};
pub use store::{ObjectHandle, SharedStore};
