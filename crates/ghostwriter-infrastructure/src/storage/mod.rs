//! Local storage backends.

mod dir;
mod local_storage;
mod memory;

pub use dir::DirStorage;
pub use local_storage::{LocalStorage, StorageEvent, StorageOp, StorageSubscription};
pub use memory::MemoryStorage;
