//! [`MediaStore`](crate::ports::MediaStore) adapters.

mod fs;
mod memory;

pub use {fs::FsMediaStore, memory::MemoryMediaStore};
