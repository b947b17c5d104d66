pub mod file;
pub mod shmem;
pub mod standalone;

pub use file::FileStore;
pub use shmem::ShmStore;
pub use standalone::StandaloneStore;
