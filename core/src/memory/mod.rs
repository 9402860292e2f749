pub mod factory;
pub mod file;
pub mod in_memory;

pub use factory::create_checkpointer;
pub use file::FileCheckpointer;
pub use in_memory::InMemoryCheckpointer;
