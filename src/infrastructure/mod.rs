pub mod executor;
pub mod in_memory;
