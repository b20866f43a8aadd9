//! Storage backends implementing the `stock` store traits.

pub mod memory;
pub mod sea_orm_store;

pub use memory::{MemoryState, MemoryStore, MemoryTx};
pub use sea_orm_store::{SeaOrmBackend, SeaOrmTx};
