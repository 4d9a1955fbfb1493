pub mod memory;
pub mod snapshot;
pub mod snapshot_manager;

pub use memory::MemoryPriceStore;
pub use snapshot::StoreSnapshot;
pub use snapshot_manager::SnapshotManager;
