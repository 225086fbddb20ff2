pub mod identity;
pub mod keys;
pub mod seed;
pub mod store;

pub use identity::ReaderIdentity;
pub use seed::seed_store;
pub use store::{Activity, AttributeStore, ChangeListener, MemoryStore, StoreChange, StoreError};
