pub mod inbox_store;

use std::sync::Arc;

use parking_lot::Mutex;

pub use inbox_store::InboxStore;

/// All mutations are serialized through this single lock; it is only ever
/// held for synchronous store operations, never across an await point.
pub type SharedStore = Arc<Mutex<InboxStore>>;

pub fn shared_store() -> SharedStore {
    Arc::new(Mutex::new(InboxStore::new()))
}
