/// Fjall-backed document store for sources, profiles and stored settings
///
/// The dashboard owns writes; the request pipeline only reads. Each document
/// is replaced whole on write (last write wins) and a missing document reads
/// as empty.
///
/// ```rust,ignore
/// use subhub::store::FjallStore;
///
/// let store = FjallStore::open("data/store")?;
/// let sources = store.load_sources()?;
/// ```

pub mod error;
pub mod partitions;
pub mod store;

pub use error::{Result, StoreError};
pub use partitions::DocKey;
pub use store::{FjallStore, StoreExport};
