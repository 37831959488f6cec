//! Vector index: storage seam, backends, and the batch indexer.

mod indexer;
mod memory;
mod sqlite;
mod traits;

pub use indexer::Indexer;
pub use memory::MemoryIndex;
pub use sqlite::SqliteIndex;
pub use traits::{FragmentIndex, IndexEntry, IndexError, IndexResult, IndexStats, SearchFilter};
