pub mod memory;
pub mod query;
pub mod storage;
pub mod store;
pub mod supabase;

pub use memory::MemoryStore;
pub use query::{Predicate, Query};
pub use storage::{FileStorage, MemoryFileStorage, SupabaseFileStorage};
pub use store::RecordStore;
pub use supabase::SupabaseClient;
