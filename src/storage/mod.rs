pub mod models;
pub mod queries;
pub mod schema;
pub mod sqlite;

pub use models::{CommitBatch, StoreCounts};
pub use sqlite::Database;
