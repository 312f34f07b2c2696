pub mod postgrest;
pub mod scope;

pub use postgrest::{DbError, PostgrestClient};
pub use scope::{tables, AdminDb, ScopedDb};
