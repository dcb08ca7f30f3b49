pub mod adapter;
pub mod error;
pub mod memory;
pub mod query;
pub mod rest;
pub mod sqlite;

pub use adapter::RemoteStore;
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use query::{Filter, Order, ReadQuery, RowRange, RowSet, SortDirection};
pub use rest::RestStore;
pub use sqlite::SqliteStore;
