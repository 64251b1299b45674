pub mod memory;
pub mod pool;
pub mod postgres;
pub mod query;
pub mod rest;
pub mod store;

pub use memory::{MemoryStore, RelationStyle};
pub use pool::create_pool;
pub use postgres::PgStore;
pub use query::{Column, Field, Filter, QuerySpec, Table};
pub use rest::RestStore;
pub use store::{decode_rows, QueryOutput, Row, RowStore};
