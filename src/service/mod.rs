pub mod dashboard;
pub mod fetch;
pub mod normalize;

pub use dashboard::{Dashboard, ITEMS_PER_PAGE, LATEST_INVOICES_LIMIT};
pub use fetch::{fetch, fetch_or_default};
pub use normalize::{flatten_relation, RelationShape};
