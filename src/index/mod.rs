pub mod projector;
pub mod schema;
pub mod searcher;
pub mod store;

pub use projector::ChangeProjector;
pub use schema::{DocCategory, Document, Field, FilterSet};
pub use searcher::{DocId, IndexQuery, QueryError, Searcher};
pub use store::{IndexLocation, IndexStore, StoreError, StoreStats};
