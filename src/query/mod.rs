//! Query layer: the user-facing keyword grammar, the compiler that lowers
//! it to index queries, and the set algebra results are combined with.

pub mod compiler;
pub mod keyword;
pub mod results;

pub use compiler::{compile, Category, CompiledQuery};
pub use keyword::{parse_keywords, Keyword, KeywordTree};
pub use results::ResultSet;
