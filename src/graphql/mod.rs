pub mod queries;
pub mod schema;

pub use queries::QueryRoot;
pub use schema::{create_schema, Schema};
