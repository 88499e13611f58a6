//! Query object and its PostgreSQL compilation: identifiers from configuration only, values as parameters.

mod builder;
pub mod params;
pub mod query;
pub use builder::*;
pub use params::*;
pub use query::*;
