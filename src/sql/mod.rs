//! Safe SQL generation: identifiers from metadata only, values as parameters.

pub mod dialect;
pub mod params;
pub mod query;
pub mod raw;
mod builder;

pub use builder::*;
pub use dialect::{DbKind, Dialect};
pub use params::{Record, Value};
pub(crate) use params::{bind_values, row_to_record, AnyQuery};
pub use query::{Fragment, QueryBuf, SelectQuery};
pub use raw::{substitute_params, validate_sql};
