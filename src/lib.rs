//! Metadata engine: models described as data, compiled to parameterized SQL
//! and executed against registered datasources.

pub mod config;
pub mod error;
pub mod executor;
pub mod registry;
pub mod response;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{load_model_data, load_model_data_by_code, validate, MetadataSet, ModelData};
pub use error::{ConfigError, EngineError};
pub use response::Page;
pub use service::{Filter, ListParams, MasterDetailPayload, TreeNode};
pub use settings::Settings;
pub use sql::{Record, SqlBuilder, Value};
pub use state::Engine;
pub use store::{MemoryStore, MetadataStore, SysTableStore};
