pub mod aggregate;
pub mod client;
pub mod error;
pub mod pool;
pub mod registry;
pub mod resolve;
pub mod schema;
pub mod service;

pub use client::{MySqlSource, RecordRow, SourceClient, SourcePools};
pub use error::{MedrecError, Result};
pub use pool::PoolManager;
pub use registry::MpiRegistry;
pub use resolve::{resolve_identity, IdentityMapping};
pub use schema::{ColumnDescriptor, ConnectionParams, MpiRecord, SchemaMapping, SourceConfig};
pub use service::RecordService;
