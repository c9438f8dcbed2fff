pub mod context;
pub mod error;
pub mod schema;
pub mod settings;
pub mod stream;
pub mod table;
pub mod types;

pub use context::{Context, DEFAULT_DATABASE};
pub use error::{QueryError, Result};
pub use schema::{Field, Schema};
pub use settings::{Limits, Settings};
pub use stream::{collect_batches, BlockStream, MemoryBlockStream};
pub use table::TableData;
pub use types::*;
