pub mod catalog;
pub mod ensure;
pub mod evolution;
pub mod sql;
pub mod types;

pub use catalog::{Layout, LayoutKind, COMPACT, PUBLISHED};
pub use ensure::ensure_table;
pub use evolution::SchemaPlan;
pub use sql::TableName;
pub use types::{ColumnDef, ColumnKind};
