pub mod config;
pub mod import;
pub mod load;
pub mod process;
pub mod report;
pub mod schema;
