pub mod accounts;
pub mod constants;
pub mod db;
pub mod directory;
pub mod errors;
pub mod refresh;
pub mod schema;
pub mod sources;
pub mod summaries;
pub mod watermarks;

pub use errors::{Error, Result};
