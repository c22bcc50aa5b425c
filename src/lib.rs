//! Price list import and export over zip-wrapped CSV.

pub mod archive;
pub mod config;
pub mod db;
mod error;
pub mod export;
pub mod http;
pub mod import;
pub mod logging;
pub mod model;
pub mod records;
pub mod state;

pub use error::{AppError, AppResult};
pub use logging::init_logging;
pub use model::{Item, Totals};
pub use state::AppState;
