pub mod types;
pub mod settings;
pub mod error;


// Re-export AppError for convenience
pub use error::{AppError, AppResult};
