//! Application layer: session use cases
//!
//! Orchestrates the domain core with files and settings.

pub mod error;
pub mod error_ext;
pub mod session;

pub use error::{ApplicationError, ApplicationResult};
pub use error_ext::IoResultExt;
pub use session::{load_session, restore_session, save_session};
