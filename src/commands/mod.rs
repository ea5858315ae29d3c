pub mod types;
pub mod handler;

pub use types::{Command, ModelLine, Report, StatusReport};
pub use handler::CommandHandler;
