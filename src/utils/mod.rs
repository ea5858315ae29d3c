pub mod error_handling;

pub use error_handling::{ControllerError, ControllerResult};
