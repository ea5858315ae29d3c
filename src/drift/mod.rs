pub mod detector;

pub use detector::{classify, DriftDetector, DriftStatus, Remediation};
