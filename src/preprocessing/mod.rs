//! Preprocessing stage
//!
//! Fits per-feature scaling (and an optional PCA projection) on a training
//! batch and replays exactly that transform at prediction time.

mod projection;
mod scaler;
mod statistics;

pub use projection::Projection;
pub use scaler::StandardScaler;
pub use statistics::PreprocessingStatistics;
