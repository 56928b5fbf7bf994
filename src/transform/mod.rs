//! Data transformations: scaling and windowed features.

pub mod scale;
pub mod window;

pub use scale::{standardize_with_epsilon, MinMaxScaler};
pub use window::{lag_filled, trailing_mean};
