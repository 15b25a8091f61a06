//! Feature preprocessing

mod scaler;

pub use scaler::StandardScaler;
