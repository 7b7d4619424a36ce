pub mod deep_sleep;

pub use deep_sleep::*;
