/// 電源管理モジュール
pub mod sleep;
pub mod wake;

pub use sleep::{DeepSleepController, DeepSleepPlatform, EspIdfDeepSleep};
pub use wake::read_wake_reason;
