/// コアシステムモジュール
pub mod config;
pub mod config_validation;
pub mod ports;
pub mod schedule;
pub mod session;
pub mod status;
pub mod wake_reason;

pub use config::{AppConfig, ConfigError};
pub use ports::{
    CaptureError, Clock, LinkResult, ManagerError, ManagerSession, NetworkConnector,
    SleepArmError, TimeSyncError, UpdateOutcome, WakeSleepControl,
};
pub use schedule::{compute_sleep_plan, RemoteConfig, SchedulePolicy, SleepPlan, TargetTime};
pub use session::{run_session, DeviceIdentity, SessionContext};
pub use status::DeviceStatus;
pub use wake_reason::{TriggerLevel, WakeReason};
