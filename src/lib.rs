/*!
 * # Motion Cam Agent Library
 *
 * PIRトリガー式バッテリーカメラの起床/スリープ制御ファームウェア。
 * 起床ごとに1セッション（撮影 → WiFi接続 → マネージャー認証 →
 * アップロード/ステータス報告/更新チェック → 次回起床計画 → ディープスリープ）
 * を実行する。
 *
 * ## モジュール構成
 * - `core`: セッション制御の核（設定、起床原因、スリープ計画、オーケストレーター）
 * - `hardware`: ハードウェア制御（カメラ、ピン設定）
 * - `communication`: 通信機能（WiFi、設定ポータル、時刻同期、マネージャーAPI）
 * - `power`: 電源管理（起床原因の読み取り、ディープスリープ）
 */

// 公開モジュール
#[cfg(not(test))]
pub mod communication;
pub mod core;
#[cfg(not(test))]
pub mod hardware;
#[cfg(not(test))]
pub mod power;

// 内部で使用する型をまとめてエクスポート
#[cfg(not(test))]
pub use communication::manager::IotManagerClient;
#[cfg(not(test))]
pub use communication::network_manager::WifiConnector;
#[cfg(not(test))]
pub use communication::time_sync::EspClock;
pub use crate::core::config::{AppConfig, ConfigError};
pub use crate::core::ports::{
    CaptureError, Clock, LinkResult, ManagerError, ManagerSession, NetworkConnector,
    TimeSyncError, UpdateOutcome, WakeSleepControl,
};
pub use crate::core::schedule::{compute_sleep_plan, RemoteConfig, SchedulePolicy, SleepPlan};
pub use crate::core::session::{run_session, DeviceIdentity, SessionContext};
pub use crate::core::status::DeviceStatus;
pub use crate::core::wake_reason::{TriggerLevel, WakeReason};
#[cfg(not(test))]
pub use hardware::camera::CameraUnit;
#[cfg(not(test))]
pub use hardware::CameraPins;
#[cfg(not(test))]
pub use power::sleep::{DeepSleepController, DeepSleepPlatform, EspIdfDeepSleep};

/// ライブラリのバージョン情報
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// テストモジュール
#[cfg(test)]
mod tests;
