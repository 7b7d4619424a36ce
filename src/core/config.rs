use crate::core::config_validation::{
    parse_camera_warmup_frames, parse_manager_base_url, parse_target_wakeup_time,
    validate_device_id, validate_device_password, validate_sleep_duration_seconds,
    validate_trigger_wakeup_pin, ValidationError,
};
use crate::core::schedule::{SchedulePolicy, TargetTime};

/// アプリケーション設定
///
/// この構造体はビルド時に`build.rs`によって`cfg.toml`ファイルから
/// 読み込まれた設定を保持します。
#[toml_cfg::toml_config]
pub struct Config {
    #[default("")]
    device_id: &'static str,

    #[default("")]
    device_password: &'static str,

    #[default("")]
    manager_base_url: &'static str,

    #[default("")]
    wifi_ssid: &'static str,

    #[default("")]
    wifi_password: &'static str,

    #[default("Asia/Tokyo")]
    timezone: &'static str,

    #[default(255)] // 255 = 定時起床なし
    target_wakeup_hour: u8,

    #[default(0)]
    target_wakeup_minute: u8,

    #[default(86400)] // 既定は24時間
    default_sleep_duration_seconds: u64,

    #[default(300)] // 接続失敗時の短いフォールバック (5分)
    fallback_sleep_duration_seconds: u64,

    // 外部トリガー (PIR) 設定
    #[default(13)]
    trigger_wakeup_pin: i32,

    #[default(false)] // PIRはLowレベルで起床
    trigger_wakeup_level_high: bool,

    #[default(3)]
    wifi_max_attempts: u32,

    #[default(300)]
    portal_timeout_seconds: u64,

    #[default(10)]
    sntp_timeout_seconds: u64,

    #[default(20)]
    http_timeout_seconds: u64,

    #[default(255)]
    camera_warmup_frames: u8,

    #[default("SXGA")]
    camera_frame_size: &'static str,
}

/// 設定エラー
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("デバイスIDが設定されていません。cfg.tomlを確認してください。")]
    MissingDeviceId,
    #[error("デバイスパスワードが設定されていません。cfg.tomlを確認してください。")]
    MissingDevicePassword,
    #[error("マネージャーのベースURLが無効です: {0}")]
    InvalidManagerBaseUrl(String),
    #[error("定時起床の値が無効です (hour={0}, minute={1})")]
    InvalidTargetWakeupTime(u8, u8),
    #[error("camera_warmup_frames の値が無効です (0-10): {0}")]
    InvalidCameraWarmupFrames(u8),
    #[error("trigger_wakeup_pin がRTC対応GPIOではありません: {0}")]
    InvalidTriggerWakeupPin(i32),
    #[error("スリープ時間は0より大きい必要があります: {0}")]
    InvalidSleepDuration(u64),
}

/// アプリケーション設定を表す構造体
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// デバイスID（マネージャー認証に使用）
    pub device_id: String,

    /// デバイスパスワード
    pub device_password: String,

    /// マネージャーのベースURL（末尾スラッシュなし）
    pub manager_base_url: String,

    /// WiFi SSID（空の場合はNVS保存値またはポータルにフォールバック）
    pub wifi_ssid: String,

    /// WiFiパスワード
    pub wifi_password: String,

    /// タイムゾーン
    pub timezone: String,

    /// 定時起床の目標時刻
    pub target_wakeup_time: Option<TargetTime>,

    /// 既定スリープ時間（秒）
    pub default_sleep_duration_seconds: u64,

    /// フォールバックスリープ時間（秒）
    pub fallback_sleep_duration_seconds: u64,

    /// 外部トリガーのGPIO番号
    pub trigger_wakeup_pin: i32,

    /// 外部トリガーの起床レベル（true=High）
    pub trigger_wakeup_level_high: bool,

    /// WiFi接続の最大試行回数
    pub wifi_max_attempts: u32,

    /// 設定ポータルの待機時間（秒）
    pub portal_timeout_seconds: u64,

    /// SNTP同期のタイムアウト（秒）
    pub sntp_timeout_seconds: u64,

    /// HTTPリクエストのタイムアウト（秒）
    pub http_timeout_seconds: u64,

    /// カメラウォームアップフレーム数
    pub camera_warmup_frames: Option<u8>,

    /// カメラのフレームサイズ
    pub camera_frame_size: String,
}

impl AppConfig {
    /// 設定ファイルから設定をロードします
    pub fn load() -> Result<Self, ConfigError> {
        // toml_cfg によって生成された定数
        let config = CONFIG;

        validate_device_id(config.device_id).map_err(map_validation_error)?;
        validate_device_password(config.device_password).map_err(map_validation_error)?;

        let manager_base_url =
            parse_manager_base_url(config.manager_base_url).map_err(map_validation_error)?;

        let target_wakeup_time =
            parse_target_wakeup_time(config.target_wakeup_hour, config.target_wakeup_minute)
                .map_err(map_validation_error)?;

        let camera_warmup_frames =
            parse_camera_warmup_frames(config.camera_warmup_frames).map_err(map_validation_error)?;

        validate_trigger_wakeup_pin(config.trigger_wakeup_pin).map_err(map_validation_error)?;
        validate_sleep_duration_seconds(config.default_sleep_duration_seconds)
            .map_err(map_validation_error)?;
        validate_sleep_duration_seconds(config.fallback_sleep_duration_seconds)
            .map_err(map_validation_error)?;

        Ok(AppConfig {
            device_id: config.device_id.to_string(),
            device_password: config.device_password.to_string(),
            manager_base_url,
            wifi_ssid: config.wifi_ssid.to_string(),
            wifi_password: config.wifi_password.to_string(),
            timezone: config.timezone.to_string(),
            target_wakeup_time,
            default_sleep_duration_seconds: config.default_sleep_duration_seconds,
            fallback_sleep_duration_seconds: config.fallback_sleep_duration_seconds,
            trigger_wakeup_pin: config.trigger_wakeup_pin,
            trigger_wakeup_level_high: config.trigger_wakeup_level_high,
            wifi_max_attempts: config.wifi_max_attempts,
            portal_timeout_seconds: config.portal_timeout_seconds,
            sntp_timeout_seconds: config.sntp_timeout_seconds,
            http_timeout_seconds: config.http_timeout_seconds,
            camera_warmup_frames,
            camera_frame_size: config.camera_frame_size.to_string(),
        })
    }

    /// スリープ計画ポリシーを構築する
    pub fn schedule_policy(&self) -> SchedulePolicy {
        let timezone = self.timezone.parse().unwrap_or(chrono_tz::Asia::Tokyo);
        SchedulePolicy {
            timezone,
            target_time_of_day: self.target_wakeup_time,
            default_sleep_ms: self.default_sleep_duration_seconds * 1_000,
            fallback_sleep_ms: self.fallback_sleep_duration_seconds * 1_000,
        }
    }
}

fn map_validation_error(err: ValidationError) -> ConfigError {
    match err {
        ValidationError::MissingDeviceId => ConfigError::MissingDeviceId,
        ValidationError::MissingDevicePassword => ConfigError::MissingDevicePassword,
        ValidationError::MissingManagerBaseUrl => {
            ConfigError::InvalidManagerBaseUrl("(未設定)".to_string())
        }
        ValidationError::InvalidManagerBaseUrl(url) => ConfigError::InvalidManagerBaseUrl(url),
        ValidationError::InvalidTargetWakeupHour(h) => ConfigError::InvalidTargetWakeupTime(h, 0),
        ValidationError::InvalidTargetWakeupMinute(m) => {
            ConfigError::InvalidTargetWakeupTime(0, m)
        }
        ValidationError::InvalidCameraWarmupFrames(v) => ConfigError::InvalidCameraWarmupFrames(v),
        ValidationError::InvalidTriggerWakeupPin(pin) => ConfigError::InvalidTriggerWakeupPin(pin),
        ValidationError::InvalidSleepDuration(v) => ConfigError::InvalidSleepDuration(v),
    }
}
