use std::time::Duration;

use esp_idf_svc::{
    eventloop::EspSystemEventLoop, hal::peripherals::Peripherals, nvs::EspDefaultNvsPartition,
};
use log::{error, info};

use motion_cam_agent::communication::manager::IotManagerClient;
use motion_cam_agent::communication::network_manager::{WifiConnector, WifiSettings};
use motion_cam_agent::communication::time_sync::EspClock;
use motion_cam_agent::core::config::AppConfig;
use motion_cam_agent::core::ports::WakeSleepControl;
use motion_cam_agent::core::session::{run_session, DeviceIdentity};
use motion_cam_agent::hardware::camera::{AiThinkerCamConfig, CameraUnit};
use motion_cam_agent::hardware::CameraPins;
use motion_cam_agent::power::sleep::{DeepSleepController, EspIdfDeepSleep};
use motion_cam_agent::power::wake::read_wake_reason;
use motion_cam_agent::VERSION;

// 設定ロード自体に失敗した場合でも起床経路を確保するための既定値
const FALLBACK_TRIGGER_GPIO: i32 = 13;
const FALLBACK_SLEEP_MS: u64 = 300_000;

/// アプリケーションのメインエントリーポイント
fn main() -> anyhow::Result<()> {
    // ESP-IDFの基本初期化
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    if let Err(e) = run() {
        error!("セッションが異常終了しました: {:?}", e);
        // どの失敗経路でも起床手段を確保した上でスリープする。
        // 起床手段なしの永眠や無限ループでの停止は許容しない。
        let mut sleep = DeepSleepController::new(EspIdfDeepSleep, FALLBACK_TRIGGER_GPIO, false);
        if let Err(arm_err) = sleep.arm_external_trigger() {
            error!("外部トリガーのarmに失敗: {}", arm_err);
        }
        sleep.deep_sleep(Some(FALLBACK_SLEEP_MS));
    }
    Ok(())
}

fn run() -> anyhow::Result<()> {
    // 設定ファイル読み込み
    let app_config = AppConfig::load().map_err(|e| {
        error!("設定ファイルの読み込みに失敗しました: {}", e);
        anyhow::anyhow!("設定ファイルの読み込みエラー: {}", e)
    })?;
    info!("デバイスID: {}", app_config.device_id);

    // ペリフェラルとシステムリソースの初期化
    info!("ペリフェラルを初期化しています");
    let peripherals = Peripherals::take().expect("Failed to take peripherals");
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // 起動原因は他の副作用より先に読む（撮影の有無やポータル許可が依存する）
    let wake_reason = read_wake_reason(app_config.trigger_wakeup_level_high);

    // カメラ用ピンの準備 (AI Thinker ESP32-CAM)
    let pins = peripherals.pins;
    let camera_pins = CameraPins::new(
        pins.gpio32, pins.gpio0, pins.gpio5, pins.gpio18,
        pins.gpio19, pins.gpio21, pins.gpio36, pins.gpio39,
        pins.gpio34, pins.gpio35, pins.gpio25, pins.gpio23,
        pins.gpio22, pins.gpio26, pins.gpio27,
    );
    let mut camera = CameraUnit::new(
        camera_pins,
        AiThinkerCamConfig {
            frame_size: app_config.camera_frame_size.clone(),
            warmup_frames: app_config.camera_warmup_frames,
        },
    );

    // ネットワーク（WiFi）初期化
    let mut network = WifiConnector::new(
        peripherals.modem,
        &sysloop,
        &nvs_partition,
        WifiSettings {
            ssid: app_config.wifi_ssid.clone(),
            password: app_config.wifi_password.clone(),
            max_attempts: app_config.wifi_max_attempts,
            portal_timeout: Duration::from_secs(app_config.portal_timeout_seconds),
        },
    )?;

    let mut clock = EspClock::new(Duration::from_secs(app_config.sntp_timeout_seconds));
    let mut manager = IotManagerClient::new(
        app_config.manager_base_url.clone(),
        Duration::from_secs(app_config.http_timeout_seconds),
    );
    let mut sleep = DeepSleepController::new(
        EspIdfDeepSleep,
        app_config.trigger_wakeup_pin,
        app_config.trigger_wakeup_level_high,
    );

    let identity = DeviceIdentity {
        device_id: app_config.device_id.clone(),
        device_password: app_config.device_password.clone(),
    };
    let policy = app_config.schedule_policy();

    let plan = run_session(
        identity,
        VERSION,
        &policy,
        wake_reason,
        &mut camera,
        &mut network,
        &mut clock,
        &mut manager,
        &mut sleep,
    );

    // 実機では deep_sleep から戻らないため、ここには到達しない
    info!("セッション終了: {:?}", plan);
    Ok(())
}
