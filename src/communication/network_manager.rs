use std::time::Duration;

use embedded_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs};
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};
use log::{info, warn};

use crate::communication::portal::{self, PortalOutcome};
use crate::core::ports::{LinkResult, NetworkConnector};

/// ポータルで保存した資格情報のNVS名前空間とキー
pub const NVS_NAMESPACE: &str = "netcfg";
pub const NVS_SSID_KEY: &str = "wifi_ssid";
pub const NVS_PASSWORD_KEY: &str = "wifi_pass";

const WIFI_RETRY_DELAY_MS: u32 = 3_000;

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("WiFi driver error: {0}")]
    Driver(String),
    #[error("SSIDまたはパスワードが長すぎます")]
    CredentialLength,
    #[error("接続試行が上限に達しました: {0}")]
    AttemptsExhausted(String),
}

/// WiFi接続設定 (cfg.toml 由来)
#[derive(Debug, Clone)]
pub struct WifiSettings {
    pub ssid: String,
    pub password: String,
    pub max_attempts: u32,
    pub portal_timeout: Duration,
}

/// WiFi STAモード接続の管理
///
/// 接続試行は回数制限付き。資格情報はNVS保存値（ポータル由来）を優先し、
/// 次にビルド時設定を使う。どちらも無い場合、許可されていれば設定
/// ポータルへフォールバックする。
pub struct WifiConnector {
    wifi: BlockingWifi<EspWifi<'static>>,
    nvs_partition: EspDefaultNvsPartition,
    settings: WifiSettings,
}

impl WifiConnector {
    pub fn new(
        modem: Modem,
        sysloop: &EspSystemEventLoop,
        nvs_partition: &EspDefaultNvsPartition,
        settings: WifiSettings,
    ) -> Result<Self, NetworkError> {
        let wifi = BlockingWifi::wrap(
            EspWifi::new(modem, sysloop.clone(), Some(nvs_partition.clone()))
                .map_err(|e| NetworkError::Driver(e.to_string()))?,
            sysloop.clone(),
        )
        .map_err(|e| NetworkError::Driver(e.to_string()))?;

        Ok(Self {
            wifi,
            nvs_partition: nvs_partition.clone(),
            settings,
        })
    }

    /// ポータルで保存された資格情報をNVSから読む
    fn stored_credentials(&self) -> Option<(String, String)> {
        let nvs = EspNvs::new(self.nvs_partition.clone(), NVS_NAMESPACE, false).ok()?;

        let mut ssid_buf = [0u8; 64];
        let mut pass_buf = [0u8; 96];
        let ssid = nvs.get_str(NVS_SSID_KEY, &mut ssid_buf).ok()??.to_string();
        let password = nvs
            .get_str(NVS_PASSWORD_KEY, &mut pass_buf)
            .ok()?
            .unwrap_or("")
            .to_string();

        if ssid.is_empty() {
            return None;
        }
        Some((ssid, password))
    }

    /// 設定済み資格情報の解決。NVS保存値が優先。
    fn resolve_credentials(&self) -> Option<(String, String)> {
        if let Some(stored) = self.stored_credentials() {
            info!("NVSに保存されたWiFi資格情報を使用します: {}", stored.0);
            return Some(stored);
        }
        if !self.settings.ssid.is_empty() {
            return Some((self.settings.ssid.clone(), self.settings.password.clone()));
        }
        None
    }

    /// 回数制限付きのSTA接続。成功時はIPアドレスを返す。
    fn try_connect(&mut self, ssid: &str, password: &str) -> Result<String, NetworkError> {
        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPAWPA2Personal
        };

        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration {
                ssid: ssid.try_into().map_err(|_| NetworkError::CredentialLength)?,
                password: password
                    .try_into()
                    .map_err(|_| NetworkError::CredentialLength)?,
                auth_method,
                ..Default::default()
            }))
            .map_err(|e| NetworkError::Driver(e.to_string()))?;

        self.wifi
            .start()
            .map_err(|e| NetworkError::Driver(e.to_string()))?;
        info!("WiFi起動完了。`{}` へ接続します", ssid);

        let max_attempts = self.settings.max_attempts.max(1);
        let mut last_err = String::new();
        for attempt in 1..=max_attempts {
            info!("WiFi接続試行 {}/{}", attempt, max_attempts);
            let result = self
                .wifi
                .connect()
                .and_then(|()| self.wifi.wait_netif_up());
            match result {
                Ok(()) => {
                    let ip_info = self
                        .wifi
                        .wifi()
                        .sta_netif()
                        .get_ip_info()
                        .map_err(|e| NetworkError::Driver(e.to_string()))?;
                    info!("WiFi接続完了 (試行{}回目): ip={}", attempt, ip_info.ip);
                    return Ok(ip_info.ip.to_string());
                }
                Err(e) => {
                    warn!("WiFi接続に失敗 (試行{}回目): {}", attempt, e);
                    last_err = e.to_string();
                }
            }

            if attempt < max_attempts {
                let _ = self.wifi.disconnect();
                FreeRtos::delay_ms(WIFI_RETRY_DELAY_MS);
            }
        }

        let _ = self.wifi.disconnect();
        let _ = self.wifi.stop();
        Err(NetworkError::AttemptsExhausted(last_err))
    }

    /// 設定ポータルを起動する。資格情報が保存された場合はポータル側で
    /// 再起動するため戻らない。タイムアウトした場合のみ戻る。
    fn fall_back_to_portal(&mut self) -> LinkResult {
        let timeout = self.settings.portal_timeout;
        match portal::run_portal(&mut self.wifi, &self.nvs_partition, timeout) {
            Ok(PortalOutcome::TimedOut) => LinkResult::Failed {
                cause: "設定ポータルがタイムアウトしました".to_string(),
            },
            Err(e) => LinkResult::Failed {
                cause: format!("設定ポータルの起動に失敗: {}", e),
            },
        }
    }
}

impl NetworkConnector for WifiConnector {
    fn connect(&mut self, allow_interactive_setup: bool) -> LinkResult {
        match self.resolve_credentials() {
            Some((ssid, password)) => match self.try_connect(&ssid, &password) {
                Ok(ip) => LinkResult::Connected { ip },
                Err(e) => {
                    if allow_interactive_setup {
                        warn!("STA接続に失敗したため設定ポータルへフォールバックします: {}", e);
                        self.fall_back_to_portal()
                    } else {
                        LinkResult::Failed {
                            cause: e.to_string(),
                        }
                    }
                }
            },
            None => {
                if allow_interactive_setup {
                    warn!("WiFi資格情報が未設定です。設定ポータルを起動します");
                    self.fall_back_to_portal()
                } else {
                    LinkResult::Failed {
                        cause: "WiFi資格情報が未設定です".to_string(),
                    }
                }
            }
        }
    }

    fn shutdown(&mut self) {
        // スリープ前にリンクを確実に解放する
        let _ = self.wifi.disconnect();
        let _ = self.wifi.stop();
        info!("WiFiリンクを解放しました");
    }
}
