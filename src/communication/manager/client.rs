use std::time::Duration;

use embedded_svc::http::client::Client as HttpClient;
use embedded_svc::http::{Method, Status};
use embedded_svc::io::{Read, Write};
use esp_idf_svc::http::client::{Configuration as HttpClientConfiguration, EspHttpConnection};
use esp_idf_svc::ota::EspOta;
use log::{info, warn};
use sha2::{Digest, Sha256};

use crate::communication::manager::types::{
    AuthRequest, AuthResponse, FirmwareManifest, ServiceEndpoints,
};
use crate::core::ports::{ManagerError, ManagerSession, UpdateOutcome};
use crate::core::schedule::RemoteConfig;
use crate::core::status::DeviceStatus;

const MAX_RESPONSE_BODY: usize = 16 * 1024;
const OTA_CHUNK_SIZE: usize = 4096;

/// IoTマネージャーとのHTTPクライアント
///
/// `authenticate` でBearerトークンを取得し、`discover` で各サービスの
/// エンドポイントを解決してから他の操作を行う。操作ごとに接続を張り、
/// タイムアウトを必ず設定する。
pub struct IotManagerClient {
    base_url: String,
    timeout: Duration,
    token: Option<String>,
    endpoints: Option<ServiceEndpoints>,
}

impl IotManagerClient {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        Self {
            base_url,
            timeout,
            token: None,
            endpoints: None,
        }
    }

    fn http(&self) -> Result<HttpClient<EspHttpConnection>, String> {
        let config = HttpClientConfiguration {
            timeout: Some(self.timeout),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        EspHttpConnection::new(&config)
            .map(HttpClient::wrap)
            .map_err(|e| e.to_string())
    }

    /// 認証ヘッダ付きのリクエストを発行し、2xxならレスポンスボディを返す
    fn request(
        &self,
        method: Method,
        url: &str,
        content_type: Option<&str>,
        body: Option<&[u8]>,
    ) -> Result<Vec<u8>, String> {
        let mut client = self.http()?;

        let auth = self.token.as_ref().map(|t| format!("Bearer {}", t));
        let content_length = body.map(|b| b.len().to_string());

        let mut headers: Vec<(&str, &str)> = Vec::new();
        if let Some(auth) = auth.as_deref() {
            headers.push(("Authorization", auth));
        }
        if let Some(ct) = content_type {
            headers.push(("Content-Type", ct));
        }
        if let Some(len) = content_length.as_deref() {
            headers.push(("Content-Length", len));
        }

        let mut request = client
            .request(method, url, &headers)
            .map_err(|e| format!("{:?}", e))?;
        if let Some(body) = body {
            request.write_all(body).map_err(|e| format!("{:?}", e))?;
            request.flush().map_err(|e| format!("{:?}", e))?;
        }

        let mut response = request.submit().map_err(|e| format!("{:?}", e))?;
        let status = response.status();
        let body = read_body(&mut response)?;
        if !(200..300).contains(&status) {
            return Err(format!(
                "HTTP {} from {}: {}",
                status,
                url,
                String::from_utf8_lossy(&body[..body.len().min(256)])
            ));
        }
        Ok(body)
    }

    fn endpoints(&self) -> Result<&ServiceEndpoints, String> {
        self.endpoints
            .as_ref()
            .ok_or_else(|| "endpoints not resolved (call discover first)".to_string())
    }

    /// マニフェストのイメージをダウンロードしてOTAスロットへ書き込む。
    /// ブートスロットは切り替えるが再起動はしない（次回起床時に新イメージ
    /// で立ち上がる）。
    fn apply_firmware(&self, manifest: &FirmwareManifest) -> Result<(), String> {
        let mut client = self.http()?;

        let auth = self.token.as_ref().map(|t| format!("Bearer {}", t));
        let mut headers: Vec<(&str, &str)> = Vec::new();
        if let Some(auth) = auth.as_deref() {
            headers.push(("Authorization", auth));
        }

        let request = client
            .request(Method::Get, &manifest.url, &headers)
            .map_err(|e| format!("{:?}", e))?;
        let mut response = request.submit().map_err(|e| format!("{:?}", e))?;

        let status = response.status();
        if !(200..300).contains(&status) {
            return Err(format!("firmware download failed with HTTP {}", status));
        }

        let mut ota = EspOta::new().map_err(|e| format!("failed to acquire OTA: {:?}", e))?;
        let mut update = ota
            .initiate_update()
            .map_err(|e| format!("failed to initiate OTA update: {:?}", e))?;

        let mut hasher = Sha256::new();
        let mut total_written = 0_usize;
        let mut chunk = [0_u8; OTA_CHUNK_SIZE];

        loop {
            let read = response.read(&mut chunk).map_err(|e| format!("{:?}", e))?;
            if read == 0 {
                break;
            }
            update
                .write(&chunk[..read])
                .map_err(|e| format!("failed writing OTA data: {:?}", e))?;
            hasher.update(&chunk[..read]);
            total_written += read;
        }

        if total_written == 0 {
            return Err("firmware download body is empty".to_string());
        }

        let digest = hasher.finalize();
        let mut digest_hex = String::with_capacity(64);
        for byte in digest {
            use core::fmt::Write as _;
            let _ = write!(&mut digest_hex, "{:02x}", byte);
        }

        if let Some(expected) = manifest.sha256.as_deref() {
            let normalized = expected.trim().to_ascii_lowercase();
            if digest_hex != normalized {
                return Err(format!(
                    "sha256 mismatch (expected {}, got {})",
                    normalized, digest_hex
                ));
            }
        } else {
            warn!("マニフェストにsha256がありません。ダイジェスト検証をスキップします");
        }

        update
            .complete()
            .map_err(|e| format!("failed finalizing OTA image: {:?}", e))?;
        info!(
            "OTAイメージの書き込みが完了しました ({} bytes, sha256={})",
            total_written, digest_hex
        );
        Ok(())
    }
}

impl ManagerSession for IotManagerClient {
    fn authenticate(
        &mut self,
        device_id: &str,
        device_password: &str,
    ) -> Result<(), ManagerError> {
        let url = format!("{}/api/auth", self.base_url);
        let payload = serde_json::to_vec(&AuthRequest {
            device_id,
            device_password,
        })
        .map_err(|e| ManagerError::Auth(e.to_string()))?;

        let body = self
            .request(Method::Post, &url, Some("application/json"), Some(&payload))
            .map_err(ManagerError::Auth)?;

        let response: AuthResponse = serde_json::from_slice(&body)
            .map_err(|e| ManagerError::Auth(format!("invalid auth response: {}", e)))?;
        self.token = Some(response.token);
        info!("マネージャー認証に成功しました: {}", device_id);
        Ok(())
    }

    fn discover(&mut self) -> Result<(), ManagerError> {
        if self.token.is_none() {
            return Err(ManagerError::Discovery("not authenticated".to_string()));
        }

        let url = format!("{}/api/discovery", self.base_url);
        let body = self
            .request(Method::Get, &url, None, None)
            .map_err(ManagerError::Discovery)?;

        let endpoints: ServiceEndpoints = serde_json::from_slice(&body)
            .map_err(|e| ManagerError::Discovery(format!("invalid discovery response: {}", e)))?;
        info!("エンドポイント解決が完了しました");
        self.endpoints = Some(endpoints);
        Ok(())
    }

    fn upload_artifact(&mut self, image: &[u8]) -> Result<String, ManagerError> {
        let url = self
            .endpoints()
            .map_err(ManagerError::Upload)?
            .image_upload_url
            .clone();

        info!("画像をアップロードします: {} bytes", image.len());
        let body = self
            .request(Method::Post, &url, Some("image/jpeg"), Some(image))
            .map_err(ManagerError::Upload)?;

        let ack = String::from_utf8_lossy(&body).trim().to_string();
        Ok(if ack.is_empty() { "ok".to_string() } else { ack })
    }

    fn fetch_config(&mut self) -> Result<RemoteConfig, ManagerError> {
        let url = self
            .endpoints()
            .map_err(ManagerError::Config)?
            .config_url
            .clone();

        let body = self
            .request(Method::Get, &url, None, None)
            .map_err(ManagerError::Config)?;

        serde_json::from_slice(&body)
            .map_err(|e| ManagerError::Config(format!("invalid config response: {}", e)))
    }

    fn report_status(&mut self, status: &DeviceStatus) -> Result<(), ManagerError> {
        let url = self
            .endpoints()
            .map_err(ManagerError::Status)?
            .device_status_url
            .clone();

        let payload =
            serde_json::to_vec(status).map_err(|e| ManagerError::Status(e.to_string()))?;
        self.request(Method::Post, &url, Some("application/json"), Some(&payload))
            .map_err(ManagerError::Status)?;
        info!("ステータス報告が完了しました");
        Ok(())
    }

    fn check_and_apply_update(
        &mut self,
        current_version: &str,
    ) -> Result<UpdateOutcome, ManagerError> {
        let url = self
            .endpoints()
            .map_err(ManagerError::Update)?
            .firmware_url
            .clone();

        let body = self
            .request(Method::Get, &url, None, None)
            .map_err(ManagerError::Update)?;
        let manifest: FirmwareManifest = serde_json::from_slice(&body)
            .map_err(|e| ManagerError::Update(format!("invalid firmware manifest: {}", e)))?;

        if manifest.version == current_version {
            return Ok(UpdateOutcome::UpToDate);
        }

        info!(
            "新しいファームウェアがあります: {} -> {}",
            current_version, manifest.version
        );
        self.apply_firmware(&manifest)
            .map_err(ManagerError::Update)?;
        Ok(UpdateOutcome::Applied {
            version: manifest.version,
        })
    }
}

/// レスポンスボディを上限付きで読み切る
fn read_body<R: Read>(response: &mut R) -> Result<Vec<u8>, String> {
    let mut body = Vec::new();
    let mut chunk = [0_u8; 1024];
    loop {
        let read = response.read(&mut chunk).map_err(|e| format!("{:?}", e))?;
        if read == 0 {
            break;
        }
        if body.len() + read > MAX_RESPONSE_BODY {
            return Err("response body too large".to_string());
        }
        body.extend_from_slice(&chunk[..read]);
    }
    Ok(body)
}
