use serde::{Deserialize, Serialize};

/// 認証リクエスト
#[derive(Debug, Serialize)]
pub(crate) struct AuthRequest<'a> {
    #[serde(rename = "deviceId")]
    pub device_id: &'a str,
    #[serde(rename = "devicePassword")]
    pub device_password: &'a str,
}

/// 認証レスポンス。トークンは以後のリクエストのBearerヘッダに載せる。
#[derive(Debug, Deserialize)]
pub(crate) struct AuthResponse {
    pub token: String,
}

/// エンドポイント解決の結果
///
/// マネージャーが返す各サービスの絶対URL。認証後に一度だけ解決し、
/// セッション中保持する。
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceEndpoints {
    #[serde(rename = "configUrl")]
    pub config_url: String,
    #[serde(rename = "imageUploadUrl")]
    pub image_upload_url: String,
    #[serde(rename = "deviceStatusUrl")]
    pub device_status_url: String,
    #[serde(rename = "firmwareUrl")]
    pub firmware_url: String,
}

/// ファームウェアマニフェスト
#[derive(Debug, Clone, Deserialize)]
pub struct FirmwareManifest {
    pub version: String,
    pub url: String,
    #[serde(default)]
    pub sha256: Option<String>,
}
