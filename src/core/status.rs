use serde::Serialize;

/// マネージャーへ送信するデバイス状態レポート
///
/// フィールド名はそのままワイヤー上のJSONキーになる。
/// スリープ直前に構築して一度だけ送信し、以後保持しない。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceStatus {
    /// 今回の起床時刻 (epoch秒)
    pub last_wakeup_time: i64,
    /// 起床原因の文字列表現
    pub last_wakeup_reason: String,
    /// 実行中のファームウェアバージョン
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DeviceStatus {
    /// スリープ直前のチェックイン用レポートを構築する
    pub fn sleeping(
        last_wakeup_time: i64,
        last_wakeup_reason: String,
        version: &str,
        message: Option<String>,
    ) -> Self {
        Self {
            last_wakeup_time,
            last_wakeup_reason,
            version: version.to_string(),
            status: Some("sleeping".to_string()),
            message,
        }
    }
}
