use crate::core::schedule::RemoteConfig;
use crate::core::status::DeviceStatus;

/// ネットワーク接続の結果。接続直後に消費され、保持されない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkResult {
    Connected { ip: String },
    Failed { cause: String },
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("camera init failed: {0}")]
    Init(String),
    #[error("image capture failed: {0}")]
    Capture(String),
    /// センサーはセッション中一度しか使えない（deinit後の再初期化が必要）
    #[error("camera sensor already consumed this session")]
    SensorConsumed,
}

#[derive(Debug, thiserror::Error)]
pub enum TimeSyncError {
    #[error("SNTP init failed: {0}")]
    Init(String),
    #[error("SNTP sync timed out")]
    Timeout,
}

/// マネージャー操作のエラー分類
///
/// 各操作は独立して失敗しうる。認証とエンドポイント解決の失敗はセッション
/// 致命、それ以外はアクション単位で隔離される（セッション側の方針）。
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("endpoint discovery failed: {0}")]
    Discovery(String),
    #[error("artifact upload failed: {0}")]
    Upload(String),
    #[error("config fetch failed: {0}")]
    Config(String),
    #[error("status report failed: {0}")]
    Status(String),
    #[error("firmware update failed: {0}")]
    Update(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SleepArmError {
    #[error("failed to arm ext0 wake trigger (esp_err: {0})")]
    Ext0(i32),
}

/// ファームウェア更新チェックの結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate,
    /// 新イメージを書き込み済み。次回起動から有効になる。
    Applied { version: String },
}

/// 撮像ペリフェラル
pub trait CapturePeripheral {
    /// JPEG画像を1枚取得する。
    /// センサーリソースは成功・失敗を問わずこの呼び出し内で解放される。
    fn capture_image(&mut self) -> Result<Vec<u8>, CaptureError>;
}

/// ネットワークコネクタ
pub trait NetworkConnector {
    /// STAモードでの接続を試みる。試行回数は内部で制限され、
    /// 無期限にブロックしてはならない。
    ///
    /// `allow_interactive_setup` が真のとき、接続失敗後に設定ポータルへ
    /// フォールバックしてよい（ポータルも時間制限付き）。
    fn connect(&mut self, allow_interactive_setup: bool) -> LinkResult;

    /// スリープ前のリンク解放
    fn shutdown(&mut self);
}

/// 時刻ソース
pub trait Clock {
    /// 現在のepochミリ秒。時刻同期前は起動からの仮時刻に退化しうる。
    fn now_epoch_ms(&self) -> i64;

    /// ワンショットのネットワーク時刻同期。ベストエフォートであり、
    /// 失敗してもセッションは継続する。
    fn sync(&mut self) -> Result<(), TimeSyncError>;
}

/// リモートマネージャーとのセッション
///
/// `authenticate` と `discover` の両方が成功するまで他の操作を呼んでは
/// ならない。それ以外の順序保証は仮定しない。
pub trait ManagerSession {
    fn authenticate(&mut self, device_id: &str, device_password: &str)
        -> Result<(), ManagerError>;
    fn discover(&mut self) -> Result<(), ManagerError>;
    /// 撮影済み画像をアップロードし、サーバーのACK文字列を返す
    fn upload_artifact(&mut self, image: &[u8]) -> Result<String, ManagerError>;
    fn fetch_config(&mut self) -> Result<RemoteConfig, ManagerError>;
    fn report_status(&mut self, status: &DeviceStatus) -> Result<(), ManagerError>;
    fn check_and_apply_update(&mut self, current_version: &str)
        -> Result<UpdateOutcome, ManagerError>;
}

/// 起床トリガーのarmとスリープのコミット
pub trait WakeSleepControl {
    /// 外部トリガー起床源をarmする。スリープ前に毎セッション必ず呼ぶ。
    fn arm_external_trigger(&mut self) -> Result<(), SleepArmError>;

    /// ディープスリープに入る。`None` はトリガーのみで待つ。
    /// 実機ではこの呼び出しから戻らない。
    fn deep_sleep(&mut self, timer_duration_ms: Option<u64>);
}
