use log::{error, info, warn};

use crate::core::ports::{
    CapturePeripheral, Clock, LinkResult, ManagerSession, NetworkConnector, UpdateOutcome,
    WakeSleepControl,
};
use crate::core::schedule::{compute_sleep_plan, SchedulePolicy, SleepPlan};
use crate::core::status::DeviceStatus;
use crate::core::wake_reason::WakeReason;

/// デバイス識別情報
///
/// 設定ローダーから渡される不透明な文字列。セッション中は不変。
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    pub device_id: String,
    pub device_password: String,
}

/// 1セッション分のコンテキスト
///
/// 起床ごとに新規構築され、スリープと共に破棄される。プロセスを
/// またいで生き残る状態はハードウェアのwakeレジスタとNVSのみ。
pub struct SessionContext {
    pub identity: DeviceIdentity,
    pub wake_reason: WakeReason,
    /// 起床直後に取得したepoch秒。時刻同期前の値なので退化しうる。
    pub wake_epoch_s: i64,
    pub image: Option<Vec<u8>>,
    /// キャプチャ失敗などの劣化をステータス報告に載せるメッセージ
    pub degraded_message: Option<String>,
}

impl SessionContext {
    pub fn new(identity: DeviceIdentity, wake_reason: WakeReason, wake_epoch_s: i64) -> Self {
        Self {
            identity,
            wake_reason,
            wake_epoch_s,
            image: None,
            degraded_message: None,
        }
    }
}

/// 起床から次のスリープまでの1セッションを実行する。
///
/// 全ての経路が `seal_session` （トリガーarm + スリープコミット）で終端
/// する。戻り値はコミットした計画で、実機では `deep_sleep` から戻らない
/// ため到達しない。セッション内に再試行ループは持たず、再試行は
/// コネクタ側の回数制限に委ねる。
#[allow(clippy::too_many_arguments)]
pub fn run_session<Cam, Net, Clk, Mgr, Slp>(
    identity: DeviceIdentity,
    firmware_version: &str,
    policy: &SchedulePolicy,
    wake_reason: WakeReason,
    camera: &mut Cam,
    network: &mut Net,
    clock: &mut Clk,
    manager: &mut Mgr,
    sleep: &mut Slp,
) -> SleepPlan
where
    Cam: CapturePeripheral,
    Net: NetworkConnector,
    Clk: Clock,
    Mgr: ManagerSession,
    Slp: WakeSleepControl,
{
    let mut ctx = SessionContext::new(identity, wake_reason, clock.now_epoch_ms() / 1000);
    info!("セッション開始: wake_reason={}", ctx.wake_reason);

    // 外部トリガー起床はネットワーク確立より先に撮影する。
    // 失敗しても画像なしで継続し、ステータス報告に劣化を載せる。
    if ctx.wake_reason.is_external_trigger() {
        match camera.capture_image() {
            Ok(image) => {
                info!("画像キャプチャ完了: {} bytes", image.len());
                ctx.image = Some(image);
            }
            Err(e) => {
                error!("画像キャプチャに失敗。画像なしで継続します: {}", e);
                ctx.degraded_message = Some(format!("capture failed: {}", e));
            }
        }
    }

    // 外部トリガー起床では対話的な設定ポータルに入らない
    let allow_portal = !ctx.wake_reason.is_external_trigger();
    match network.connect(allow_portal) {
        LinkResult::Connected { ip } => info!("ネットワーク接続完了: {}", ip),
        LinkResult::Failed { cause } => {
            error!(
                "ネットワーク接続に失敗: {}。フォールバックスリープに移行します",
                cause
            );
            return seal_session(
                network,
                sleep,
                clock.now_epoch_ms(),
                policy.fallback_sleep_ms,
                SleepPlan::FixedDuration(policy.fallback_sleep_ms),
            );
        }
    }

    // 時刻同期はベストエフォート。失敗するとタイムスタンプ系の
    // フィールドが退化するだけでセッションは継続する。
    if let Err(e) = clock.sync() {
        warn!("時刻同期に失敗: {}", e);
    }

    // 認証とエンドポイント解決は全リモート操作の前提。ここで失敗した
    // デバイスを平然と眠らせるとサイレント障害になるため、短い
    // フォールバックで再試行機会を確保する。
    if let Err(e) = manager
        .authenticate(&ctx.identity.device_id, &ctx.identity.device_password)
        .and_then(|()| manager.discover())
    {
        error!("マネージャーセッションの確立に失敗: {}", e);
        return seal_session(
            network,
            sleep,
            clock.now_epoch_ms(),
            policy.fallback_sleep_ms,
            SleepPlan::FixedDuration(policy.fallback_sleep_ms),
        );
    }
    info!("マネージャー認証・エンドポイント解決が完了しました");

    // 以降の各アクションは個別に失敗を隔離し、残りのアクションを続ける
    if let Some(image) = ctx.image.take() {
        match manager.upload_artifact(&image) {
            Ok(ack) => info!("画像アップロード完了: {}", ack),
            Err(e) => error!("画像アップロードに失敗。継続します: {}", e),
        }
    }

    if !ctx.wake_reason.is_external_trigger() {
        match manager.check_and_apply_update(firmware_version) {
            Ok(UpdateOutcome::UpToDate) => info!("ファームウェアは最新です"),
            Ok(UpdateOutcome::Applied { version }) => {
                info!(
                    "ファームウェア {} を書き込みました。次回起動から有効になります",
                    version
                );
            }
            Err(e) => error!("ファームウェア更新チェックに失敗。継続します: {}", e),
        }
    }

    let remote_config = match manager.fetch_config() {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("リモート設定の取得に失敗。ローカルポリシーを使用します: {}", e);
            None
        }
    };

    let status = DeviceStatus::sleeping(
        ctx.wake_epoch_s,
        ctx.wake_reason.to_string(),
        firmware_version,
        ctx.degraded_message.clone(),
    );
    if let Err(e) = manager.report_status(&status) {
        error!("ステータス報告に失敗。継続します: {}", e);
    }

    let now_epoch_ms = clock.now_epoch_ms();
    let plan = compute_sleep_plan(now_epoch_ms, policy, remote_config.as_ref());
    seal_session(network, sleep, now_epoch_ms, policy.fallback_sleep_ms, plan)
}

/// セッションの唯一の終端
///
/// どの分岐から来ても、リンクを解放し、外部トリガーを必ずarmしてから
/// 計画をコミットする。トリガーのarmに失敗しタイマーも無い場合は、
/// 永久スリープを避けるためフォールバックタイマーを強制する。
fn seal_session<Net, Slp>(
    network: &mut Net,
    sleep: &mut Slp,
    now_epoch_ms: i64,
    fallback_sleep_ms: u64,
    plan: SleepPlan,
) -> SleepPlan
where
    Net: NetworkConnector,
    Slp: WakeSleepControl,
{
    network.shutdown();

    let trigger_armed = match sleep.arm_external_trigger() {
        Ok(()) => true,
        Err(e) => {
            error!("外部トリガーのarmに失敗: {}", e);
            false
        }
    };

    let mut timer_ms = plan.timer_duration_ms(now_epoch_ms);
    if timer_ms.is_none() && !trigger_armed {
        error!("起床手段がありません。フォールバックタイマーを強制します");
        timer_ms = Some(fallback_sleep_ms);
    }

    match timer_ms {
        Some(ms) => info!("ディープスリープに入ります: timer={}ms", ms),
        None => info!("ディープスリープに入ります: 外部トリガー待ちのみ"),
    }
    sleep.deep_sleep(timer_ms);
    plan
}
