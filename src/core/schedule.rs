use chrono::{DateTime, Timelike};
use chrono_tz::Tz;
use log::warn;
use serde::Deserialize;

const SECONDS_PER_DAY: u64 = 86_400;

/// 次回起床までのスリープ計画
///
/// セッションの唯一の成果物。コミット時にハードウェアの
/// wakeタイマー/トリガーレジスタへエンコードされる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SleepPlan {
    /// 固定時間 (ミリ秒) のスリープ
    FixedDuration(u64),
    /// 絶対時刻 (epochミリ秒) までのスリープ
    UntilAbsoluteTime(i64),
    /// タイマーと外部トリガーのうち先に発生した方で起床する
    UntilNextOfEvents {
        timer_ms: Option<u64>,
        external_trigger: bool,
    },
}

impl SleepPlan {
    /// コミット時点でwakeタイマーに設定するミリ秒。`None` はトリガーのみで待つ。
    ///
    /// 絶対時刻が過去に回り込んでいた場合は0ではなく即時タイマー最小値に
    /// 丸めず、残り0msとして返す（呼び出し側でフォールバック済みのはず）。
    pub fn timer_duration_ms(&self, now_epoch_ms: i64) -> Option<u64> {
        match self {
            SleepPlan::FixedDuration(ms) => Some(*ms),
            SleepPlan::UntilAbsoluteTime(target_ms) => {
                Some(target_ms.saturating_sub(now_epoch_ms).max(0) as u64)
            }
            SleepPlan::UntilNextOfEvents { timer_ms, .. } => *timer_ms,
        }
    }
}

/// マネージャーから取得するリモート設定
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteConfig {
    /// 次回起床の絶対時刻 (epochミリ秒)。省略可。
    #[serde(rename = "nextWakeupTimeMs")]
    pub next_wakeup_time_ms: Option<i64>,
}

/// 定時起床の目標時刻（ローカルタイムゾーン）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetTime {
    pub hour: u8,
    pub minute: u8,
}

/// スリープ計画ポリシー (cfg.toml 由来)
#[derive(Debug, Clone)]
pub struct SchedulePolicy {
    pub timezone: Tz,
    /// 定時起床。`None` で無効。
    pub target_time_of_day: Option<TargetTime>,
    /// リモート設定も定時起床も無い場合の既定スリープ
    pub default_sleep_ms: u64,
    /// 接続失敗などで早期終了した場合の短いフォールバック
    pub fallback_sleep_ms: u64,
}

/// 現在時刻とポリシーからスリープ計画を計算する純関数。副作用なし。
///
/// 優先順位:
/// 1. リモート設定の `nextWakeupTimeMs`（未来ならその時刻まで、
///    過去なら既定時間。0や負のスリープは決して返さない）
/// 2. 定時起床（ローカルタイムゾーンで次にその時刻を迎えるまで）
/// 3. 既定の固定時間
pub fn compute_sleep_plan(
    now_epoch_ms: i64,
    policy: &SchedulePolicy,
    remote: Option<&RemoteConfig>,
) -> SleepPlan {
    if let Some(config) = remote {
        if let Some(target_ms) = config.next_wakeup_time_ms {
            if target_ms > now_epoch_ms {
                return SleepPlan::UntilAbsoluteTime(target_ms);
            }
            warn!(
                "リモート設定の起床時刻が過去です ({} <= {})。既定時間にフォールバックします",
                target_ms, now_epoch_ms
            );
            return SleepPlan::FixedDuration(policy.default_sleep_ms);
        }
    }

    if let Some(target) = policy.target_time_of_day {
        if let Some(duration_ms) = duration_until_time_of_day(now_epoch_ms, policy.timezone, target)
        {
            return SleepPlan::FixedDuration(duration_ms);
        }
        warn!("ローカル時刻を解決できません。既定時間にフォールバックします");
    }

    SleepPlan::FixedDuration(policy.default_sleep_ms)
}

/// ローカルタイムゾーンで次に `target` の時刻を迎えるまでのミリ秒。
///
/// 現在時刻が目標より前なら `target - now`、そうでなければ日境界を
/// またいで `(1日 - now) + target`。現在時刻がちょうど目標と一致する
/// 場合は0ではなく丸一日。秒未満は切り捨て。
pub fn duration_until_time_of_day(
    now_epoch_ms: i64,
    tz: Tz,
    target: TargetTime,
) -> Option<u64> {
    let now_epoch_s = now_epoch_ms.div_euclid(1000);
    let local = DateTime::from_timestamp(now_epoch_s, 0)?.with_timezone(&tz);

    let now_s = u64::from(local.time().num_seconds_from_midnight());
    let target_s = u64::from(target.hour) * 3_600 + u64::from(target.minute) * 60;

    let remaining_s = if now_s < target_s {
        target_s - now_s
    } else {
        SECONDS_PER_DAY - now_s + target_s
    };

    Some(remaining_s * 1_000)
}
