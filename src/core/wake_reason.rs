use std::fmt;

// esp_sleep_source_t の生コード。ハードウェア読み取り側 (power::wake) と
// ホストテストの両方から参照するため、ここで定数として持つ。
pub const WAKEUP_CAUSE_UNDEFINED: u32 = 0;
pub const WAKEUP_CAUSE_EXT0: u32 = 2;
pub const WAKEUP_CAUSE_TIMER: u32 = 4;

/// 外部トリガーピンの起床レベル
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerLevel {
    Low,
    High,
}

/// 今回の起動原因
///
/// セッション開始時にハードウェアのwakeupレジスタから一度だけ復元され、
/// セッション中は不変。撮影の有無やポータルフォールバックの許可など、
/// セッションの分岐全てがこの値に依存する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// 電源投入・リセットによる起動（ディープスリープ復帰ではない）
    ColdBoot,
    /// スリープタイマー満了による復帰
    TimerExpired,
    /// 外部トリガー (PIR等のext0ピン) による復帰
    ExternalTrigger(TriggerLevel),
    /// 認識できないwakeupコード
    Unknown(u32),
}

impl WakeReason {
    /// `esp_sleep_get_wakeup_cause()` の生コードから起動原因を復元する。
    ///
    /// コード0 (UNDEFINED) はディープスリープ復帰ではない通常起動。
    /// ext0以外の未対応ソース (ext1, touchpad, ULP等) は `Unknown` に落とし、
    /// セッション側でタイマー起床と同等に扱う。
    pub fn from_wakeup_cause(cause: u32, trigger_level: TriggerLevel) -> Self {
        match cause {
            WAKEUP_CAUSE_UNDEFINED => WakeReason::ColdBoot,
            WAKEUP_CAUSE_EXT0 => WakeReason::ExternalTrigger(trigger_level),
            WAKEUP_CAUSE_TIMER => WakeReason::TimerExpired,
            other => WakeReason::Unknown(other),
        }
    }

    /// 外部トリガー起床かどうか
    pub fn is_external_trigger(&self) -> bool {
        matches!(self, WakeReason::ExternalTrigger(_))
    }
}

impl fmt::Display for WakeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WakeReason::ColdBoot => write!(f, "cold_boot"),
            WakeReason::TimerExpired => write!(f, "timer"),
            WakeReason::ExternalTrigger(TriggerLevel::Low) => write!(f, "ext_trigger_low"),
            WakeReason::ExternalTrigger(TriggerLevel::High) => write!(f, "ext_trigger_high"),
            WakeReason::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}
