use log::{info, warn};

use crate::core::wake_reason::{TriggerLevel, WakeReason};

/// ハードウェアから今回の起動原因を読み取る
///
/// セッションの分岐（撮影の有無、ポータル許可）がこの値に依存するため、
/// 他の副作用より先に呼ぶこと。
pub fn read_wake_reason(trigger_level_high: bool) -> WakeReason {
    let cause = unsafe { esp_idf_sys::esp_sleep_get_wakeup_cause() };
    let reset_reason = unsafe { esp_idf_sys::esp_reset_reason() };

    let level = if trigger_level_high {
        TriggerLevel::High
    } else {
        TriggerLevel::Low
    };
    let reason = WakeReason::from_wakeup_cause(cause as u32, level);

    if reset_reason == esp_idf_sys::esp_reset_reason_t_ESP_RST_DEEPSLEEP {
        info!(
            "ディープスリープからの復帰を確認しました (cause={}, reason={})",
            cause, reason
        );
    } else {
        warn!(
            "非ディープスリープ起動です (reset_reason={}, reason={})",
            reset_reason, reason
        );
    }

    reason
}
