use log::info;

use crate::core::ports::{SleepArmError, WakeSleepControl};

/// Platform-agnostic deep-sleep abstraction.
pub trait DeepSleepPlatform {
    /// Arm the ext0 external wake trigger on the given RTC-capable GPIO.
    fn arm_ext0(&self, gpio: i32, level_high: bool) -> Result<(), SleepArmError>;

    /// Enter deep sleep. `None` waits for the armed trigger only.
    /// On hardware this call does not return.
    fn deep_sleep(&self, timer_duration_us: Option<u64>);
}

/// ESP-IDF specific deep sleep implementation.
pub struct EspIdfDeepSleep;

impl DeepSleepPlatform for EspIdfDeepSleep {
    fn arm_ext0(&self, gpio: i32, level_high: bool) -> Result<(), SleepArmError> {
        let level = i32::from(level_high);
        let err = unsafe { esp_idf_sys::esp_sleep_enable_ext0_wakeup(gpio, level) };
        if err != esp_idf_sys::ESP_OK {
            return Err(SleepArmError::Ext0(err));
        }
        Ok(())
    }

    fn deep_sleep(&self, timer_duration_us: Option<u64>) {
        unsafe {
            if let Some(us) = timer_duration_us {
                esp_idf_sys::esp_sleep_enable_timer_wakeup(us);
            }
            info!("---[STARTING DEEP SLEEP]---");
            esp_idf_sys::esp_deep_sleep_start();

            // 通常、ここは実行されない
            info!("esp_deep_sleep_start() から戻ってしまいました。OS再起動を実行します。");
            esp_idf_sys::esp_restart();
        }
    }
}

/// Deep sleep controller with platform abstraction.
///
/// セッション側の `WakeSleepControl` 実装。計画のミリ秒をマイクロ秒へ
/// 変換してプラットフォームに渡す。
pub struct DeepSleepController<P: DeepSleepPlatform> {
    platform: P,
    trigger_gpio: i32,
    trigger_level_high: bool,
}

impl<P: DeepSleepPlatform> DeepSleepController<P> {
    /// Create a new `DeepSleepController`.
    pub fn new(platform: P, trigger_gpio: i32, trigger_level_high: bool) -> Self {
        DeepSleepController {
            platform,
            trigger_gpio,
            trigger_level_high,
        }
    }
}

impl<P: DeepSleepPlatform> WakeSleepControl for DeepSleepController<P> {
    fn arm_external_trigger(&mut self) -> Result<(), SleepArmError> {
        info!(
            "外部トリガーをarmします (GPIO{}, level={})",
            self.trigger_gpio,
            if self.trigger_level_high { "High" } else { "Low" }
        );
        self.platform.arm_ext0(self.trigger_gpio, self.trigger_level_high)
    }

    fn deep_sleep(&mut self, timer_duration_ms: Option<u64>) {
        let timer_duration_us = timer_duration_ms.map(|ms| ms.saturating_mul(1_000));
        match timer_duration_us {
            Some(us) => info!("Entering deep sleep for {} microseconds", us),
            None => info!("Entering deep sleep until external trigger"),
        }
        self.platform.deep_sleep(timer_duration_us);
    }
}
