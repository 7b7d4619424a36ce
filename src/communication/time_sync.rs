use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::sntp::{EspSntp, SyncStatus};
use log::info;

use crate::core::ports::{Clock, TimeSyncError};

/// システム時計とワンショットSNTP同期
///
/// ディープスリープ中はRTCのみが進むため、時刻同期前の `now_epoch_ms` は
/// 退化した値になりうる。セッションはそれを許容して継続する。
pub struct EspClock {
    sync_timeout: Duration,
}

impl EspClock {
    pub fn new(sync_timeout: Duration) -> Self {
        Self { sync_timeout }
    }
}

impl Clock for EspClock {
    fn now_epoch_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    fn sync(&mut self) -> Result<(), TimeSyncError> {
        info!("SNTPで時刻同期を開始します");
        let sntp = EspSntp::new_default().map_err(|e| TimeSyncError::Init(e.to_string()))?;

        let deadline = Instant::now() + self.sync_timeout;
        while sntp.get_sync_status() != SyncStatus::Completed {
            if Instant::now() >= deadline {
                return Err(TimeSyncError::Timeout);
            }
            FreeRtos::delay_ms(100);
        }

        // sntp はここでドロップされ、サービスが停止する（ワンショット）
        info!("System time synchronized: {}", chrono::Utc::now());
        Ok(())
    }
}
