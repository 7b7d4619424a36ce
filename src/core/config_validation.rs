use crate::core::schedule::TargetTime;

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    MissingDeviceId,
    MissingDevicePassword,
    MissingManagerBaseUrl,
    InvalidManagerBaseUrl(String),
    InvalidTargetWakeupHour(u8),
    InvalidTargetWakeupMinute(u8),
    InvalidCameraWarmupFrames(u8),
    InvalidTriggerWakeupPin(i32),
    InvalidSleepDuration(u64),
}

pub fn validate_device_id(device_id: &str) -> Result<(), ValidationError> {
    if device_id.is_empty() {
        Err(ValidationError::MissingDeviceId)
    } else {
        Ok(())
    }
}

pub fn validate_device_password(device_password: &str) -> Result<(), ValidationError> {
    if device_password.is_empty() || device_password == "CHANGE_ME" {
        Err(ValidationError::MissingDevicePassword)
    } else {
        Ok(())
    }
}

/// マネージャーのベースURLを検証し、末尾のスラッシュを落として返す
pub fn parse_manager_base_url(base_url: &str) -> Result<String, ValidationError> {
    if base_url.is_empty() {
        return Err(ValidationError::MissingManagerBaseUrl);
    }
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ValidationError::InvalidManagerBaseUrl(base_url.to_string()));
    }
    Ok(base_url.trim_end_matches('/').to_string())
}

/// 定時起床の時・分。どちらも255で無効化。
pub fn parse_target_wakeup_time(hour: u8, minute: u8) -> Result<Option<TargetTime>, ValidationError> {
    if hour == 255 {
        return Ok(None);
    }
    if hour > 23 {
        return Err(ValidationError::InvalidTargetWakeupHour(hour));
    }
    if minute > 59 {
        return Err(ValidationError::InvalidTargetWakeupMinute(minute));
    }
    Ok(Some(TargetTime { hour, minute }))
}

pub fn parse_camera_warmup_frames(value: u8) -> Result<Option<u8>, ValidationError> {
    if !(value <= 10 || value == 255) {
        return Err(ValidationError::InvalidCameraWarmupFrames(value));
    }

    if value == 255 {
        Ok(None)
    } else {
        Ok(Some(value))
    }
}

/// ext0起床に使えるのはRTC対応GPIOのみ (ESP32: 0,2,4,12-15,25-27,32-39)
pub fn validate_trigger_wakeup_pin(pin: i32) -> Result<(), ValidationError> {
    const RTC_CAPABLE: [i32; 18] = [
        0, 2, 4, 12, 13, 14, 15, 25, 26, 27, 32, 33, 34, 35, 36, 37, 38, 39,
    ];
    if RTC_CAPABLE.contains(&pin) {
        Ok(())
    } else {
        Err(ValidationError::InvalidTriggerWakeupPin(pin))
    }
}

pub fn validate_sleep_duration_seconds(seconds: u64) -> Result<(), ValidationError> {
    if seconds == 0 {
        Err(ValidationError::InvalidSleepDuration(seconds))
    } else {
        Ok(())
    }
}
