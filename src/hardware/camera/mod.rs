use esp_idf_svc::hal::delay::FreeRtos;
use log::{info, warn};

use crate::core::ports::{CaptureError, CapturePeripheral};
use crate::hardware::pins::CameraPins;

/// AI Thinker ESP32-CAM 用カメラ設定
#[derive(Debug, Clone)]
pub struct AiThinkerCamConfig {
    /// フレームサイズ ("UXGA" / "SXGA" / "SVGA" / "VGA")
    pub frame_size: String,
    /// キャプチャ前に捨てるウォームアップフレーム数
    pub warmup_frames: Option<u8>,
}

impl Default for AiThinkerCamConfig {
    fn default() -> Self {
        Self {
            frame_size: "SXGA".to_string(),
            warmup_frames: None,
        }
    }
}

impl AiThinkerCamConfig {
    fn framesize(&self) -> esp_idf_sys::framesize_t {
        match self.frame_size.as_str() {
            "UXGA" => esp_idf_sys::framesize_t_FRAMESIZE_UXGA,
            "SXGA" => esp_idf_sys::framesize_t_FRAMESIZE_SXGA,
            "SVGA" => esp_idf_sys::framesize_t_FRAMESIZE_SVGA,
            "VGA" => esp_idf_sys::framesize_t_FRAMESIZE_VGA,
            other => {
                warn!("未知のフレームサイズ設定です: {}。SXGAを使用します", other);
                esp_idf_sys::framesize_t_FRAMESIZE_SXGA
            }
        }
    }
}

/// カメラ制御構造体
///
/// `esp-camera-rs` のカメラドライバを保持する。ドロップ時にドライバが
/// deinitされ、センサーリソースが解放される。
pub struct CameraController<'a> {
    camera: esp_camera_rs::Camera<'a>,
}

impl<'a> CameraController<'a> {
    /// カメラを初期化する
    pub fn new(pins: CameraPins, config: &AiThinkerCamConfig) -> Result<Self, CaptureError> {
        let camera = esp_camera_rs::Camera::new(
            pins.pwdn,
            pins.xclk,
            pins.d0,
            pins.d1,
            pins.d2,
            pins.d3,
            pins.d4,
            pins.d5,
            pins.d6,
            pins.d7,
            pins.vsync,
            pins.href,
            pins.pclk,
            pins.sda,
            pins.scl,
            esp_idf_sys::pixformat_t_PIXFORMAT_JPEG,
            config.framesize(),
        )
        .map_err(|e| CaptureError::Init(format!("{:?}", e)))?;

        Ok(CameraController { camera })
    }

    /// JPEG画像を1枚取得する
    pub fn capture_jpeg(&self, warmup_frames: Option<u8>) -> Result<Vec<u8>, CaptureError> {
        // カメラウォームアップ（設定回数分画像を捨てる）
        let warmup_count = warmup_frames.unwrap_or(0);
        for i in 0..warmup_count {
            let _ = self.camera.get_framebuffer();
            info!("ウォームアップキャプチャ {} / {}", i + 1, warmup_count);
            FreeRtos::delay_ms(100);
        }

        let frame_buffer = self
            .camera
            .get_framebuffer()
            .ok_or_else(|| CaptureError::Capture("no frame buffer available".to_string()))?;

        let image_data = frame_buffer.data().to_vec();
        if image_data.is_empty() {
            return Err(CaptureError::Capture("empty frame".to_string()));
        }
        Ok(image_data)
    }
}

/// セッションから使う撮像ペリフェラル
///
/// ピンはセッション開始時に一度だけ渡され、キャプチャのたびにカメラを
/// 初期化→撮影→解放する。ピンを消費するためキャプチャは1セッション
/// 1回のみ（スリープ境界で毎回作り直される前提）。
pub struct CameraUnit {
    pins: Option<CameraPins>,
    config: AiThinkerCamConfig,
}

impl CameraUnit {
    pub fn new(pins: CameraPins, config: AiThinkerCamConfig) -> Self {
        Self {
            pins: Some(pins),
            config,
        }
    }
}

impl CapturePeripheral for CameraUnit {
    fn capture_image(&mut self) -> Result<Vec<u8>, CaptureError> {
        let pins = self.pins.take().ok_or(CaptureError::SensorConsumed)?;

        info!("カメラを初期化しています (frame_size={})", self.config.frame_size);
        let controller = CameraController::new(pins, &self.config)?;

        FreeRtos::delay_ms(100); // カメラの安定化を待つ

        let result = controller.capture_jpeg(self.config.warmup_frames);
        if let Ok(ref image) = result {
            info!("画像キャプチャ完了: {} bytes", image.len());
        }

        // controller がここでドロップされ、成功・失敗を問わず
        // センサーがdeinitされる
        result
    }
}
