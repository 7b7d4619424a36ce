/// ハードウェア制御モジュール
pub mod camera;
pub mod pins;

pub use camera::{CameraController, CameraUnit};
pub use pins::CameraPins;
