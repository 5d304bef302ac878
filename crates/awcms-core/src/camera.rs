//! Camera settings and the driver boundary
//!
//! The JPEG camera driver is platform code. The core only decides how to
//! configure it from the board [`Capabilities`] and reports its status.

use alloc::vec::Vec;

use thiserror_no_std::Error;

use crate::config::Capabilities;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraError {
    #[error("Camera not initialized")]
    NotInitialized,
    #[error("Camera capture failed")]
    CaptureFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSize {
    /// 320x240
    Qvga,
    /// 640x480
    Vga,
}

impl FrameSize {
    /// Index in the driver's frame size table, reported as `resolution`
    pub const fn driver_index(self) -> u8 {
        match self {
            Self::Qvga => 5,
            Self::Vga => 8,
        }
    }

    pub const fn dimensions(self) -> (u16, u16) {
        match self {
            Self::Qvga => (320, 240),
            Self::Vga => (640, 480),
        }
    }
}

/// Driver settings chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraSettings {
    pub frame_size: FrameSize,
    /// JPEG quality, lower is better (0-63)
    pub jpeg_quality: u8,
    pub frame_buffers: u8,
}

impl CameraSettings {
    /// PSRAM boards can hold two VGA frames, the rest get one QVGA buffer.
    pub const fn for_capabilities(capabilities: &Capabilities) -> Self {
        if capabilities.psram {
            Self {
                frame_size: FrameSize::Vga,
                jpeg_quality: 10,
                frame_buffers: 2,
            }
        } else {
            Self {
                frame_size: FrameSize::Qvga,
                jpeg_quality: 12,
                frame_buffers: 1,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraStatus {
    pub initialized: bool,
    pub psram: bool,
    pub settings: CameraSettings,
}

/// One captured JPEG frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub jpeg: Vec<u8>,
    pub width: u16,
    pub height: u16,
}

/// A JPEG camera.
pub trait Camera {
    fn status(&self) -> CameraStatus;

    fn capture(&mut self) -> Result<Frame, CameraError>;
}

/// Stand-in for boards without a camera module, or whose driver failed to
/// initialize.
#[derive(Debug, Clone, Copy)]
pub struct NoCamera {
    capabilities: Capabilities,
}

impl NoCamera {
    pub const fn new(capabilities: Capabilities) -> Self {
        Self { capabilities }
    }
}

impl Camera for NoCamera {
    fn status(&self) -> CameraStatus {
        CameraStatus {
            initialized: false,
            psram: self.capabilities.psram,
            settings: CameraSettings::for_capabilities(&self.capabilities),
        }
    }

    fn capture(&mut self) -> Result<Frame, CameraError> {
        Err(CameraError::NotInitialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_psram_selects_vga() {
        let settings = CameraSettings::for_capabilities(&Capabilities {
            psram: true,
            debug_mode: false,
        });
        assert_eq!(settings.frame_size, FrameSize::Vga);
        assert_eq!(settings.jpeg_quality, 10);
        assert_eq!(settings.frame_buffers, 2);
        assert_eq!(settings.frame_size.driver_index(), 8);
    }

    #[test]
    fn test_without_psram_selects_qvga() {
        let settings = CameraSettings::for_capabilities(&Capabilities::default());
        assert_eq!(settings.frame_size, FrameSize::Qvga);
        assert_eq!(settings.jpeg_quality, 12);
        assert_eq!(settings.frame_buffers, 1);
        assert_eq!(settings.frame_size.driver_index(), 5);
    }

    #[test]
    fn test_no_camera() {
        let mut camera = NoCamera::new(Capabilities::default());
        assert!(!camera.status().initialized);
        assert_eq!(camera.capture(), Err(CameraError::NotInitialized));
    }
}
