use std::fmt;

use crate::error::{CaptureError, CaptureResult};
use crate::geometry::{CropRect, Pad};

/// Which rectangle bounds the final output.
///
/// - `None`: keep everything the backend delivered.
/// - `Window`: outer window rectangle, chrome and shadow included.
/// - `Client`: client area only.
/// - `DwmFrame`: DWM extended frame bounds (visible frame, shadow excluded).
/// - `Manual`: an explicit screen-space rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CropMode {
    #[default]
    None,
    Window,
    Client,
    DwmFrame,
    Manual(CropRect),
}

impl CropMode {
    /// Parse from a mode name ("none", "window", "client", "dwm-frame", "manual").
    ///
    /// `manual` needs `rect`; the other modes ignore it.
    pub fn from_name(name: &str, rect: Option<CropRect>) -> CaptureResult<Self> {
        match name {
            "none" => Ok(Self::None),
            "window" => Ok(Self::Window),
            "client" => Ok(Self::Client),
            "dwm-frame" => Ok(Self::DwmFrame),
            "manual" => rect.map(Self::Manual).ok_or_else(|| {
                CaptureError::geometry("CropMode::from_name", "manual crop missing rect")
            }),
            _ => Err(CaptureError::config(
                "CropMode::from_name",
                format!("unknown crop mode '{name}'"),
            )),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Window => "window",
            Self::Client => "client",
            Self::DwmFrame => "dwm-frame",
            Self::Manual(_) => "manual",
        }
    }

    /// Modes resolved from window metadata.
    pub fn needs_window(&self) -> bool {
        matches!(self, Self::Window | Self::Client | Self::DwmFrame)
    }
}

impl fmt::Display for CropMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Crop mode plus per-edge padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CropSpec {
    pub mode: CropMode,
    pub pad: Pad,
}

impl CropSpec {
    pub fn new(mode: CropMode, pad: Pad) -> Self {
        Self { mode, pad }
    }
}

/// Process DPI awareness requested before enumerating geometry.
///
/// - `Auto` / `PerMonitorV2`: per-monitor v2, falling back to system awareness.
/// - `System`: system-wide awareness only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DpiMode {
    Auto,
    #[default]
    PerMonitorV2,
    System,
}

impl DpiMode {
    /// Parse from a mode string ("auto", "per-monitor-v2", "system").
    pub fn from_mode(mode: &str) -> Option<Self> {
        match mode {
            "auto" => Some(Self::Auto),
            "per-monitor-v2" => Some(Self::PerMonitorV2),
            "system" => Some(Self::System),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::PerMonitorV2 => "per-monitor-v2",
            Self::System => "system",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_crop_mode_names_round_trip() {
        let rect = CropRect::new(1, 2, 3, 4);
        for mode in [
            CropMode::None,
            CropMode::Window,
            CropMode::Client,
            CropMode::DwmFrame,
            CropMode::Manual(rect),
        ] {
            assert_eq!(CropMode::from_name(mode.name(), Some(rect)).unwrap(), mode);
        }
    }

    #[test]
    fn test_window_modes_need_window() {
        assert!(CropMode::Window.needs_window());
        assert!(CropMode::Client.needs_window());
        assert!(CropMode::DwmFrame.needs_window());
        assert!(!CropMode::None.needs_window());
        assert!(!CropMode::Manual(CropRect::new(0, 0, 1, 1)).needs_window());
    }

    #[test]
    fn test_manual_requires_rect() {
        let err = CropMode::from_name("manual", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Geometry);
        assert_eq!(err.message(), "manual crop missing rect");
    }

    #[test]
    fn test_unknown_crop_mode() {
        let err = CropMode::from_name("dwm", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_dpi_mode_parse() {
        assert_eq!(DpiMode::from_mode("system"), Some(DpiMode::System));
        assert_eq!(DpiMode::from_mode("per-monitor-v2"), Some(DpiMode::PerMonitorV2));
        assert_eq!(DpiMode::from_mode("pmv2"), None);
        assert_eq!(DpiMode::default().name(), "per-monitor-v2");
    }
}
