// Capture options and environment overrides

use std::time::Duration;

use crate::capture::policy::{CropSpec, DpiMode};

/// Default upper bound for one frame wait.
pub const DEFAULT_TIMEOUT_MS: u64 = 700;

pub const ENV_TIMEOUT_MS: &str = "SCREENCAP_TIMEOUT_MS";
pub const ENV_RETRY: &str = "SCREENCAP_RETRY";
pub const ENV_FORCE_ALPHA: &str = "SCREENCAP_FORCE_ALPHA";
pub const ENV_NO_IMPLICIT_CROP: &str = "SCREENCAP_NO_IMPLICIT_CROP";

/// Per-capture tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Frame wait bound for duplication and session backends.
    pub timeout: Duration,
    /// Extra attempts after the first failure (total attempts = retries + 1).
    pub retries: u32,
    pub crop: CropSpec,
    /// Set every alpha byte to 255 before cropping.
    pub force_opaque_alpha: bool,
    /// Frame `dxgi-window` captures to the window when no crop is requested.
    pub implicit_window_crop: bool,
    pub dpi_mode: DpiMode,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            retries: 0,
            crop: CropSpec::default(),
            force_opaque_alpha: false,
            implicit_window_crop: true,
            dpi_mode: DpiMode::default(),
        }
    }
}

impl CaptureOptions {
    /// Defaults with `SCREENCAP_*` environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides read through `lookup`. Unparseable values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(ms) = positive_u64(lookup(ENV_TIMEOUT_MS)) {
            self.timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = lookup(ENV_RETRY).and_then(|raw| raw.trim().parse::<u32>().ok()) {
            self.retries = retries;
        }
        if truthy(lookup(ENV_FORCE_ALPHA)) {
            self.force_opaque_alpha = true;
        }
        if truthy(lookup(ENV_NO_IMPLICIT_CROP)) {
            self.implicit_window_crop = false;
        }
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout = Duration::from_millis(ms);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn crop(mut self, crop: CropSpec) -> Self {
        self.crop = crop;
        self
    }

    pub fn force_opaque_alpha(mut self, on: bool) -> Self {
        self.force_opaque_alpha = on;
        self
    }

    pub fn implicit_window_crop(mut self, on: bool) -> Self {
        self.implicit_window_crop = on;
        self
    }

    pub fn dpi_mode(mut self, mode: DpiMode) -> Self {
        self.dpi_mode = mode;
        self
    }
}

/// `1`, `true`, `yes` or `on`, case-insensitive, trimmed.
fn truthy(raw: Option<String>) -> bool {
    raw.map(|raw| {
        let normalized = raw.trim().to_ascii_lowercase();
        matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
    })
    .unwrap_or(false)
}

fn positive_u64(raw: Option<String>) -> Option<u64> {
    raw.and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
}
