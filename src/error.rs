// Error taxonomy for the capture pipeline
//
// Every failure carries the step that produced it plus any native status
// code, so callers can report it without parsing prose.

use std::fmt;

/// Result alias used throughout the crate.
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Broad failure category. Drives the retry policy of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No window, monitor or output matches the request. Never retried.
    TargetResolution,
    /// Device, adapter, session or mapping failure, including frame waits
    /// that timed out (see [`CaptureError::is_timeout`]). Retried.
    Acquisition,
    /// Crop needs data the context lacks, or the crop is empty. Never retried.
    Geometry,
    /// Unknown identifiers, method/target mismatch, malformed buffers.
    Configuration,
    /// Encoding or persistence of the final image.
    Encoding,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TargetResolution => "target-resolution",
            Self::Acquisition => "acquisition",
            Self::Geometry => "geometry",
            Self::Configuration => "configuration",
            Self::Encoding => "encoding",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capture failure with its origin and optional native status codes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{step}: {message}{}", code_suffix(.hresult, .win32_error))]
pub struct CaptureError {
    kind: ErrorKind,
    message: String,
    step: &'static str,
    hresult: Option<u32>,
    win32_error: Option<u32>,
    timed_out: bool,
}

fn code_suffix(hresult: &Option<u32>, win32_error: &Option<u32>) -> String {
    let mut out = String::new();
    if let Some(hr) = hresult {
        out.push_str(&format!(" (hresult 0x{hr:08X})"));
    }
    if let Some(code) = win32_error {
        out.push_str(&format!(" (win32 error {code})"));
    }
    out
}

impl CaptureError {
    pub fn new(kind: ErrorKind, step: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            step,
            hresult: None,
            win32_error: None,
            timed_out: false,
        }
    }

    pub fn target(step: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TargetResolution, step, message)
    }

    pub fn acquisition(step: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Acquisition, step, message)
    }

    /// Acquisition error for a frame wait that ran out of time.
    pub fn timeout(step: &'static str, message: impl Into<String>) -> Self {
        Self::acquisition(step, message).timed_out()
    }

    pub fn geometry(step: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Geometry, step, message)
    }

    pub fn config(step: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, step, message)
    }

    pub fn encoding(step: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Encoding, step, message)
    }

    /// Build an error carrying the calling thread's last OS error
    /// (`GetLastError` on Windows). Must be called right after the failing API.
    pub fn last_os_error(kind: ErrorKind, step: &'static str, message: impl Into<String>) -> Self {
        let code = std::io::Error::last_os_error().raw_os_error();
        let mut out = Self::new(kind, step, message);
        out.win32_error = code.filter(|c| *c != 0).map(|c| c as u32);
        out
    }

    pub fn with_hresult(mut self, hresult: u32) -> Self {
        self.hresult = Some(hresult);
        self
    }

    pub fn with_win32_error(mut self, code: u32) -> Self {
        self.win32_error = Some(code);
        self
    }

    /// Mark as a timed-out frame wait.
    pub fn timed_out(mut self) -> Self {
        self.timed_out = true;
        self
    }

    /// Flatten an `anyhow` chain into a capture error, keeping any HRESULT
    /// found along the chain.
    pub fn from_anyhow(kind: ErrorKind, step: &'static str, err: anyhow::Error) -> Self {
        #[allow(unused_mut)]
        let mut out = Self::new(kind, step, format!("{err:#}"));
        #[cfg(windows)]
        {
            if let Some(win) = err
                .chain()
                .find_map(|e| e.downcast_ref::<windows::core::Error>())
            {
                out.hresult = Some(win.code().0 as u32);
            }
        }
        out
    }

    /// Wrap a native error, preserving its HRESULT.
    #[cfg(windows)]
    pub fn from_win(
        kind: ErrorKind,
        step: &'static str,
        message: impl Into<String>,
        err: &windows::core::Error,
    ) -> Self {
        let detail = err.message();
        let message = message.into();
        let message = if detail.is_empty() {
            message
        } else {
            format!("{message}: {detail}")
        };
        Self::new(kind, step, message).with_hresult(err.code().0 as u32)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Name of the function that failed.
    pub fn step(&self) -> &'static str {
        self.step
    }

    pub fn hresult(&self) -> Option<u32> {
        self.hresult
    }

    pub fn win32_error(&self) -> Option<u32> {
        self.win32_error
    }

    pub fn is_timeout(&self) -> bool {
        self.timed_out
    }

    /// Only acquisition failures stem from transient OS state.
    pub fn is_retryable(&self) -> bool {
        self.kind == ErrorKind::Acquisition
    }
}

/// Extension for converting native results at the backend seam.
#[cfg(windows)]
pub(crate) trait WinResultExt<T> {
    fn capture_err(self, kind: ErrorKind, step: &'static str, message: &str)
        -> CaptureResult<T>;
}

#[cfg(windows)]
impl<T> WinResultExt<T> for windows::core::Result<T> {
    fn capture_err(
        self,
        kind: ErrorKind,
        step: &'static str,
        message: &str,
    ) -> CaptureResult<T> {
        self.map_err(|e| CaptureError::from_win(kind, step, message, &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_step_and_codes() {
        let err = CaptureError::acquisition("acquire_frame", "AcquireNextFrame failed")
            .with_hresult(0x887A0027)
            .with_win32_error(5);
        let text = err.to_string();
        assert_eq!(
            text,
            "acquire_frame: AcquireNextFrame failed (hresult 0x887A0027) (win32 error 5)"
        );
    }

    #[test]
    fn test_retry_classification() {
        assert!(CaptureError::acquisition("s", "m").is_retryable());
        let timeout = CaptureError::timeout("s", "m");
        assert_eq!(timeout.kind(), ErrorKind::Acquisition);
        assert!(timeout.is_timeout() && timeout.is_retryable());
        assert!(!CaptureError::acquisition("s", "m").is_timeout());
        assert!(!CaptureError::geometry("s", "m").is_retryable());
        assert!(!CaptureError::target("s", "m").is_retryable());
        assert!(!CaptureError::config("s", "m").is_retryable());
        assert!(!CaptureError::encoding("s", "m").is_retryable());
    }

    #[test]
    fn test_from_anyhow_keeps_context_chain() {
        let inner = anyhow::anyhow!("Map failed").context("Failed to read staging texture");
        let err = CaptureError::from_anyhow(ErrorKind::Acquisition, "read_texture", inner);
        assert_eq!(err.kind(), ErrorKind::Acquisition);
        assert_eq!(err.step(), "read_texture");
        assert!(err.message().contains("Failed to read staging texture"));
        assert!(err.message().contains("Map failed"));
    }
}
