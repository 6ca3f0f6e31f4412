//! # screencap
//!
//! Windows screen and window capture with three interchangeable backends:
//! GDI on-screen copy, DXGI desktop duplication and Windows.Graphics.Capture
//! sessions. Every capture yields a 32-bit BGRA buffer anchored in screen
//! coordinates, which is then optionally alpha-forced and cropped to a
//! window, client area, DWM frame or manual rectangle.
//!
//! ## Rust usage
//!
//! ```no_run
//! # #[cfg(windows)]
//! # fn main() -> screencap::error::CaptureResult<()> {
//! use screencap::capture::{CaptureMethod, WindowQuery};
//! use screencap::config::CaptureOptions;
//! use screencap::pipeline::native::{capture, CaptureRequest, TargetSpec};
//!
//! let request = CaptureRequest::new(
//!     CaptureMethod::WgcWindow,
//!     TargetSpec::Window(WindowQuery::default().title("notepad")),
//! )
//! .options(CaptureOptions::from_env().retries(2));
//!
//! let outcome = capture(&request)?;
//! println!("{}x{} in {} attempt(s)", outcome.image.width(), outcome.image.height(), outcome.attempts);
//! outcome.save("notepad.png", true)?;
//! # Ok(())
//! # }
//! # #[cfg(not(windows))]
//! # fn main() {}
//! ```
//!
//! The pipeline core (`pipeline::run_capture`) is platform-neutral and takes
//! any [`capture::BackendRegistry`], so the retry, crop and alpha logic runs
//! anywhere; the native backends only build on Windows.

pub mod capture;
pub mod config;
pub mod error;
pub mod geometry;
pub mod image;
pub mod pipeline;

#[cfg(windows)]
mod com;
#[cfg(windows)]
pub mod d3d11;

pub use error::{CaptureError, CaptureResult, ErrorKind};
pub use image::ImageBuffer;
pub use pipeline::CaptureOutcome;
