// COM apartment for the capturing thread

use anyhow::{Context, Result};
use windows::Win32::Foundation::RPC_E_CHANGED_MODE;
use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_MULTITHREADED};

/// Joins the multithreaded apartment for the guard's lifetime.
///
/// A thread already in a single-threaded apartment is left as is and not
/// uninitialized on drop.
pub(crate) struct ApartmentGuard {
    should_uninit: bool,
}

impl ApartmentGuard {
    pub fn enter_multithreaded() -> Result<Self> {
        // SAFETY: paired with CoUninitialize in Drop only when this call succeeded.
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        if hr == RPC_E_CHANGED_MODE {
            tracing::debug!("thread already in a single-threaded apartment");
            return Ok(Self {
                should_uninit: false,
            });
        }

        hr.ok()
            .context("CoInitializeEx(COINIT_MULTITHREADED) failed")?;
        Ok(Self {
            should_uninit: true,
        })
    }
}

impl Drop for ApartmentGuard {
    fn drop(&mut self) {
        if self.should_uninit {
            unsafe {
                CoUninitialize();
            }
        }
    }
}
