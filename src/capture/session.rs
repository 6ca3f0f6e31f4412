// Single-frame session wait: frame callback → one-shot channel → caller
//
// The frame source raises frames on a thread it owns. The first frame is
// handed over a bounded channel; later ones are dropped. The caller waits
// with a timeout, and the session is closed on every path.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::time::Duration;

use tracing::debug;

use crate::error::{CaptureError, CaptureResult};

/// Sending half handed to a frame callback. First frame wins.
pub struct FrameSink<F> {
    tx: SyncSender<F>,
}

impl<F> Clone for FrameSink<F> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<F> FrameSink<F> {
    /// Offer a frame without blocking. Returns false when a frame was
    /// already delivered or the waiter is gone; the offered frame is dropped.
    pub fn offer(&self, frame: F) -> bool {
        self.tx.try_send(frame).is_ok()
    }
}

/// Bounded one-slot channel for a single frame.
pub fn frame_channel<F>() -> (FrameSink<F>, Receiver<F>) {
    let (tx, rx) = mpsc::sync_channel(1);
    (FrameSink { tx }, rx)
}

/// A capture session that delivers frames through a callback.
pub trait FrameSession {
    type Frame: Send + 'static;

    /// Register the callback and start producing frames into `sink`.
    fn start(&mut self, sink: FrameSink<Self::Frame>) -> CaptureResult<()>;

    /// Unregister the callback and release the session. Must be idempotent.
    fn close(&mut self);
}

/// Closes the wrapped session when dropped.
pub struct SessionGuard<S: FrameSession> {
    session: S,
}

impl<S: FrameSession> SessionGuard<S> {
    pub fn new(session: S) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &S {
        &self.session
    }
}

impl<S: FrameSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        self.session.close();
    }
}

/// Start `session`, wait up to `timeout` for its first frame and hand the
/// frame to `consume` while the session is still open.
///
/// The session is closed before this returns, whether the frame arrived,
/// the wait timed out or `consume` failed.
pub fn with_first_frame<S, T>(
    session: S,
    timeout: Duration,
    consume: impl FnOnce(&S, S::Frame) -> CaptureResult<T>,
) -> CaptureResult<T>
where
    S: FrameSession,
{
    let mut guard = SessionGuard::new(session);
    let (sink, rx) = frame_channel();
    guard.session.start(sink)?;

    let frame = match rx.recv_timeout(timeout) {
        Ok(frame) => frame,
        Err(RecvTimeoutError::Timeout) => {
            debug!(timeout_ms = timeout.as_millis() as u64, "no frame before timeout");
            return Err(CaptureError::timeout(
                "wait_first_frame",
                format!("no frame arrived within {} ms", timeout.as_millis()),
            ));
        }
        Err(RecvTimeoutError::Disconnected) => {
            return Err(CaptureError::timeout(
                "wait_first_frame",
                "frame source closed before delivering a frame",
            ));
        }
    };

    consume(guard.session(), frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    /// Simulated session counting how many sessions are open.
    struct FakeSession {
        open: Arc<AtomicUsize>,
        frames: Vec<u32>,
        closed: bool,
        held: Option<FrameSink<u32>>,
        workers: Vec<thread::JoinHandle<()>>,
    }

    impl FakeSession {
        fn new(open: &Arc<AtomicUsize>, frames: Vec<u32>) -> Self {
            Self {
                open: Arc::clone(open),
                frames,
                closed: false,
                held: None,
                workers: Vec::new(),
            }
        }
    }

    impl FrameSession for FakeSession {
        type Frame = u32;

        fn start(&mut self, sink: FrameSink<u32>) -> CaptureResult<()> {
            self.open.fetch_add(1, Ordering::SeqCst);
            let frames = std::mem::take(&mut self.frames);
            // A registered callback keeps its sink until close.
            self.held = Some(sink.clone());
            // Frames arrive on a foreign thread, like the real callback.
            self.workers.push(thread::spawn(move || {
                for f in frames {
                    sink.offer(f);
                }
            }));
            Ok(())
        }

        fn close(&mut self) {
            if !self.closed {
                self.closed = true;
                self.open.fetch_sub(1, Ordering::SeqCst);
            }
            self.held = None;
            for w in self.workers.drain(..) {
                let _ = w.join();
            }
        }
    }

    #[test]
    fn test_silent_session_times_out_and_closes() {
        let open = Arc::new(AtomicUsize::new(0));
        let session = FakeSession::new(&open, Vec::new());

        let err = with_first_frame(session, Duration::from_millis(30), |_, f| Ok(f)).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Acquisition);
        assert!(err.is_timeout() && err.is_retryable());
        assert_eq!(err.step(), "wait_first_frame");
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_first_frame_wins() {
        let open = Arc::new(AtomicUsize::new(0));
        let session = FakeSession::new(&open, vec![7, 8, 9]);

        let got = with_first_frame(session, Duration::from_secs(5), |s, f| {
            // Still open while consuming.
            assert!(!s.closed);
            Ok(f)
        })
        .unwrap();

        assert_eq!(got, 7);
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_consume_error_still_closes() {
        let open = Arc::new(AtomicUsize::new(0));
        let session = FakeSession::new(&open, vec![1]);

        let err = with_first_frame(session, Duration::from_secs(5), |_, _| -> CaptureResult<()> {
            Err(CaptureError::acquisition("map", "Map failed"))
        })
        .unwrap_err();

        assert_eq!(err.step(), "map");
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_sink_rejects_second_frame() {
        let (sink, rx) = frame_channel();
        assert!(sink.offer(1u8));
        assert!(!sink.offer(2u8));
        assert_eq!(rx.recv().unwrap(), 1);
    }
}
