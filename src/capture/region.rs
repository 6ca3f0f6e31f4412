// Region resolver: crop mode + available rectangles → validated crop rectangle

use super::policy::CropMode;
use super::types::WindowTarget;
use crate::error::{CaptureError, CaptureResult};
use crate::geometry::{Pad, Rect};

/// Compute the screen-space rectangle to keep from a capture.
///
/// The base rectangle is chosen by `mode`, grown or shrunk edge by edge with
/// `pad`, then clipped to `captured` (the area the backend actually
/// delivered), so the crop can never ask for pixels that were not captured.
pub fn resolve_crop_rect(
    mode: &CropMode,
    window: Option<&WindowTarget>,
    captured: Rect,
    pad: Pad,
) -> CaptureResult<Rect> {
    let base = match mode {
        CropMode::None => captured,
        CropMode::Window => require_window(mode, window)?.rect,
        CropMode::Client => require_window(mode, window)?.client_rect,
        CropMode::DwmFrame => require_window(mode, window)?.frame_rect,
        CropMode::Manual(rect) => rect.to_rect(),
    };

    let clipped = base.padded(pad).intersect(&captured);
    if !clipped.is_valid() {
        return Err(CaptureError::geometry(
            "resolve_crop_rect",
            format!("crop rect is empty after intersection (base {base}, captured {captured})"),
        ));
    }
    Ok(clipped)
}

fn require_window<'a>(
    mode: &CropMode,
    window: Option<&'a WindowTarget>,
) -> CaptureResult<&'a WindowTarget> {
    window.ok_or_else(|| {
        CaptureError::geometry(
            "resolve_crop_rect",
            format!("crop {mode} requested but no window target"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::types::fixtures;
    use crate::error::ErrorKind;
    use crate::geometry::CropRect;

    const CAPTURED: Rect = Rect::new(0, 0, 1000, 800);

    #[test]
    fn test_manual_crop_is_clipped_to_capture() {
        let mode = CropMode::Manual(CropRect::new(900, 0, 200, 50));
        let r = resolve_crop_rect(&mode, None, CAPTURED, Pad::default()).unwrap();
        assert_eq!(r, Rect::new(900, 0, 1000, 50));
    }

    #[test]
    fn test_client_padding_narrows_and_widens() {
        let mut win = fixtures::window(Rect::new(92, 69, 508, 408));
        win.client_rect = Rect::new(100, 100, 500, 400);
        let r = resolve_crop_rect(
            &CropMode::Client,
            Some(&win),
            CAPTURED,
            Pad::new(10, 10, -10, -10),
        )
        .unwrap();
        assert_eq!(r, Rect::new(90, 90, 490, 390));
    }

    #[test]
    fn test_none_returns_capture() {
        let r = resolve_crop_rect(&CropMode::None, None, CAPTURED, Pad::default()).unwrap();
        assert_eq!(r, CAPTURED);

        // Padding can shrink the full capture too.
        let r = resolve_crop_rect(&CropMode::None, None, CAPTURED, Pad::uniform(-5)).unwrap();
        assert_eq!(r, Rect::new(5, 5, 995, 795));
    }

    #[test]
    fn test_window_modes_pick_their_rect() {
        let win = fixtures::window(Rect::new(100, 100, 600, 500));
        let pick = |mode| resolve_crop_rect(&mode, Some(&win), CAPTURED, Pad::default()).unwrap();
        assert_eq!(pick(CropMode::Window), win.rect);
        assert_eq!(pick(CropMode::Client), win.client_rect);
        assert_eq!(pick(CropMode::DwmFrame), win.frame_rect);
    }

    #[test]
    fn test_window_modes_need_window() {
        for mode in [CropMode::Window, CropMode::Client, CropMode::DwmFrame] {
            let err = resolve_crop_rect(&mode, None, CAPTURED, Pad::default()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Geometry);
            assert!(err.message().contains("no window target"), "{err}");
        }
    }

    #[test]
    fn test_window_outside_capture_is_empty() {
        // Window lives on a second monitor to the right of the captured one.
        let win = fixtures::window(Rect::new(1200, 100, 1600, 500));
        let err = resolve_crop_rect(&CropMode::Window, Some(&win), CAPTURED, Pad::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Geometry);
    }

    #[test]
    fn test_negative_padding_can_collapse_region() {
        let mode = CropMode::Manual(CropRect::new(100, 100, 20, 20));
        let err = resolve_crop_rect(&mode, None, CAPTURED, Pad::uniform(-10)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Geometry);
    }

    #[test]
    fn test_result_always_inside_capture() {
        let win = fixtures::window(Rect::new(-50, 700, 300, 900));
        let pads = [Pad::default(), Pad::uniform(40), Pad::new(-5, 100, 3, -2)];
        for pad in pads {
            for mode in [CropMode::Window, CropMode::Client, CropMode::DwmFrame, CropMode::None] {
                if let Ok(r) = resolve_crop_rect(&mode, Some(&win), CAPTURED, pad) {
                    assert!(CAPTURED.contains_rect(&r), "{mode} {pad:?} -> {r}");
                }
            }
        }
    }
}
