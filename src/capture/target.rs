// Capture target resolution: window query → WindowTarget, monitor token → MonitorTarget
//
// Selection runs over already-enumerated snapshots, so the ranking rules are
// the same on every platform; `enumerate` produces the snapshots on Windows.

use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use super::types::{MonitorTarget, WindowHandle, WindowTarget};
use crate::error::{CaptureError, CaptureResult};

// ---------------------------------------------------------------------------
// Window lookup
// ---------------------------------------------------------------------------

/// How to pick a top-level window.
///
/// `hwnd` wins over `foreground`, which wins over the filters. Filters are
/// combined with AND; an empty query matches every window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowQuery {
    pub hwnd: Option<WindowHandle>,
    pub foreground: bool,
    pub pid: Option<u32>,
    /// Case-insensitive substring of the window title.
    pub title: Option<String>,
    /// Exact window class name.
    pub class_name: Option<String>,
}

impl WindowQuery {
    pub fn by_handle(handle: WindowHandle) -> Self {
        Self {
            hwnd: Some(handle),
            ..Default::default()
        }
    }

    pub fn foreground() -> Self {
        Self {
            foreground: true,
            ..Default::default()
        }
    }

    pub fn pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    /// Whether `w` passes every filter that is set.
    pub fn matches(&self, w: &WindowTarget) -> bool {
        if self.pid.is_some_and(|pid| pid != w.pid) {
            return false;
        }
        if let Some(title) = &self.title {
            if !w.title.to_lowercase().contains(&title.to_lowercase()) {
                return false;
            }
        }
        if let Some(class_name) = &self.class_name {
            if &w.class_name != class_name {
                return false;
            }
        }
        true
    }
}

/// Pick the window described by `query` from an enumeration snapshot.
///
/// Filter matches are ranked by presentable (visible, not minimized, not
/// cloaked), then root window, then outer area. Ties keep enumeration order.
pub fn select_window(
    query: &WindowQuery,
    windows: &[WindowTarget],
    foreground: Option<WindowHandle>,
) -> CaptureResult<WindowTarget> {
    if let Some(handle) = query.hwnd {
        return windows
            .iter()
            .find(|w| w.handle == handle)
            .cloned()
            .ok_or_else(|| {
                CaptureError::target(
                    "select_window",
                    format!("window not found by handle 0x{:X}", handle.0),
                )
            });
    }

    if query.foreground {
        return foreground
            .and_then(|fg| windows.iter().find(|w| w.handle == fg))
            .cloned()
            .ok_or_else(|| CaptureError::target("select_window", "foreground window not found"));
    }

    let candidates: Vec<&WindowTarget> = windows.iter().filter(|w| query.matches(w)).collect();
    let count = candidates.len();
    let best = candidates
        .into_iter()
        .min_by_key(|w| Reverse(window_rank(w)))
        .ok_or_else(|| CaptureError::target("select_window", "no matching windows"))?;

    debug!(
        candidates = count,
        hwnd = format_args!("0x{:X}", best.handle.0),
        title = %best.title,
        "window selected by filters"
    );
    Ok(best.clone())
}

fn window_rank(w: &WindowTarget) -> (bool, bool, i64) {
    (w.is_presentable(), w.is_root, w.rect.area())
}

// ---------------------------------------------------------------------------
// Monitor lookup
// ---------------------------------------------------------------------------

/// Monitor token: `primary` or an enumeration index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorSelector {
    #[default]
    Primary,
    Index(usize),
}

impl FromStr for MonitorSelector {
    type Err = CaptureError;

    fn from_str(token: &str) -> CaptureResult<Self> {
        if token == "primary" {
            return Ok(Self::Primary);
        }
        token.parse::<usize>().map(Self::Index).map_err(|_| {
            CaptureError::config(
                "MonitorSelector::from_str",
                format!("monitor token '{token}' is neither 'primary' nor an index"),
            )
        })
    }
}

impl fmt::Display for MonitorSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Index(i) => write!(f, "{i}"),
        }
    }
}

/// Find a monitor by selector.
///
/// Indices follow system enumeration order; `0` is not necessarily the primary monitor.
pub fn find_monitor(selector: MonitorSelector, monitors: &[MonitorTarget]) -> CaptureResult<MonitorTarget> {
    let found = match selector {
        MonitorSelector::Primary => monitors.iter().find(|m| m.primary),
        MonitorSelector::Index(i) => monitors.iter().find(|m| m.index == i),
    };
    found.cloned().ok_or_else(|| {
        CaptureError::target(
            "find_monitor",
            format!("monitor not found: {selector} (found {})", monitors.len()),
        )
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::types::fixtures;
    use crate::error::ErrorKind;
    use crate::geometry::Rect;

    fn win(handle: isize, title: &str, class: &str, rect: Rect) -> WindowTarget {
        WindowTarget {
            handle: WindowHandle(handle),
            title: title.to_string(),
            class_name: class.to_string(),
            ..fixtures::window(rect)
        }
    }

    fn snapshot() -> Vec<WindowTarget> {
        let mut hidden = win(1, "Notepad hidden", "Notepad", Rect::new(0, 0, 3000, 2000));
        hidden.visible = false;
        let mut child = win(2, "Notepad child", "Notepad", Rect::new(0, 0, 2000, 1500));
        child.is_root = false;
        let small = win(3, "notepad small", "Notepad", Rect::new(0, 0, 300, 200));
        let large = win(4, "NOTEPAD large", "Notepad", Rect::new(0, 0, 800, 600));
        let other = win(5, "Calculator", "CalcFrame", Rect::new(0, 0, 400, 600));
        vec![hidden, child, small, large, other]
    }

    #[test]
    fn test_ranking_prefers_presentable_root_then_area() {
        let picked = select_window(&WindowQuery::default().title("notepad"), &snapshot(), None).unwrap();
        assert_eq!(picked.handle, WindowHandle(4));
    }

    #[test]
    fn test_ranking_falls_back_to_non_presentable() {
        let mut windows = snapshot();
        windows.retain(|w| w.handle.0 == 1 || w.handle.0 == 2);
        // Both fail one criterion; the child is presentable, so it wins.
        let picked = select_window(&WindowQuery::default(), &windows, None).unwrap();
        assert_eq!(picked.handle, WindowHandle(2));
    }

    #[test]
    fn test_filters_combine() {
        let q = WindowQuery::default().class_name("CalcFrame").title("calc");
        assert_eq!(select_window(&q, &snapshot(), None).unwrap().handle, WindowHandle(5));

        let q = WindowQuery::default().class_name("calcframe");
        let err = select_window(&q, &snapshot(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TargetResolution);
        assert_eq!(err.message(), "no matching windows");

        let q = WindowQuery::default().pid(7);
        assert!(select_window(&q, &snapshot(), None).is_err());
    }

    #[test]
    fn test_handle_and_foreground_take_precedence() {
        let q = WindowQuery::by_handle(WindowHandle(1)).title("Calculator");
        assert_eq!(select_window(&q, &snapshot(), None).unwrap().handle, WindowHandle(1));

        let q = WindowQuery::by_handle(WindowHandle(99));
        assert!(select_window(&q, &snapshot(), None).is_err());

        let q = WindowQuery::foreground();
        let picked = select_window(&q, &snapshot(), Some(WindowHandle(3))).unwrap();
        assert_eq!(picked.handle, WindowHandle(3));
        let err = select_window(&q, &snapshot(), None).unwrap_err();
        assert_eq!(err.message(), "foreground window not found");
    }

    #[test]
    fn test_monitor_tokens() {
        assert_eq!("primary".parse::<MonitorSelector>().unwrap(), MonitorSelector::Primary);
        assert_eq!("2".parse::<MonitorSelector>().unwrap(), MonitorSelector::Index(2));
        assert!("left".parse::<MonitorSelector>().is_err());
    }

    #[test]
    fn test_find_monitor() {
        // Primary flag is independent of index.
        let mut first = fixtures::monitor(0, Rect::new(0, 0, 1920, 1080));
        first.primary = false;
        let mut second = fixtures::monitor(1, Rect::new(1920, 0, 3840, 1080));
        second.primary = true;
        let monitors = vec![first, second];

        assert_eq!(find_monitor(MonitorSelector::Primary, &monitors).unwrap().index, 1);
        assert_eq!(find_monitor(MonitorSelector::Index(0), &monitors).unwrap().index, 0);
        let err = find_monitor(MonitorSelector::Index(5), &monitors).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TargetResolution);
    }
}
