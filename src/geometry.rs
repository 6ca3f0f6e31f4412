// Screen-space rectangle math shared by every capture path

/// Rectangle in screen-space pixels, right/bottom exclusive.
///
/// A rectangle with `right <= left` or `bottom <= top` is "invalid" and
/// stands for "no region".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Build from an origin and a size. Saturates instead of overflowing.
    pub fn from_xywh(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self::new(x, y, x.saturating_add(w), y.saturating_add(h))
    }

    pub fn width(&self) -> i32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> i32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn is_valid(&self) -> bool {
        self.right > self.left && self.bottom > self.top
    }

    /// Edge-wise intersection. The result may be invalid.
    pub fn intersect(&self, other: &Rect) -> Rect {
        Rect {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        }
    }

    /// Whether `other` lies entirely within `self`.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.left >= self.left
            && other.top >= self.top
            && other.right <= self.right
            && other.bottom <= self.bottom
    }

    /// Grow (positive) or shrink (negative) each edge independently.
    pub fn padded(&self, pad: Pad) -> Rect {
        Rect {
            left: self.left.saturating_sub(pad.left),
            top: self.top.saturating_sub(pad.top),
            right: self.right.saturating_add(pad.right),
            bottom: self.bottom.saturating_add(pad.bottom),
        }
    }

    /// Area in pixels; zero for invalid rectangles.
    pub fn area(&self) -> i64 {
        if !self.is_valid() {
            return 0;
        }
        self.width() as i64 * self.height() as i64
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// Manual crop rectangle as supplied by a caller: origin plus size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CropRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl CropRect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn to_rect(self) -> Rect {
        Rect::from_xywh(self.x, self.y, self.w, self.h)
    }
}

impl From<Rect> for CropRect {
    fn from(r: Rect) -> Self {
        Self::new(r.left, r.top, r.width(), r.height())
    }
}

/// Per-edge padding. Negative values shrink the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pad {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Pad {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub const fn uniform(v: i32) -> Self {
        Self::new(v, v, v, v)
    }
}

#[cfg(windows)]
impl From<windows::Win32::Foundation::RECT> for Rect {
    fn from(r: windows::Win32::Foundation::RECT) -> Self {
        Rect::new(r.left, r.top, r.right, r.bottom)
    }
}
