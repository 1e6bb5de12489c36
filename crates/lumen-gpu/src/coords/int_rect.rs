/// Integer rectangle in pixels (top-left origin, half-open `[left, right) x [top, bottom)`).
///
/// Field order matches the wire layout used by `GpuState::scissor_rect`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct IntRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl IntRect {
    #[inline]
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    /// All-zero rectangle.
    #[inline]
    pub const fn empty() -> Self {
        Self::new(0, 0, 0, 0)
    }

    #[inline]
    pub const fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    #[inline]
    pub const fn width(self) -> i32 {
        self.right - self.left
    }

    #[inline]
    pub const fn height(self) -> i32 {
        self.bottom - self.top
    }

    /// True when every member is zero.
    #[inline]
    pub fn is_empty(self) -> bool {
        self == Self::empty()
    }

    /// True when the rectangle covers at least one pixel.
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.width() > 0 && self.height() > 0
    }

    /// Half-open containment: [min, max).
    #[inline]
    pub const fn contains(self, x: i32, y: i32) -> bool {
        x >= self.left && y >= self.top && x < self.right && y < self.bottom
    }

    #[inline]
    pub fn intersect(self, other: IntRect) -> Option<IntRect> {
        let r = IntRect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        r.is_valid().then_some(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(l: i32, t: i32, rt: i32, b: i32) -> IntRect { IntRect::new(l, t, rt, b) }

    // ── size ──────────────────────────────────────────────────────────────

    #[test]
    fn width_and_height() {
        let rect = r(2, 3, 12, 8);
        assert_eq!(rect.width(), 10);
        assert_eq!(rect.height(), 5);
    }

    #[test]
    fn empty_is_all_zero() {
        assert!(IntRect::empty().is_empty());
        assert!(!r(0, 0, 1, 0).is_empty());
        assert!(!IntRect::empty().is_valid());
    }

    #[test]
    fn inverted_rect_is_not_valid() {
        assert!(!r(10, 10, 5, 20).is_valid());
    }

    // ── contains ──────────────────────────────────────────────────────────

    #[test]
    fn contains_top_left_inclusive() {
        assert!(r(0, 0, 10, 10).contains(0, 0));
    }

    #[test]
    fn contains_bottom_right_exclusive() {
        assert!(!r(0, 0, 10, 10).contains(10, 10));
        assert!(r(0, 0, 10, 10).contains(9, 9));
    }

    // ── intersect ─────────────────────────────────────────────────────────

    #[test]
    fn intersect_overlapping() {
        assert_eq!(r(0, 0, 10, 10).intersect(r(5, 5, 15, 15)), Some(r(5, 5, 10, 10)));
    }

    #[test]
    fn intersect_touching_edge_returns_none() {
        assert!(r(0, 0, 10, 10).intersect(r(10, 0, 20, 10)).is_none());
    }

    #[test]
    fn intersect_with_target_bounds_clamps() {
        let target = IntRect::from_size(4, 4);
        assert_eq!(r(-3, 2, 100, 3).intersect(target), Some(r(0, 2, 4, 3)));
    }
}
