use crate::{Contains, Point, Size};

/// A sorted rectangle with finite values. `right` and `bottom` are exclusive.
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub const ZERO: Self = Self {
        left: 0.0,
        top: 0.0,
        right: 0.0,
        bottom: 0.0,
    };

    #[must_use]
    pub fn new(origin: impl Into<Point>, size: impl Into<Size>) -> Self {
        (origin.into(), size.into()).into()
    }

    #[must_use]
    pub fn from_size(size: impl Into<Size>) -> Self {
        (Point::default(), size.into()).into()
    }

    pub fn is_empty(&self) -> bool {
        // Written as the negation of a non-empty rect, so that NaN values count as empty.
        !(self.left < self.right && self.top < self.bottom)
    }

    pub fn size(&self) -> Size {
        (self.right - self.left, self.bottom - self.top).into()
    }

    pub fn origin(&self) -> Point {
        (self.left, self.top).into()
    }

    pub fn joined(&self, other: impl Into<Self>) -> Self {
        let other = other.into();
        if other.is_empty() {
            return *self;
        }

        if self.is_empty() {
            return other;
        }

        (
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
            .into()
    }

    /// The point inside this rect that is closest to `p`.
    ///
    /// The exclusive right and bottom edges clamp to the last representable pixel row / column.
    pub fn closest_point(&self, p: Point) -> Point {
        let max_x = (self.right - 1.0).max(self.left);
        let max_y = (self.bottom - 1.0).max(self.top);
        Point::new(p.x.clamp(self.left, max_x), p.y.clamp(self.top, max_y))
    }
}

impl From<(f64, f64, f64, f64)> for Rect {
    fn from((left, top, right, bottom): (f64, f64, f64, f64)) -> Self {
        (Point::new(left, top), Point::new(right, bottom)).into()
    }
}

impl From<(Point, Size)> for Rect {
    fn from((origin, size): (Point, Size)) -> Self {
        let rb = origin + size;
        (origin, rb).into()
    }
}

impl From<(Point, Point)> for Rect {
    fn from((origin, end): (Point, Point)) -> Self {
        Self {
            left: origin.x,
            top: origin.y,
            right: end.x,
            bottom: end.y,
        }
    }
}

impl Contains<Point> for Rect {
    fn contains(&self, p: Point) -> bool {
        self.contains(&p)
    }
}

impl Contains<&Point> for Rect {
    fn contains(&self, p: &Point) -> bool {
        p.x >= self.left && p.x < self.right && p.y >= self.top && p.y < self.bottom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_excludes_far_edges() {
        let rect = Rect::new((10.0, 20.0), (100.0, 50.0));
        assert!(rect.contains(Point::new(10.0, 20.0)));
        assert!(rect.contains(Point::new(109.5, 69.5)));
        assert!(!rect.contains(Point::new(110.0, 30.0)));
        assert!(!rect.contains(Point::new(50.0, 70.0)));
    }

    #[test]
    fn closest_point_clamps_into_rect() {
        let rect = Rect::from_size((1920.0, 1080.0));
        assert_eq!(rect.closest_point((-5.0, 3.0).into()), Point::new(0.0, 3.0));
        assert_eq!(
            rect.closest_point((2500.0, 2000.0).into()),
            Point::new(1919.0, 1079.0)
        );
        assert_eq!(rect.closest_point((7.0, 8.0).into()), Point::new(7.0, 8.0));
    }

    #[test]
    fn joined_ignores_empty() {
        let a = Rect::new((0.0, 0.0), (10.0, 10.0));
        assert_eq!(a.joined(Rect::ZERO), a);
        assert_eq!(Rect::ZERO.joined(a), a);
        assert_eq!(
            a.joined(Rect::new((10.0, 0.0), (5.0, 20.0))),
            Rect::from((0.0, 0.0, 15.0, 20.0))
        );
    }
}
