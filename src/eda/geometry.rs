//! Integer grid geometry: points, rectangles and orthogonal lines.
//!
//! Rectangles are in grid form: a rect at `(x, y)` with size `(w, h)` spans
//! the closed region from `(x, y)` to `(x + w, y + h)`, so adjacent
//! rectangles share their boundary coordinates.

use serde::{Deserialize, Serialize};

#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize,
)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self { x: self.x + dx, y: self.y + dy }
    }

    pub fn manhattan_distance(self, other: Point) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

/// Which side of a rectangle or tile.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Edge {
    Top,
    Bottom,
    Left,
    Right,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn from_corners(top_left: Point, bottom_right: Point) -> Self {
        Self {
            x: top_left.x,
            y: top_left.y,
            w: bottom_right.x - top_left.x,
            h: bottom_right.y - top_left.y,
        }
    }

    pub const fn left(&self) -> i32 {
        self.x
    }
    pub const fn right(&self) -> i32 {
        self.x + self.w
    }
    pub const fn top(&self) -> i32 {
        self.y
    }
    pub const fn bottom(&self) -> i32 {
        self.y + self.h
    }

    pub const fn top_left(&self) -> Point {
        Point::new(self.left(), self.top())
    }
    pub const fn top_right(&self) -> Point {
        Point::new(self.right(), self.top())
    }
    pub const fn bottom_left(&self) -> Point {
        Point::new(self.left(), self.bottom())
    }
    pub const fn bottom_right(&self) -> Point {
        Point::new(self.right(), self.bottom())
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.w / 2, self.y + self.h / 2)
    }

    pub fn corner(&self, corner: Corner) -> Point {
        match corner {
            Corner::TopLeft => self.top_left(),
            Corner::TopRight => self.top_right(),
            Corner::BottomLeft => self.bottom_left(),
            Corner::BottomRight => self.bottom_right(),
        }
    }

    /// The boundary line of one side, ascending in coordinate order.
    pub fn edge(&self, edge: Edge) -> Line {
        match edge {
            Edge::Top => Line::new(self.top_left(), self.top_right()),
            Edge::Bottom => Line::new(self.bottom_left(), self.bottom_right()),
            Edge::Left => Line::new(self.top_left(), self.bottom_left()),
            Edge::Right => Line::new(self.top_right(), self.bottom_right()),
        }
    }

    /// Whether `other` lies fully within this rectangle (boundaries
    /// included).
    pub fn contains_rect(&self, other: &Rect) -> bool {
        self.left() <= other.left()
            && other.right() <= self.right()
            && self.top() <= other.top()
            && other.bottom() <= self.bottom()
    }

    /// The smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        let left = self.left().min(other.left());
        let top = self.top().min(other.top());
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(left, top, right - left, bottom - top)
    }
}

/// How two orthogonal lines must meet to count as intersecting.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IntersectType {
    /// The lines must cross strictly; meeting at an endpoint does not
    /// count. Used during extrusion so a rectangle's own sides do not stop
    /// its edges.
    Cross,
    /// The lines may terminate on top of one another.
    OnEdge,
}

/// An orthogonal line with integer coordinates, ascending from `p1` to `p2`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Line {
    p1: Point,
    p2: Point,
}

impl Line {
    pub fn new(p1: Point, p2: Point) -> Self {
        debug_assert!(
            p1.x == p2.x || p1.y == p2.y,
            "Lines must be orthogonal to a grid axis"
        );
        Self { p1, p2 }
    }

    pub fn p1(&self) -> Point {
        self.p1
    }
    pub fn p2(&self) -> Point {
        self.p2
    }
    pub fn set_p1(&mut self, p: Point) {
        self.p1 = p;
    }
    pub fn set_p2(&mut self, p: Point) {
        self.p2 = p;
    }

    pub fn orientation(&self) -> Orientation {
        if self.p1.x == self.p2.x { Orientation::Vertical } else { Orientation::Horizontal }
    }

    /// Intersects this line with a perpendicular one.
    pub fn intersect(&self, other: &Line, ty: IntersectType) -> Option<Point> {
        debug_assert_ne!(self.orientation(), other.orientation());
        let (hz, vt) = match self.orientation() {
            Orientation::Horizontal => (self, other),
            Orientation::Vertical => (other, self),
        };

        let (hz_hit, vt_hit) = match ty {
            IntersectType::Cross => (
                hz.p1.x < vt.p1.x && vt.p1.x < hz.p2.x,
                vt.p1.y < hz.p1.y && hz.p1.y < vt.p2.y,
            ),
            IntersectType::OnEdge => (
                hz.p1.x <= vt.p1.x && vt.p1.x <= hz.p2.x,
                vt.p1.y <= hz.p1.y && hz.p1.y <= vt.p2.y,
            ),
        };

        (hz_hit && vt_hit).then(|| Point::new(vt.p1.x, hz.p1.y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corners_in_grid_form() {
        let r = Rect::new(2, 3, 3, 4);
        assert_eq!(r.top_left(), Point::new(2, 3));
        assert_eq!(r.bottom_right(), Point::new(5, 7));
        assert_eq!(r, Rect::from_corners(r.top_left(), r.bottom_right()));
    }

    #[test]
    fn test_cross_excludes_endpoints() {
        let hz = Line::new(Point::new(0, 5), Point::new(10, 5));
        let vt = Line::new(Point::new(4, 0), Point::new(4, 10));
        assert_eq!(hz.intersect(&vt, IntersectType::Cross), Some(Point::new(4, 5)));

        // A vertical line starting exactly at y=5 touches, but does not cross.
        let touching = Line::new(Point::new(4, 5), Point::new(4, 10));
        assert_eq!(hz.intersect(&touching, IntersectType::Cross), None);
        assert_eq!(
            hz.intersect(&touching, IntersectType::OnEdge),
            Some(Point::new(4, 5))
        );
    }

    #[test]
    fn test_intersect_is_symmetric() {
        let hz = Line::new(Point::new(0, 2), Point::new(8, 2));
        let vt = Line::new(Point::new(3, 0), Point::new(3, 6));
        assert_eq!(
            hz.intersect(&vt, IntersectType::OnEdge),
            vt.intersect(&hz, IntersectType::OnEdge)
        );
    }

    #[test]
    fn test_union_and_containment() {
        let a = Rect::new(0, 0, 4, 4);
        let b = Rect::new(2, 2, 6, 6);
        let u = a.union(&b);
        assert_eq!(u, Rect::new(0, 0, 8, 8));
        assert!(u.contains_rect(&a));
        assert!(u.contains_rect(&b));
        assert!(!a.contains_rect(&b));
    }
}
