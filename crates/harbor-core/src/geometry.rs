#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn area(&self) -> f32 {
        self.w.max(0.0) * self.h.max(0.0)
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.x && p.x <= self.x + self.w && p.y >= self.y && p.y <= self.y + self.h
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Rect {
        Rect {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// Overlapping region, if any. Edge-touching rects do not intersect.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.w).min(other.x + other.w);
        let y1 = (self.y + self.h).min(other.y + other.h);
        (x1 > x0 && y1 > y0).then(|| Rect::new(x0, y0, x1 - x0, y1 - y0))
    }

    /// Fraction of `self` that lies inside `bounds`, in `0.0..=1.0`.
    ///
    /// A zero-area rect (an empty sentinel element) counts as fully visible
    /// when it lies within `bounds` and invisible otherwise.
    pub fn visible_ratio(&self, bounds: &Rect) -> f32 {
        let area = self.area();
        if area <= 0.0 {
            let corner = Vec2 {
                x: self.x,
                y: self.y,
            };
            let far = Vec2 {
                x: self.x + self.w.max(0.0),
                y: self.y + self.h.max(0.0),
            };
            return if bounds.contains(corner) && bounds.contains(far) {
                1.0
            } else {
                0.0
            };
        }
        self.intersect(bounds)
            .map(|r| (r.area() / area).clamp(0.0, 1.0))
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visible_ratio_partial_and_full() {
        let viewport = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert_eq!(Rect::new(10.0, 10.0, 20.0, 20.0).visible_ratio(&viewport), 1.0);
        assert_eq!(Rect::new(0.0, 90.0, 100.0, 20.0).visible_ratio(&viewport), 0.5);
        assert_eq!(Rect::new(0.0, 200.0, 100.0, 20.0).visible_ratio(&viewport), 0.0);
    }

    #[test]
    fn zero_height_sentinel() {
        let viewport = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert_eq!(Rect::new(0.0, 100.0, 100.0, 0.0).visible_ratio(&viewport), 1.0);
        assert_eq!(Rect::new(0.0, 101.0, 100.0, 0.0).visible_ratio(&viewport), 0.0);
    }
}
