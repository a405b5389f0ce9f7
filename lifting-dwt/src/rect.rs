/// A half-open rectangle of sample or tile coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct IntRect {
    pub(crate) x0: usize,
    pub(crate) y0: usize,
    pub(crate) x1: usize,
    pub(crate) y1: usize,
}

impl IntRect {
    pub(crate) fn from_ltrb(x0: usize, y0: usize, x1: usize, y1: usize) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub(crate) fn from_xywh(x: usize, y: usize, w: usize, h: usize) -> Self {
        Self {
            x0: x,
            y0: y,
            x1: x + w,
            y1: y + h,
        }
    }

    pub(crate) fn width(&self) -> usize {
        self.x1 - self.x0
    }

    pub(crate) fn height(&self) -> usize {
        self.y1 - self.y0
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }

    pub(crate) fn intersect(&self, other: Self) -> Self {
        if self.x1 < other.x0 || other.x1 < self.x0 || self.y1 < other.y0 || other.y1 < self.y0 {
            Self::from_xywh(0, 0, 0, 0)
        } else {
            Self::from_ltrb(
                usize::max(self.x0, other.x0),
                usize::max(self.y0, other.y0),
                usize::min(self.x1, other.x1),
                usize::min(self.y1, other.y1),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection() {
        let a = IntRect::from_xywh(0, 0, 16, 8);
        let b = IntRect::from_ltrb(8, 4, 32, 32);
        assert_eq!(a.intersect(b), IntRect::from_ltrb(8, 4, 16, 8));
        assert!(a.intersect(IntRect::from_xywh(20, 0, 4, 4)).is_empty());
        assert_eq!(a.width(), 16);
        assert_eq!(a.height(), 8);
    }
}
