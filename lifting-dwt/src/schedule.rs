//! Enumerating tiles over the extended image.

use crate::error::{Result, SettingsError, bail, err};
use crate::rect::IntRect;

/// The shape of the tiles processed by one kernel invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileShape {
    width: usize,
    height: usize,
}

impl TileShape {
    /// The minimal 2×2 tile.
    pub const T2X2: Self = Self {
        width: 2,
        height: 2,
    };
    /// A 4×4 tile.
    pub const T4X4: Self = Self {
        width: 4,
        height: 4,
    };
    /// A 6×2 tile.
    pub const T6X2: Self = Self {
        width: 6,
        height: 2,
    };
    /// An 8×2 tile.
    pub const T8X2: Self = Self {
        width: 8,
        height: 2,
    };
    /// An 8×8 tile.
    pub const T8X8: Self = Self {
        width: 8,
        height: 8,
    };

    /// Create a new tile shape. Both sides must be even and between 2 and 8.
    pub fn new(width: usize, height: usize) -> Result<Self> {
        let valid = |side: usize| (2..=8).contains(&side) && side % 2 == 0;

        if valid(width) && valid(height) {
            Ok(Self { width, height })
        } else {
            err!(SettingsError::InvalidTileShape)
        }
    }

    /// The width of the tile.
    pub fn width(&self) -> usize {
        self.width
    }

    /// The height of the tile.
    pub fn height(&self) -> usize {
        self.height
    }
}

impl Default for TileShape {
    fn default() -> Self {
        Self::T2X2
    }
}

/// The order in which tiles are visited.
///
/// Every order visits each tile exactly once, and of two neighboring tiles
/// always visits the one with the lower coordinate first. The order therefore
/// never changes the result, only the memory access pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScanOrder {
    /// Row by row.
    #[default]
    RowMajor,
    /// Column by column.
    ColumnMajor,
    /// Row by row within vertical strips of the given width, strips from left
    /// to right.
    VerticalStrips {
        /// The width of a strip in samples.
        width: usize,
    },
    /// Column by column within horizontal strips of the given height, strips
    /// from top to bottom.
    HorizontalStrips {
        /// The height of a strip in samples.
        height: usize,
    },
    /// Row by row within blocks, blocks in row-major order.
    Blocks {
        /// The width of a block in samples.
        width: usize,
        /// The height of a block in samples.
        height: usize,
    },
}

impl ScanOrder {
    pub(crate) fn validate(&self) -> Result<()> {
        match *self {
            Self::VerticalStrips { width: 0 }
            | Self::HorizontalStrips { height: 0 }
            | Self::Blocks { width: 0, .. }
            | Self::Blocks { height: 0, .. } => bail!(SettingsError::InvalidBlockSize),
            _ => Ok(()),
        }
    }
}

/// The anchor of a tile, in extended coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TileDescriptor {
    pub(crate) x: usize,
    pub(crate) y: usize,
}

/// Enumerates the tiles of a tile-aligned area in a scan order.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TileScheduler {
    area: IntRect,
    tile: TileShape,
    order: ScanOrder,
}

impl TileScheduler {
    pub(crate) fn new(area: IntRect, tile: TileShape, order: ScanOrder) -> Self {
        debug_assert!(area.x0 % tile.width == 0 && area.width() % tile.width == 0);
        debug_assert!(area.y0 % tile.height == 0 && area.height() % tile.height == 0);

        Self { area, tile, order }
    }

    /// The tiles in scan order. Calling this again restarts the sequence.
    pub(crate) fn tiles(&self) -> Tiles {
        let area = self.area;
        let round = |size: usize, side: usize| size.max(1).next_multiple_of(side);

        let (block_w, block_h, column_major) = match self.order {
            ScanOrder::RowMajor => (area.width(), area.height(), false),
            ScanOrder::ColumnMajor => (area.width(), area.height(), true),
            ScanOrder::VerticalStrips { width } => {
                (round(width, self.tile.width), area.height(), false)
            }
            ScanOrder::HorizontalStrips { height } => {
                (area.width(), round(height, self.tile.height), true)
            }
            ScanOrder::Blocks { width, height } => (
                round(width, self.tile.width),
                round(height, self.tile.height),
                false,
            ),
        };

        let block = area.intersect(IntRect::from_xywh(area.x0, area.y0, block_w, block_h));

        Tiles {
            area,
            block,
            block_w,
            block_h,
            tile_w: self.tile.width,
            tile_h: self.tile.height,
            column_major,
            x: area.x0,
            y: area.y0,
            done: area.is_empty(),
        }
    }
}

/// A restartable iterator over the tiles of a [`TileScheduler`].
#[derive(Debug, Clone)]
pub(crate) struct Tiles {
    area: IntRect,
    block: IntRect,
    block_w: usize,
    block_h: usize,
    tile_w: usize,
    tile_h: usize,
    column_major: bool,
    x: usize,
    y: usize,
    done: bool,
}

impl Tiles {
    fn advance(&mut self) {
        if self.column_major {
            self.y += self.tile_h;
            if self.y < self.block.y1 {
                return;
            }
            self.y = self.block.y0;
            self.x += self.tile_w;
            if self.x < self.block.x1 {
                return;
            }
        } else {
            self.x += self.tile_w;
            if self.x < self.block.x1 {
                return;
            }
            self.x = self.block.x0;
            self.y += self.tile_h;
            if self.y < self.block.y1 {
                return;
            }
        }

        // Move on to the next block.
        let (mut x0, mut y0) = (self.block.x1, self.block.y0);
        if x0 >= self.area.x1 {
            x0 = self.area.x0;
            y0 = self.block.y1;
        }

        if y0 >= self.area.y1 {
            self.done = true;
            return;
        }

        self.block = self
            .area
            .intersect(IntRect::from_xywh(x0, y0, self.block_w, self.block_h));
        self.x = x0;
        self.y = y0;
    }
}

impl Iterator for Tiles {
    type Item = TileDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let tile = TileDescriptor {
            x: self.x,
            y: self.y,
        };
        self.advance();

        Some(tile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn orders() -> [ScanOrder; 7] {
        [
            ScanOrder::RowMajor,
            ScanOrder::ColumnMajor,
            ScanOrder::VerticalStrips { width: 6 },
            ScanOrder::HorizontalStrips { height: 3 },
            ScanOrder::Blocks {
                width: 4,
                height: 4,
            },
            ScanOrder::Blocks {
                width: 1,
                height: 100,
            },
            ScanOrder::Blocks {
                width: 10,
                height: 2,
            },
        ]
    }

    #[test]
    fn tile_shapes() {
        assert_eq!(TileShape::new(6, 2).unwrap(), TileShape::T6X2);
        assert!(TileShape::new(3, 2).is_err());
        assert!(TileShape::new(2, 10).is_err());
        assert!(TileShape::new(0, 2).is_err());
    }

    #[test]
    fn empty_blocks_are_rejected() {
        assert!(ScanOrder::Blocks { width: 0, height: 4 }.validate().is_err());
        assert!(ScanOrder::VerticalStrips { width: 0 }.validate().is_err());
        assert!(ScanOrder::HorizontalStrips { height: 1 }.validate().is_ok());
    }

    #[test]
    fn visits_every_tile_once_in_dependency_order() {
        let area = IntRect::from_ltrb(0, 4, 24, 16);

        for tile in [TileShape::T2X2, TileShape::T4X4, TileShape::T6X2] {
            if area.x0 % tile.width() != 0 || area.width() % tile.width() != 0 {
                continue;
            }
            if area.y0 % tile.height() != 0 || area.height() % tile.height() != 0 {
                continue;
            }

            for order in orders() {
                let scheduler = TileScheduler::new(area, tile, order);
                let visited: Vec<_> = scheduler.tiles().collect();
                let expected = area.width() / tile.width() * (area.height() / tile.height());
                assert_eq!(visited.len(), expected, "{order:?}");

                let rank: HashMap<_, _> = visited
                    .iter()
                    .enumerate()
                    .map(|(i, t)| ((t.x, t.y), i))
                    .collect();
                assert_eq!(rank.len(), expected, "{order:?}");

                for t in &visited {
                    assert!(t.x >= area.x0 && t.x < area.x1);
                    assert!(t.y >= area.y0 && t.y < area.y1);

                    let here = rank[&(t.x, t.y)];
                    if let Some(&right) = rank.get(&(t.x + tile.width(), t.y)) {
                        assert!(here < right, "{order:?}");
                    }
                    if let Some(&below) = rank.get(&(t.x, t.y + tile.height())) {
                        assert!(here < below, "{order:?}");
                    }
                }

                // Restarting yields the same sequence.
                assert!(scheduler.tiles().eq(visited.iter().copied()));
            }
        }
    }

    #[test]
    fn block_order() {
        let area = IntRect::from_xywh(0, 0, 8, 4);
        let scheduler = TileScheduler::new(
            area,
            TileShape::T2X2,
            ScanOrder::Blocks {
                width: 4,
                height: 4,
            },
        );
        let visited: Vec<_> = scheduler.tiles().map(|t| (t.x, t.y)).collect();
        assert_eq!(
            visited,
            [
                (0, 0),
                (2, 0),
                (0, 2),
                (2, 2),
                (4, 0),
                (6, 0),
                (4, 2),
                (6, 2)
            ]
        );
    }

    #[test]
    fn empty_area() {
        let scheduler = TileScheduler::new(
            IntRect::from_xywh(0, 4, 8, 0),
            TileShape::T2X2,
            ScanOrder::RowMajor,
        );
        assert_eq!(scheduler.tiles().count(), 0);
    }
}
