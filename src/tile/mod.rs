//! Raster tiles and where they come from.

mod loader;
mod source;

pub use loader::{StackedTileLoader, TileLevels, DEFAULT_CACHE_BYTES};
pub use source::{LandTileSource, ProceduralTileSource, TileSource};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::paint::rgb;

/// Shown where a tile could not be produced.
pub const PLACEHOLDER_PIXEL: u32 = rgb(0, 0, 0);

/// Address of a tile in the level pyramid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId {
    pub zoom: u32,
    pub x: u32,
    pub y: u32,
}

impl TileId {
    pub fn new(zoom: u32, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }
}

/// How the texture pyramid maps the globe onto pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TileProjection {
    #[default]
    Equirectangular,
    Mercator,
}

#[derive(Debug, thiserror::Error)]
pub enum TileError {
    #[error("tile {0:?} is outside of the level bounds")]
    OutOfRange(TileId),

    #[error("tile {id:?} has {actual} pixels, expected {expected}")]
    SizeMismatch {
        id: TileId,
        expected: usize,
        actual: usize,
    },

    #[error("tile source failed: {0}")]
    Source(String),
}

/// A decoded tile, possibly merged from several layers.
#[derive(Debug)]
pub struct StackedTile {
    id: TileId,
    width: u32,
    height: u32,
    pixels: Vec<u32>,
    placeholder: bool,
    used: AtomicBool,
}

impl StackedTile {
    pub fn new(id: TileId, width: u32, height: u32, pixels: Vec<u32>) -> Self {
        Self {
            id,
            width,
            height,
            pixels,
            placeholder: false,
            used: AtomicBool::new(true),
        }
    }

    /// A tile filled with [`PLACEHOLDER_PIXEL`].
    pub fn placeholder(id: TileId, width: u32, height: u32) -> Self {
        Self {
            placeholder: true,
            ..Self::new(
                id,
                width,
                height,
                vec![PLACEHOLDER_PIXEL; (width * height) as usize],
            )
        }
    }

    pub fn id(&self) -> TileId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    /// Pixel at tile-local coordinates, clamped into the tile.
    #[inline(always)]
    pub fn pixel(&self, x: i32, y: i32) -> u32 {
        let x = x.clamp(0, self.width as i32 - 1) as usize;
        let y = y.clamp(0, self.height as i32 - 1) as usize;
        self.pixels[y * self.width as usize + x]
    }

    pub fn byte_count(&self) -> usize {
        self.pixels.len() * std::mem::size_of::<u32>()
    }

    pub fn is_used(&self) -> bool {
        self.used.load(Ordering::Relaxed)
    }

    pub fn set_used(&self, used: bool) {
        self.used.store(used, Ordering::Relaxed);
    }
}

/// Supplies tiles to the texture mappers. `load_tile` may be called from
/// several render bands at once; `reset_tile_hash` and `cleanup_tile_hash`
/// only run before and after a frame.
pub trait TileLoader: Send + Sync {
    /// Tile width and height in pixels.
    fn tile_size(&self) -> (u32, u32);

    fn tile_column_count(&self, level: u32) -> u32;

    fn tile_row_count(&self, level: u32) -> u32;

    fn tile_projection(&self) -> TileProjection;

    fn max_level(&self) -> u32;

    /// Never fails: tiles that cannot be produced come back as placeholders.
    fn load_tile(&self, id: TileId) -> Arc<StackedTile>;

    /// Mark every tile on display as unused.
    fn reset_tile_hash(&self);

    /// Move tiles not used since the last reset to the cache.
    fn cleanup_tile_hash(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_access_is_clamped() {
        let tile = StackedTile::new(TileId::new(0, 0, 0), 2, 2, vec![1, 2, 3, 4]);
        assert_eq!(tile.pixel(1, 1), 4);
        assert_eq!(tile.pixel(-5, 0), 1);
        assert_eq!(tile.pixel(7, 9), 4);
        assert_eq!(tile.byte_count(), 16);
    }

    #[test]
    fn test_placeholder() {
        let tile = StackedTile::placeholder(TileId::new(1, 2, 3), 4, 4);
        assert!(tile.is_placeholder());
        assert_eq!(tile.pixel(2, 2), PLACEHOLDER_PIXEL);
    }
}
