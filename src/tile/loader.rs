use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, warn};

use super::{StackedTile, TileError, TileId, TileLoader, TileProjection, TileSource};

/// Byte budget of the tile cache.
pub const DEFAULT_CACHE_BYTES: usize = 64 * 1024 * 1024;

/// Shape of the tile pyramid: level `n` has `level_zero_columns << n`
/// columns and `level_zero_rows << n` rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileLevels {
    pub level_zero_columns: u32,
    pub level_zero_rows: u32,
    pub max_level: u32,
}

impl Default for TileLevels {
    fn default() -> Self {
        Self {
            level_zero_columns: 2,
            level_zero_rows: 1,
            max_level: 10,
        }
    }
}

/// Tiles that left the display, evicted oldest first once over budget.
#[derive(Debug)]
struct TileCache {
    tiles: HashMap<TileId, Arc<StackedTile>>,
    order: VecDeque<TileId>,
    bytes: usize,
    max_bytes: usize,
}

impl TileCache {
    fn new(max_bytes: usize) -> Self {
        Self {
            tiles: HashMap::new(),
            order: VecDeque::new(),
            bytes: 0,
            max_bytes,
        }
    }

    fn take(&mut self, id: TileId) -> Option<Arc<StackedTile>> {
        let tile = self.tiles.remove(&id)?;
        self.order.retain(|&cached| cached != id);
        self.bytes -= tile.byte_count();
        Some(tile)
    }

    fn insert(&mut self, tile: Arc<StackedTile>) {
        let id = tile.id();
        self.bytes += tile.byte_count();
        if let Some(old) = self.tiles.insert(id, tile) {
            self.bytes -= old.byte_count();
            self.order.retain(|&cached| cached != id);
        }
        self.order.push_back(id);

        while self.bytes > self.max_bytes {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if let Some(evicted) = self.tiles.remove(&oldest) {
                self.bytes -= evicted.byte_count();
            }
        }
    }

    fn len(&self) -> usize {
        self.tiles.len()
    }
}

/// Tile loader keeping the tiles of the current frame in a hash and older
/// ones in a bounded cache.
pub struct StackedTileLoader<S> {
    source: S,
    tile_width: u32,
    tile_height: u32,
    levels: TileLevels,
    projection: TileProjection,
    tiles_on_display: RwLock<HashMap<TileId, Arc<StackedTile>>>,
    cache: Mutex<TileCache>,
}

impl<S: TileSource> StackedTileLoader<S> {
    pub fn new(source: S, tile_width: u32, tile_height: u32, levels: TileLevels) -> Self {
        Self {
            source,
            tile_width: tile_width.max(1),
            tile_height: tile_height.max(1),
            levels,
            projection: TileProjection::Equirectangular,
            tiles_on_display: RwLock::new(HashMap::new()),
            cache: Mutex::new(TileCache::new(DEFAULT_CACHE_BYTES)),
        }
    }

    pub fn with_projection(mut self, projection: TileProjection) -> Self {
        self.projection = projection;
        self
    }

    pub fn with_cache_bytes(self, max_bytes: usize) -> Self {
        Self {
            cache: Mutex::new(TileCache::new(max_bytes)),
            ..self
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn tiles_on_display(&self) -> usize {
        self.tiles_on_display
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn cached_tiles(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn render(&self, id: TileId) -> Result<StackedTile, TileError> {
        if id.zoom > self.levels.max_level
            || id.x >= self.tile_column_count(id.zoom)
            || id.y >= self.tile_row_count(id.zoom)
        {
            return Err(TileError::OutOfRange(id));
        }

        let pixels = self
            .source
            .render_tile(id, self.tile_width, self.tile_height)?;
        let expected = (self.tile_width * self.tile_height) as usize;
        if pixels.len() != expected {
            return Err(TileError::SizeMismatch {
                id,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(StackedTile::new(id, self.tile_width, self.tile_height, pixels))
    }

    fn create_tile(&self, id: TileId) -> Arc<StackedTile> {
        let cached = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take(id);
        if let Some(tile) = cached {
            return tile;
        }

        let tile = self.render(id).unwrap_or_else(|err| {
            warn!(?id, %err, "tile replaced by placeholder");
            StackedTile::placeholder(id, self.tile_width, self.tile_height)
        });
        Arc::new(tile)
    }
}

impl<S: TileSource> TileLoader for StackedTileLoader<S> {
    fn tile_size(&self) -> (u32, u32) {
        (self.tile_width, self.tile_height)
    }

    fn tile_column_count(&self, level: u32) -> u32 {
        self.levels.level_zero_columns << level
    }

    fn tile_row_count(&self, level: u32) -> u32 {
        self.levels.level_zero_rows << level
    }

    fn tile_projection(&self) -> TileProjection {
        self.projection
    }

    fn max_level(&self) -> u32 {
        self.levels.max_level
    }

    fn load_tile(&self, id: TileId) -> Arc<StackedTile> {
        {
            let display = self
                .tiles_on_display
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(tile) = display.get(&id) {
                tile.set_used(true);
                return Arc::clone(tile);
            }
        }

        // Rendered without holding the lock; a band racing for the same
        // tile simply loses its copy.
        let tile = self.create_tile(id);
        let mut display = self
            .tiles_on_display
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let tile = display.entry(id).or_insert(tile);
        tile.set_used(true);
        Arc::clone(tile)
    }

    fn reset_tile_hash(&self) {
        let display = self
            .tiles_on_display
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        for tile in display.values() {
            tile.set_used(false);
        }
    }

    fn cleanup_tile_hash(&self) {
        let mut display = self
            .tiles_on_display
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let unused: Vec<TileId> = display
            .values()
            .filter(|tile| !tile.is_used())
            .map(|tile| tile.id())
            .collect();
        if unused.is_empty() {
            return;
        }

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        for id in &unused {
            if let Some(tile) = display.remove(id) {
                cache.insert(tile);
            }
        }
        let on_display = display.len();
        debug!(
            retired = unused.len(),
            on_display,
            cached = cache.len(),
            "tile hash cleaned up"
        );
    }
}
