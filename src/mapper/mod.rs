//! Texture mappers: fill a canvas with the globe texture seen through a
//! viewport, one horizontal band per worker.

mod context;
mod cylindrical;
mod equirect;
mod generic;
mod gnomonic;
mod mercator;

pub use context::ScanlineTextureMapperContext;
pub use equirect::EquirectScanlineTextureMapper;
pub use generic::GenericScanlineTextureMapper;
pub use gnomonic::GnomonicScanlineTextureMapper;
pub use mercator::MercatorScanlineTextureMapper;

use std::num::NonZeroUsize;
use std::ops::Range;
use std::sync::Arc;

use rayon::{Scope, ThreadPool, ThreadPoolBuilder};
use tracing::{debug, warn};

use crate::colorizer::TextureColorizer;
use crate::paint::{Canvas, Painter, PixelRect};
use crate::projection::{Projection, Viewport};
use crate::tile::TileLoader;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapperState {
    /// The canvas shows the last viewport.
    Clean,
    NeedsRepaint,
}

/// The mapper canvas and what it was last painted for.
#[derive(Debug)]
pub struct CanvasCache {
    canvas: Canvas,
    state: MapperState,
    painted: Option<(Viewport, u32)>,
}

impl Default for CanvasCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CanvasCache {
    pub fn new() -> Self {
        Self {
            canvas: Canvas::new(0, 0, crate::paint::CanvasFormat::Rgb32),
            state: MapperState::NeedsRepaint,
            painted: None,
        }
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut Canvas {
        &mut self.canvas
    }

    pub fn state(&self) -> MapperState {
        self.state
    }

    pub fn invalidate(&mut self) {
        self.state = MapperState::NeedsRepaint;
    }

    /// Get the canvas ready for `viewport`. Returns whether it has to be
    /// painted again.
    pub fn prepare(&mut self, viewport: &Viewport, tile_level: u32) -> bool {
        let format = ScanlineTextureMapperContext::optimal_canvas_format(viewport);
        if self.canvas.size() != viewport.size() || self.canvas.format() != format {
            debug!(
                width = viewport.width,
                height = viewport.height,
                ?format,
                "canvas reallocated"
            );
            self.canvas = Canvas::new(viewport.width, viewport.height, format);
            self.state = MapperState::NeedsRepaint;
        }

        let unchanged = self
            .painted
            .as_ref()
            .is_some_and(|(painted, level)| painted == viewport && *level == tile_level);
        if !unchanged {
            self.state = MapperState::NeedsRepaint;
        }

        if self.state == MapperState::NeedsRepaint && !viewport.map_covers_viewport() {
            self.canvas.fill(0);
        }
        self.state == MapperState::NeedsRepaint
    }

    pub fn finish(&mut self, viewport: &Viewport, tile_level: u32) {
        self.state = MapperState::Clean;
        self.painted = Some((viewport.clone(), tile_level));
    }
}

/// Worker threads shared by the mappers.
#[derive(Debug)]
pub struct RenderPool {
    pool: Option<ThreadPool>,
}

impl RenderPool {
    pub fn new(threads: usize) -> Self {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("globe-band-{i}"))
            .build();
        match pool {
            Ok(pool) => Self { pool: Some(pool) },
            Err(err) => {
                warn!(%err, "falling back to the global rayon pool");
                Self { pool: None }
            }
        }
    }

    /// One thread per available core.
    pub fn available() -> Self {
        Self::new(
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        )
    }

    pub fn threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    /// Run `op` in a scope; returns once every task spawned in it finished.
    pub fn scope<'scope, OP>(&self, op: OP)
    where
        OP: FnOnce(&Scope<'scope>) + Send,
    {
        match &self.pool {
            Some(pool) => pool.scope(op),
            None => rayon::scope(op),
        }
    }
}

/// Split `rows` of the canvas into one band per worker and run `paint` on
/// every band in parallel. `paint` gets the first row of its band and the
/// band's pixels.
pub(crate) fn paint_bands<F>(pool: &RenderPool, canvas: &mut Canvas, rows: Range<usize>, paint: F)
where
    F: Fn(usize, &mut [u32]) + Sync,
{
    let width = canvas.width();
    let rows = rows.start.min(canvas.height())..rows.end.min(canvas.height());
    if width == 0 || rows.is_empty() {
        return;
    }

    let band_rows = rows.len().div_ceil(pool.threads());
    debug!(
        first_row = rows.start,
        rows = rows.len(),
        band_rows,
        "painting bands"
    );

    let first_row = rows.start;
    let pixels = &mut canvas.pixels_mut()[rows.start * width..rows.end * width];
    let paint = &paint;
    pool.scope(|scope| {
        for (i, band) in pixels.chunks_mut(band_rows * width).enumerate() {
            scope.spawn(move |_| paint(first_row + i * band_rows, band));
        }
    });
}

/// Call `paint_row` for every row of a band. Interlaced painting fills every
/// second row with a copy of the one above.
pub(crate) fn for_each_row(
    band: &mut [u32],
    width: usize,
    first_row: usize,
    interlaced: bool,
    mut paint_row: impl FnMut(usize, &mut [u32]),
) {
    let rows = band.len() / width;
    let step = if interlaced { 2 } else { 1 };
    for j in (0..rows).step_by(step) {
        let (head, tail) = band.split_at_mut((j + 1) * width);
        let row = &mut head[j * width..];
        paint_row(first_row + j, row);
        if interlaced && j + 1 < rows {
            tail[..width].copy_from_slice(row);
        }
    }
}

/// Paints the texture of a tile pyramid for a viewport.
pub trait TextureMapper: Send {
    fn canvas_cache(&self) -> &CanvasCache;

    fn canvas_cache_mut(&mut self) -> &mut CanvasCache;

    fn tile_loader(&self) -> &Arc<dyn TileLoader>;

    /// Paint the canvas for `viewport`.
    fn render(&mut self, viewport: &Viewport, tile_level: u32);

    /// Part of the canvas the map can cover.
    fn blit_rect(&self, viewport: &Viewport) -> PixelRect {
        PixelRect::from_size(viewport.width, viewport.height)
    }

    /// Repaint the canvas if the viewport or level changed, colorize it and
    /// copy the `dirty_rect` part of it onto the painter.
    fn map_texture(
        &mut self,
        painter: &mut dyn Painter,
        viewport: &Viewport,
        tile_level: u32,
        dirty_rect: PixelRect,
        colorizer: Option<&mut TextureColorizer>,
    ) {
        if self.canvas_cache_mut().prepare(viewport, tile_level) {
            let tile_loader = Arc::clone(self.tile_loader());
            tile_loader.reset_tile_hash();
            self.render(viewport, tile_level);
            tile_loader.cleanup_tile_hash();

            if let Some(colorizer) = colorizer {
                colorizer.colorize(self.canvas_cache_mut().canvas_mut(), viewport, viewport.quality);
            }
            self.canvas_cache_mut().finish(viewport, tile_level);
        }

        let rect = self.blit_rect(viewport).intersected(&dirty_rect);
        if !rect.is_empty() {
            painter.draw_image(rect, self.canvas_cache().canvas(), rect);
        }
    }

    fn set_repaint_needed(&mut self) {
        self.canvas_cache_mut().invalidate();
    }

    fn state(&self) -> MapperState {
        self.canvas_cache().state()
    }

    fn canvas(&self) -> &Canvas {
        self.canvas_cache().canvas()
    }
}

/// The mapper suited to `projection`.
pub fn mapper_for(
    projection: Projection,
    tile_loader: Arc<dyn TileLoader>,
    pool: Arc<RenderPool>,
) -> Box<dyn TextureMapper> {
    match projection {
        Projection::Equirectangular => {
            Box::new(EquirectScanlineTextureMapper::new(tile_loader, pool))
        }
        Projection::Mercator => Box::new(MercatorScanlineTextureMapper::new(tile_loader, pool)),
        Projection::Gnomonic => Box::new(GnomonicScanlineTextureMapper::new(tile_loader, pool)),
        Projection::Stereographic | Projection::Spherical => {
            Box::new(GenericScanlineTextureMapper::new(tile_loader, pool))
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::paint::rgb;
    use crate::tile::{ProceduralTileSource, StackedTileLoader, TileLevels};

    /// Equirectangular pyramid with the texel position encoded in the colour.
    pub fn position_loader() -> Arc<dyn TileLoader> {
        let levels = TileLevels {
            level_zero_columns: 2,
            level_zero_rows: 1,
            max_level: 3,
        };
        let source = ProceduralTileSource::new(levels, |t| {
            rgb(
                (t.u() * 255.0) as u8,
                (t.v() * 255.0) as u8,
                ((t.x + t.y) % 7) as u8 * 30,
            )
        });
        Arc::new(StackedTileLoader::new(source, 16, 16, levels))
    }

    pub fn pool() -> Arc<RenderPool> {
        Arc::new(RenderPool::new(3))
    }
}
