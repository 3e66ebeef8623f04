use std::sync::Arc;

use globe_render::clip::ClipPainter;
use globe_render::colorizer::TextureColorizer;
use globe_render::config::ViewerConfig;
use globe_render::data::MapData;
use globe_render::mapper::{mapper_for, RenderPool, TextureMapper};
use globe_render::paint::{rgb, Canvas, CanvasFormat, PixelRect, RasterPainter};
use globe_render::projection::Viewport;
use globe_render::tile::{
    LandTileSource, ProceduralTileSource, StackedTileLoader, TileLevels, TileLoader,
};
use globe_render::vector::{zoom_level, Label, Lod, VectorLayers};
use tracing::debug;

const TERRAIN_SEED: u64 = 0x5eed;
const BACKGROUND: u32 = rgb(0, 0, 0);

/// Application state
pub struct App {
    pub viewport: Viewport,
    pub layers: VectorLayers,
    pub colorizer: TextureColorizer,
    /// Recolour the texture with the sea and land palettes
    pub show_colors: bool,
    pub show_vectors: bool,
    pub should_quit: bool,
    /// Last mouse position for drag tracking
    pub last_mouse: Option<(u16, u16)>,
    /// Composed frame, two pixel rows per terminal row
    pub frame: Canvas,
    pub labels: Vec<Label>,
    mapper: Box<dyn TextureMapper>,
    tile_loader: Arc<dyn TileLoader>,
    pool: Arc<RenderPool>,
    tile_size: u32,
    levels: TileLevels,
    dirty: bool,
}

impl App {
    pub fn new(width: usize, height: usize, config: &ViewerConfig, data: MapData) -> Self {
        let (pixel_width, pixel_height) = Self::pixel_size(width, height);
        let levels = TileLevels::default();

        let terrain = ProceduralTileSource::terrain(levels, TERRAIN_SEED);
        let source = LandTileSource::new(terrain, data.land.clone());
        let tile_loader: Arc<dyn TileLoader> = Arc::new(StackedTileLoader::new(
            source,
            config.tile_size,
            config.tile_size,
            levels,
        ));
        let pool = Arc::new(RenderPool::new(config.threads));

        let mut colorizer = TextureColorizer::with_default_palette();
        colorizer.add_land_polygons(data.land);
        colorizer.add_lake_polygons(data.lakes);
        colorizer.set_show_relief(config.show_relief);

        let viewport = Viewport::world(config.projection, pixel_width, pixel_height)
            .with_quality(config.quality);

        Self {
            mapper: mapper_for(config.projection, Arc::clone(&tile_loader), Arc::clone(&pool)),
            viewport,
            layers: data.layers,
            colorizer,
            show_colors: true,
            show_vectors: true,
            should_quit: false,
            last_mouse: None,
            frame: Canvas::new(pixel_width, pixel_height, CanvasFormat::Rgb32),
            labels: Vec::new(),
            tile_loader,
            pool,
            tile_size: config.tile_size,
            levels,
            dirty: true,
        }
    }

    /// Map pixels for a terminal of the given size. The border takes two
    /// columns and two rows, the status bar one more row; every cell shows
    /// two pixel rows.
    fn pixel_size(width: usize, height: usize) -> (usize, usize) {
        let inner_width = width.saturating_sub(2);
        let inner_height = height.saturating_sub(3);
        (inner_width.max(1), (inner_height * 2).max(2))
    }

    /// Update viewport size when terminal resizes
    pub fn resize(&mut self, width: usize, height: usize) {
        let (pixel_width, pixel_height) = Self::pixel_size(width, height);
        self.viewport.set_size(pixel_width, pixel_height);
        self.dirty = true;
    }

    /// Pan the map by terminal cells
    pub fn pan(&mut self, dx: i32, dy: i32) {
        self.viewport.pan(dx as f64, dy as f64 * 2.0);
        self.dirty = true;
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
        self.dirty = true;
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
        self.dirty = true;
    }

    pub fn next_projection(&mut self) {
        let projection = self.viewport.projection.next();
        self.viewport.set_projection(projection);
        self.mapper = mapper_for(projection, Arc::clone(&self.tile_loader), Arc::clone(&self.pool));
        self.dirty = true;
    }

    pub fn next_quality(&mut self) {
        self.viewport.quality = self.viewport.quality.next();
        self.dirty = true;
    }

    pub fn toggle_relief(&mut self) {
        let show = !self.colorizer.show_relief();
        self.colorizer.set_show_relief(show);
        self.repaint();
    }

    pub fn toggle_colors(&mut self) {
        self.show_colors = !self.show_colors;
        self.repaint();
    }

    pub fn toggle_vectors(&mut self) {
        self.show_vectors = !self.show_vectors;
        self.dirty = true;
    }

    /// Redraw the vector layers after a settings change
    pub fn layers_changed(&mut self) {
        self.dirty = true;
    }

    /// Return to the whole world view
    pub fn reset_view(&mut self) {
        let (width, height) = self.viewport.size();
        self.viewport = Viewport::world(self.viewport.projection, width, height)
            .with_quality(self.viewport.quality);
        self.dirty = true;
    }

    /// Same viewport, different colours: the cached texture is stale.
    fn repaint(&mut self) {
        self.mapper.set_repaint_needed();
        self.dirty = true;
    }

    /// Request quit
    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Texture level whose width matches the width of the projected world.
    pub fn tile_level(&self) -> u32 {
        let world_width = 4.0 * self.viewport.radius as f64;
        let level_zero_width = (self.tile_size * self.levels.level_zero_columns) as f64;
        (world_width / level_zero_width)
            .log2()
            .ceil()
            .clamp(0.0, self.levels.max_level as f64) as u32
    }

    /// Compose texture and overlays into `frame` if anything changed.
    pub fn render_frame(&mut self) {
        if !self.dirty {
            return;
        }
        let (width, height) = self.viewport.size();
        let tile_level = self.tile_level();
        debug!(width, height, tile_level, "composing frame");

        let mut painter = RasterPainter::new(width, height);
        painter.canvas_mut().fill(BACKGROUND);
        let colorizer = self.show_colors.then_some(&mut self.colorizer);
        self.mapper.map_texture(
            &mut painter,
            &self.viewport,
            tile_level,
            PixelRect::from_size(width, height),
            colorizer,
        );

        let mut painter = ClipPainter::new(painter, true);
        self.labels = if self.show_vectors {
            self.layers.render(&mut painter, &self.viewport)
        } else {
            Vec::new()
        };
        self.frame = painter.into_inner().into_canvas();
        self.dirty = false;
    }

    /// Handle mouse drag
    pub fn handle_drag(&mut self, x: u16, y: u16) {
        if let Some((last_x, last_y)) = self.last_mouse {
            let dx = last_x as i32 - x as i32;
            let dy = last_y as i32 - y as i32;
            self.pan(dx, dy);
        }
        self.last_mouse = Some((x, y));
    }

    /// Reset drag state when mouse button released
    pub fn end_drag(&mut self) {
        self.last_mouse = None;
    }

    /// Get current zoom level as a string
    pub fn zoom_level(&self) -> String {
        format!("{:.1}x", zoom_level(&self.viewport))
    }

    /// Get current center coordinates as a string
    pub fn center_coords(&self) -> String {
        let lat = self.viewport.center_lat.to_degrees();
        let lon = self.viewport.center_lon.to_degrees();
        format!(
            "{:.1}°{}, {:.1}°{}",
            lat.abs(),
            if lat >= 0.0 { "N" } else { "S" },
            lon.abs(),
            if lon >= 0.0 { "E" } else { "W" }
        )
    }

    /// Get current LOD level as a string
    pub fn lod_level(&self) -> &'static str {
        match Lod::from_zoom(zoom_level(&self.viewport)) {
            Lod::Low => "110m",
            Lod::Medium => "50m",
            Lod::High => "10m",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use globe_render::data::generate_simple_world;
    use globe_render::projection::Projection;

    fn app() -> App {
        let config = ViewerConfig {
            threads: 2,
            tile_size: 32,
            ..ViewerConfig::default()
        };
        let mut data = MapData::default();
        generate_simple_world(&mut data);
        App::new(62, 23, &config, data)
    }

    #[test]
    fn test_pixel_size_uses_half_blocks() {
        let app = app();
        assert_eq!(app.viewport.size(), (60, 40));
    }

    #[test]
    fn test_tile_level_follows_radius() {
        let mut app = app();
        // World radius 15: 60 pixels around, level zero is 64 wide.
        assert_eq!(app.tile_level(), 0);
        app.viewport.radius = 64;
        assert_eq!(app.tile_level(), 2);
        app.viewport.radius = 1 << 20;
        assert_eq!(app.tile_level(), app.levels.max_level);
    }

    #[test]
    fn test_render_frame_draws_the_map() {
        let mut app = app();
        app.render_frame();
        assert_eq!(app.frame.size(), (60, 40));
        assert_ne!(app.frame.pixel(30, 20), BACKGROUND);
        // Equirectangular world is 30 rows tall, centred.
        assert_eq!(app.frame.pixel(30, 1), BACKGROUND);
    }

    #[test]
    fn test_every_projection_renders() {
        let mut app = app();
        for _ in Projection::ALL {
            app.next_projection();
            app.render_frame();
            assert_ne!(app.frame.pixel(30, 20), BACKGROUND, "{:?}", app.viewport.projection);
        }
    }

    #[test]
    fn test_toggling_colors_repaints() {
        let mut app = app();
        app.render_frame();
        let colored = app.frame.clone();
        app.toggle_colors();
        app.render_frame();
        assert_ne!(app.frame, colored);
    }
}
