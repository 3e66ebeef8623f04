mod app;
mod ui;

use anyhow::{anyhow, Context, Result};
use app::App;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
    MouseEvent, MouseEventKind,
};
use crossterm::execute;
use globe_render::config::ViewerConfig;
use globe_render::data::{self, MapData};
use ratatui::DefaultTerminal;
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

fn main() -> Result<()> {
    let config = ViewerConfig::from_env()?;
    if let Some(path) = &config.log_file {
        init_logging(path)?;
    }

    let data = load_data(&config.data_dir);

    // Initialize terminal
    let mut terminal = ratatui::init();
    terminal.clear()?;

    // Enable mouse capture
    execute!(std::io::stdout(), EnableMouseCapture)?;

    // Run the app
    let result = run(&mut terminal, &config, data);

    // Disable mouse capture and restore terminal
    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();

    result
}

/// Log to a file: the terminal belongs to the map.
fn init_logging(path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .try_init()
        .map_err(|e| anyhow!(e))
}

fn load_data(data_dir: &Path) -> MapData {
    let mut data = if data_dir.exists() {
        data::load_all_geojson(data_dir)
    } else {
        MapData::default()
    };

    // Fall back to simple world if no data loaded
    if !data.layers.has_data() {
        data::generate_simple_world(&mut data);
    }
    data
}

/// Handle mouse events for panning and zooming
fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => app.zoom_in(),
        MouseEventKind::ScrollDown => app.zoom_out(),
        // Horizontal scroll for panning (trackpad two-finger swipe)
        MouseEventKind::ScrollLeft => app.pan(-8, 0),
        MouseEventKind::ScrollRight => app.pan(8, 0),
        // Click and drag to pan
        MouseEventKind::Down(MouseButton::Left) => {
            app.last_mouse = Some((mouse.column, mouse.row));
        }
        MouseEventKind::Drag(MouseButton::Left) => {
            app.handle_drag(mouse.column, mouse.row);
        }
        MouseEventKind::Up(MouseButton::Left) => {
            app.end_drag();
        }
        _ => {}
    }
}

fn run(terminal: &mut DefaultTerminal, config: &ViewerConfig, data: MapData) -> Result<()> {
    let size = terminal.size()?;
    let mut app = App::new(size.width as usize, size.height as usize, config, data);

    // Main loop
    loop {
        app.render_frame();
        terminal.draw(|frame| ui::render(frame, &app))?;

        // Handle events with ~60fps target
        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                Event::Key(key) => {
                    // Only handle key press events (not release)
                    if key.kind == KeyEventKind::Press {
                        match key.code {
                            KeyCode::Char('q') | KeyCode::Esc => app.quit(),

                            // Pan with hjkl or arrow keys
                            KeyCode::Left | KeyCode::Char('h') => app.pan(-10, 0),
                            KeyCode::Right | KeyCode::Char('l') => app.pan(10, 0),
                            KeyCode::Up | KeyCode::Char('k') => app.pan(0, -5),
                            KeyCode::Down | KeyCode::Char('j') => app.pan(0, 5),

                            // Zoom
                            KeyCode::Char('+') | KeyCode::Char('=') => app.zoom_in(),
                            KeyCode::Char('-') | KeyCode::Char('_') => app.zoom_out(),

                            // Rendering
                            KeyCode::Char('p') | KeyCode::Char('P') => app.next_projection(),
                            KeyCode::Char('m') | KeyCode::Char('M') => app.next_quality(),
                            KeyCode::Char('o') | KeyCode::Char('O') => app.toggle_colors(),
                            KeyCode::Char('e') | KeyCode::Char('E') => app.toggle_relief(),
                            KeyCode::Char('v') | KeyCode::Char('V') => app.toggle_vectors(),

                            // Layer toggles
                            KeyCode::Char('b') | KeyCode::Char('B') => {
                                app.layers.toggle_borders();
                                app.layers_changed();
                            }
                            KeyCode::Char('g') | KeyCode::Char('G') => {
                                app.layers.toggle_graticule();
                                app.layers_changed();
                            }
                            KeyCode::Char('c') | KeyCode::Char('C') => {
                                app.layers.toggle_cities();
                                app.layers_changed();
                            }
                            KeyCode::Char('L') => {
                                app.layers.toggle_labels();
                                app.layers_changed();
                            }

                            // Reset view
                            KeyCode::Char('r') | KeyCode::Char('0') => app.reset_view(),

                            _ => {}
                        }
                    }
                }
                Event::Mouse(mouse) => {
                    handle_mouse(&mut app, mouse);
                }
                Event::Resize(width, height) => {
                    app.resize(width as usize, height as usize);
                }
                _ => {}
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
