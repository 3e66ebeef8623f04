use crate::app::App;
use globe_render::paint::{blue, green, red, Canvas};
use globe_render::vector::Label;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
    Frame,
};

/// Render the UI
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Split into map area and status bar
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Map
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    render_map(frame, app, chunks[0]);
    render_status_bar(frame, app, chunks[1]);
}

fn render_map(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            format!(" Globe: {} ", app.viewport.projection.name()),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let map_widget = MapWidget {
        canvas: &app.frame,
        labels: &app.labels,
    };
    frame.render_widget(map_widget, inner);
}

#[inline]
fn terminal_color(pixel: u32) -> Color {
    Color::Rgb(red(pixel), green(pixel), blue(pixel))
}

/// Shows the composed frame with upper half blocks: the foreground colour
/// is the upper pixel, the background colour the lower one.
struct MapWidget<'a> {
    canvas: &'a Canvas,
    labels: &'a [Label],
}

impl Widget for MapWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (width, height) = self.canvas.size();
        let columns = (area.width as usize).min(width);
        let rows = (area.height as usize).min(height / 2);

        for row in 0..rows {
            let y = area.y + row as u16;
            for column in 0..columns {
                let upper = self.canvas.pixel(column, 2 * row);
                let lower = self.canvas.pixel(column, 2 * row + 1);
                buf[(area.x + column as u16, y)]
                    .set_char('▀')
                    .set_fg(terminal_color(upper))
                    .set_bg(terminal_color(lower));
            }
        }

        let label_style = Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD);
        for label in self.labels {
            if label.x < 0.0 || label.y < 0.0 {
                continue;
            }
            let (column, row) = (label.x as usize, label.y as usize / 2);
            if column >= columns || row >= rows {
                continue;
            }

            let max_len = (columns - column).min(24);
            let y = area.y + row as u16;
            for (i, ch) in label.text.chars().take(max_len).enumerate() {
                buf[(area.x + (column + i) as u16, y)]
                    .set_char(ch)
                    .set_style(label_style);
            }
        }
    }
}

fn toggle_span(on: bool, on_text: &'static str, off_text: &'static str) -> Span<'static> {
    Span::styled(
        if on { on_text } else { off_text },
        Style::default().fg(if on { Color::Green } else { Color::DarkGray }),
    )
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let settings = &app.layers.settings;

    let status = Line::from(vec![
        Span::styled(" Zoom: ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.zoom_level(), Style::default().fg(Color::Yellow)),
        Span::styled(" (", Style::default().fg(Color::DarkGray)),
        Span::styled(app.lod_level(), Style::default().fg(Color::Magenta)),
        Span::styled(
            format!(" L{}) ", app.tile_level()),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!("[m]{} ", app.viewport.quality.name()),
            Style::default().fg(Color::Yellow),
        ),
        // Toggle indicators
        toggle_span(app.show_colors, "[O]colour ", "[o]colour "),
        toggle_span(app.colorizer.show_relief(), "[E]relief ", "[e]relief "),
        toggle_span(app.show_vectors, "[V]ector ", "[v]ector "),
        toggle_span(settings.show_borders, "[B]order ", "[b]order "),
        toggle_span(settings.show_graticule, "[G]rid ", "[g]rid "),
        toggle_span(settings.show_cities, "[C]ities ", "[c]ities "),
        toggle_span(settings.show_labels, "[L]abels ", "[l]abels "),
        Span::styled("| ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.center_coords(), Style::default().fg(Color::Cyan)),
        Span::styled(
            " | hjkl:pan +/-:zoom p:projection r:reset q:quit",
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let paragraph = Paragraph::new(status);
    frame.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use globe_render::paint::{rgb, CanvasFormat};

    #[test]
    fn test_half_blocks_carry_two_rows() {
        let mut canvas = Canvas::new(2, 2, CanvasFormat::Rgb32);
        canvas.set_pixel(0, 0, rgb(255, 0, 0));
        canvas.set_pixel(0, 1, rgb(0, 0, 255));
        let labels: [Label; 0] = [];
        let area = Rect::new(0, 0, 2, 1);
        let mut buf = Buffer::empty(area);
        MapWidget {
            canvas: &canvas,
            labels: &labels,
        }
        .render(area, &mut buf);

        let cell = &buf[(0, 0)];
        assert_eq!(cell.symbol(), "▀");
        assert_eq!(cell.fg, Color::Rgb(255, 0, 0));
        assert_eq!(cell.bg, Color::Rgb(0, 0, 255));
    }

    #[test]
    fn test_labels_are_clipped_to_the_map() {
        let canvas = Canvas::new(6, 4, CanvasFormat::Rgb32);
        let labels = [Label {
            x: 3.0,
            y: 2.0,
            text: "Lyon".to_string(),
        }];
        let area = Rect::new(0, 0, 6, 2);
        let mut buf = Buffer::empty(area);
        MapWidget {
            canvas: &canvas,
            labels: &labels,
        }
        .render(area, &mut buf);

        assert_eq!(buf[(3, 1)].symbol(), "L");
        assert_eq!(buf[(5, 1)].symbol(), "o");
    }
}
