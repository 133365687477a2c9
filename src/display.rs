use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use std::io;
use tui::backend::CrosstermBackend;
use tui::layout::Rect;
use tui::style::{Color, Style};
use tui::symbols::Marker;
use tui::widgets::canvas::{Canvas, Points};
use tui::widgets::{Block, Borders};
use tui::Terminal;

/// Where a session's framebuffer ends up. Implementations decide how to show
/// it; the session only promises a packed buffer of the agreed size.
pub trait Display {
    /// show one packed 1bpp frame, row major, MSB leftmost
    fn draw(&mut self, data: &[u8]) -> Result<(), io::Error>;

    /// length of the buffer `draw` expects
    fn get_display_size_bytes(&self) -> usize;

    /// caption for whatever is being shown; ignored by displays without one
    fn set_title(&mut self, _title: &str) {}
}

/// width, height and bitplanes of a packed framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution(pub usize, pub usize, pub usize);

impl Resolution {
    pub fn pixel_count(&self) -> usize {
        self.0 * self.1
    }

    pub fn byte_count(&self) -> usize {
        self.pixel_count() * self.2 / 8
    }

    /// canvas x range; one canvas unit per pixel
    fn canvas_x(&self) -> [f64; 2] {
        [0.0, self.0 as f64 - 1.0]
    }

    /// canvas y range; the canvas counts up from the bottom, the frame down
    /// from the top, so rows land on negative y
    fn canvas_y(&self) -> [f64; 2] {
        [1.0 - self.1 as f64, 0.0]
    }

    /// canvas coords of every lit pixel in `data`
    fn lit_pixels(&self, data: &[u8]) -> Vec<(f64, f64)> {
        let width = self.0;
        (0..self.pixel_count())
            .filter(|&n| data[n / 8] & (0x80 >> (n % 8)) != 0)
            .map(|n| ((n % width) as f64, -((n / width) as f64)))
            .collect()
    }
}

/// CHIP-8's one and only screen mode
pub const CHIP8_RESOLUTION: Resolution = Resolution(64, 32, 1);

/// Monochrome frames in a terminal: a tui canvas in a titled border, on the
/// alternate screen for as long as this lives.
pub struct MonoTermDisplay {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    resolution: Resolution,
    title: String,
}

impl MonoTermDisplay {
    pub fn new(resolution: Resolution) -> Result<MonoTermDisplay, io::Error> {
        if resolution.2 != 1 {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "only single-bitplane frames can be shown",
            ));
        }
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        terminal.hide_cursor()?;
        terminal.clear()?;
        Ok(MonoTermDisplay {
            terminal,
            resolution,
            title: String::from("CHIP-8"),
        })
    }
}

impl Drop for MonoTermDisplay {
    fn drop(&mut self) {
        let _ = self.terminal.show_cursor();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

impl Display for MonoTermDisplay {
    fn draw(&mut self, data: &[u8]) -> Result<(), io::Error> {
        assert_eq!(
            data.len(),
            self.resolution.byte_count(),
            "frame is the wrong size for this display"
        );
        let res = self.resolution;
        let lit = res.lit_pixels(data);
        let title = self.title.as_str();
        // one character cell per pixel, plus the border
        let area = Rect::new(0, 0, res.0 as u16 + 2, res.1 as u16 + 2);
        self.terminal.draw(|frame| {
            let screen = Canvas::default()
                .block(
                    Block::default()
                        .title(title)
                        .borders(Borders::ALL)
                        .style(Style::default().bg(Color::Black)),
                )
                .x_bounds(res.canvas_x())
                .y_bounds(res.canvas_y())
                .marker(Marker::Block)
                .paint(|ctx| {
                    ctx.draw(&Points {
                        coords: &lit,
                        color: Color::White,
                    })
                });
            frame.render_widget(screen, area);
        })?;
        Ok(())
    }

    fn get_display_size_bytes(&self) -> usize {
        self.resolution.byte_count()
    }

    fn set_title(&mut self, title: &str) {
        self.title = format!("CHIP-8: {}", title);
    }
}

/// useful for testing non-display routines; remembers what it was last given
#[derive(Debug, Default)]
pub struct DummyDisplay {
    pub draws: usize,
    pub last_frame: Vec<u8>,
    pub title: String,
}

impl DummyDisplay {
    pub fn new() -> DummyDisplay {
        DummyDisplay::default()
    }
}

impl Display for DummyDisplay {
    fn draw(&mut self, data: &[u8]) -> Result<(), io::Error> {
        self.draws += 1;
        self.last_frame.clear();
        self.last_frame.extend_from_slice(data);
        Ok(())
    }
    fn get_display_size_bytes(&self) -> usize {
        CHIP8_RESOLUTION.byte_count()
    }
    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chip8_sizes() {
        assert_eq!(CHIP8_RESOLUTION.pixel_count(), 2048);
        assert_eq!(CHIP8_RESOLUTION.byte_count(), 256);
    }

    #[test]
    fn test_canvas_ranges() {
        assert_eq!(CHIP8_RESOLUTION.canvas_x(), [0.0, 63.0]);
        assert_eq!(CHIP8_RESOLUTION.canvas_y(), [-31.0, 0.0]);
    }

    #[test]
    fn test_blank_frame_has_no_lit_pixels() {
        assert!(CHIP8_RESOLUTION.lit_pixels(&[0u8; 256]).is_empty());
        assert_eq!(CHIP8_RESOLUTION.lit_pixels(&[0xffu8; 256]).len(), 2048);
    }

    #[test]
    fn test_lit_pixel_coords() {
        let mut data = [0u8; 256];
        data[0] = 0x80; // top left
        data[8 + 7] = 0x01; // row 1, far right
        data[255] = 0x01; // bottom right
        assert_eq!(
            CHIP8_RESOLUTION.lit_pixels(&data),
            vec![(0.0, 0.0), (63.0, -1.0), (63.0, -31.0)]
        );
    }

    #[test]
    fn test_dummy_display_records() -> Result<(), io::Error> {
        let mut d = DummyDisplay::new();
        d.draw(&[1, 2, 3])?;
        d.draw(&[4])?;
        d.set_title("pong");
        assert_eq!(d.draws, 2);
        assert_eq!(d.last_frame, vec![4]);
        assert_eq!(d.title, "pong");
        Ok(())
    }

    #[test]
    #[ignore]
    // needs a real terminal
    fn test_term_display_rejects_wrong_sized_frame() {
        let mut d = MonoTermDisplay::new(CHIP8_RESOLUTION).unwrap();
        assert_eq!(d.get_display_size_bytes(), 256);
        let r = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| d.draw(&[0; 257])));
        assert!(r.is_err());
    }

    #[test]
    fn test_term_display_needs_one_bitplane() {
        assert!(MonoTermDisplay::new(Resolution(64, 32, 2)).is_err());
    }
}
