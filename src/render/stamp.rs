use crate::foundation::core::{FrameIndex, Point, Rect, Rgb8};
use crate::render::canvas::OverlayCanvas;

// Segment bits: a b c d e f g (top, upper right, lower right, bottom, lower left, upper left,
// middle).
const DIGITS: [u8; 10] = [
    0b111_1110, 0b011_0000, 0b110_1101, 0b111_1001, 0b011_0011, 0b101_1011, 0b101_1111,
    0b111_0000, 0b111_1111, 0b111_1011,
];

/// Seven-segment text style. Draws the frame counter in the top-left corner and the id labels
/// of panels and intersections.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameStamp {
    /// Bottom-left corner of the first digit.
    pub origin: Point,
    pub digit_height: f64,
    pub thickness: f64,
    pub color: Rgb8,
}

impl Default for FrameStamp {
    fn default() -> Self {
        Self {
            origin: Point::new(20.0, 60.0),
            digit_height: 24.0,
            thickness: 3.0,
            color: Rgb8::WHITE,
        }
    }
}

impl FrameStamp {
    /// Small style for id labels.
    pub fn label(color: Rgb8) -> Self {
        Self {
            origin: Point::ZERO,
            digit_height: 10.0,
            thickness: 2.0,
            color,
        }
    }

    /// Same style at another origin.
    pub fn at(self, origin: Point) -> Self {
        Self { origin, ..self }
    }

    /// Horizontal advance per digit.
    pub fn advance(&self) -> f64 {
        self.digit_height / 2.0 + self.thickness * 2.0
    }

    /// Width of `text` when drawn.
    pub fn text_width(&self, text: &str) -> f64 {
        text.chars().count() as f64 * self.advance()
    }

    /// Draw the decimal value of `frame`.
    pub fn draw(&self, canvas: &mut OverlayCanvas, frame: FrameIndex) {
        self.draw_text(canvas, &frame.0.to_string());
    }

    /// Draw `text`. Characters without a seven-segment glyph leave a blank cell.
    pub fn draw_text(&self, canvas: &mut OverlayCanvas, text: &str) {
        for rect in self.text_segments(text) {
            canvas.fill_rect(rect, self.color);
        }
    }

    /// Rectangles that make up the digits of `frame`.
    pub fn segments(&self, frame: FrameIndex) -> Vec<Rect> {
        self.text_segments(&frame.0.to_string())
    }

    /// Rectangles that make up `text`.
    pub fn text_segments(&self, text: &str) -> Vec<Rect> {
        let mut out = Vec::new();
        for (i, ch) in text.chars().enumerate() {
            if let Some(bits) = glyph(ch) {
                let x = self.origin.x + i as f64 * self.advance();
                out.extend(self.digit_segments(bits, x));
            }
        }
        out
    }

    fn digit_segments(&self, bits: u8, x: f64) -> Vec<Rect> {
        let t = self.thickness;
        let w = self.digit_height / 2.0;
        let bottom = self.origin.y;
        let top = bottom - self.digit_height;
        let mid = bottom - self.digit_height / 2.0;
        let horizontal = |y: f64| Rect::new(x, y - t / 2.0, x + w, y + t / 2.0);
        let vertical = |x0: f64, y0: f64, y1: f64| Rect::new(x0 - t / 2.0, y0, x0 + t / 2.0, y1);
        let all = [
            horizontal(top),
            vertical(x + w, top, mid),
            vertical(x + w, mid, bottom),
            horizontal(bottom),
            vertical(x, mid, bottom),
            vertical(x, top, mid),
            horizontal(mid),
        ];
        all.into_iter()
            .enumerate()
            .filter(|(i, _)| bits & (1 << (6 - i)) != 0)
            .map(|(_, r)| r)
            .collect()
    }
}

fn glyph(ch: char) -> Option<u8> {
    if let Some(d) = ch.to_digit(10) {
        return Some(DIGITS[d as usize]);
    }
    let bits = match ch.to_ascii_uppercase() {
        '-' => 0b000_0001,
        'A' => 0b111_0111,
        'B' => 0b001_1111,
        'C' => 0b100_1110,
        'D' => 0b011_1101,
        'E' => 0b100_1111,
        'F' => 0b100_0111,
        'H' => 0b011_0111,
        'I' => 0b000_0110,
        'J' => 0b011_1100,
        'L' => 0b000_1110,
        'N' => 0b001_0101,
        'O' => DIGITS[0],
        'P' => 0b110_0111,
        'R' => 0b000_0101,
        'S' => DIGITS[5],
        'T' => 0b000_1111,
        'U' => 0b011_1110,
        'Y' => 0b011_1011,
        _ => return None,
    };
    Some(bits)
}

#[cfg(test)]
#[path = "../../tests/unit/render/stamp.rs"]
mod tests;
