use crate::foundation::core::{BezPath, FrameIndex, Point, Rect, Rgb8, Vec2};
use crate::render::canvas::OverlayCanvas;
use crate::render::stamp::FrameStamp;
use crate::schedule::clock::{LightState, PanelLamps, ScheduleClock};
use serde::{Deserialize, Serialize};

/// Direction arrows drawn above a panel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrowSet {
    /// No arrows.
    #[default]
    None,
    /// Up arrow (through movement).
    Forward,
    /// Left arrow (left turn).
    Left,
    /// Left and up arrows (combined signal).
    Both,
}

/// A fixed-position signal head drawn on every frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LightPanel {
    /// Light id in the schedule.
    pub light: String,
    /// Panel center in frame pixels.
    pub center: Point,
    /// Arrows above the panel.
    #[serde(default)]
    pub arrows: ArrowSet,
}

/// Panel geometry and colors.
#[derive(Clone, Debug, PartialEq)]
pub struct PanelStyle {
    pub width: f64,
    pub height: f64,
    pub lamp_radius: f64,
    pub housing: Rgb8,
    pub red: (Rgb8, Rgb8),
    pub yellow: (Rgb8, Rgb8),
    pub green: (Rgb8, Rgb8),
    pub arrow_length: f64,
    pub arrow_width: f64,
    /// Light id drawn under the housing. `None` disables it.
    pub label: Option<FrameStamp>,
}

impl Default for PanelStyle {
    fn default() -> Self {
        // (lit, dark)
        Self {
            width: 20.0,
            height: 90.0,
            lamp_radius: 8.0,
            housing: Rgb8::WHITE,
            red: (Rgb8::RED, Rgb8::new(100, 0, 0)),
            yellow: (Rgb8::YELLOW, Rgb8::new(150, 150, 0)),
            green: (Rgb8::GREEN, Rgb8::new(0, 100, 0)),
            arrow_length: 20.0,
            arrow_width: 2.0,
            label: Some(FrameStamp::label(Rgb8::WHITE)),
        }
    }
}

impl PanelStyle {
    /// Lit color for a state.
    pub fn state_color(&self, s: LightState) -> Rgb8 {
        match s {
            LightState::Red => self.red.0,
            LightState::Yellow => self.yellow.0,
            LightState::Green => self.green.0,
        }
    }

    /// Red, yellow and green lamp colors for a lamp pattern.
    pub fn lamp_colors(&self, lamps: PanelLamps) -> [Rgb8; 3] {
        let pick = |lit: bool, (on, off): (Rgb8, Rgb8)| if lit { on } else { off };
        [
            pick(lamps.red, self.red),
            pick(lamps.yellow, self.yellow),
            pick(lamps.green, self.green),
        ]
    }
}

/// Draw every panel for `frame`. Independent of camera tracking.
pub fn draw_light_panels(
    canvas: &mut OverlayCanvas,
    panels: &[LightPanel],
    clock: &ScheduleClock,
    frame: FrameIndex,
    style: &PanelStyle,
) {
    for panel in panels {
        let state = clock.state(&panel.light, frame);
        draw_panel(canvas, panel, state, style);
    }
}

fn draw_panel(canvas: &mut OverlayCanvas, panel: &LightPanel, state: LightState, style: &PanelStyle) {
    let c = panel.center;
    let (hw, hh) = (style.width / 2.0, style.height / 2.0);
    canvas.fill_rect(Rect::new(c.x - hw, c.y - hh, c.x + hw, c.y + hh), style.housing);

    let colors = style.lamp_colors(state.into());
    let step = style.height / 3.0;
    for (i, color) in colors.into_iter().enumerate() {
        let center = Point::new(c.x, c.y + (i as f64 - 1.0) * step);
        canvas.fill_circle(center, style.lamp_radius, color);
    }

    let arrow_color = style.state_color(state);
    let y = c.y - hh - 10.0;
    let len = style.arrow_length;
    let left = |x0: f64| arrow_path(Point::new(x0, y), Point::new(x0 - len, y));
    let up = |x0: f64| arrow_path(Point::new(x0, y), Point::new(x0, y - len));
    let paths = match panel.arrows {
        ArrowSet::None => vec![],
        ArrowSet::Forward => vec![up(c.x)],
        ArrowSet::Left => vec![left(c.x - 10.0)],
        ArrowSet::Both => vec![left(c.x - 10.0), up(c.x + 10.0)],
    };
    for p in &paths {
        canvas.stroke_path(p, arrow_color, style.arrow_width);
    }

    if let Some(label) = style.label {
        let origin = Point::new(
            c.x - label.text_width(&panel.light) / 2.0,
            c.y + hh + 4.0 + label.digit_height,
        );
        label.at(origin).draw_text(canvas, &panel.light);
    }
}

/// Shaft plus a two-stroke head whose length is 30% of the shaft.
pub(crate) fn arrow_path(from: Point, to: Point) -> BezPath {
    let mut p = BezPath::new();
    p.move_to(from);
    p.line_to(to);

    let shaft = to - from;
    let len = shaft.hypot();
    if len > 0.0 {
        let back = -shaft / len * (0.3 * len);
        for angle in [std::f64::consts::FRAC_PI_4, -std::f64::consts::FRAC_PI_4] {
            let (s, c) = angle.sin_cos();
            let wing = Vec2::new(back.x * c - back.y * s, back.x * s + back.y * c);
            p.move_to(to);
            p.line_to(to + wing);
        }
    }
    p
}

#[cfg(test)]
#[path = "../../tests/unit/render/lights.rs"]
mod tests;
