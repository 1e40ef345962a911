use crate::foundation::core::{BezPath, Point, Rect, Rgb8};
use crate::foundation::error::{OverlayError, OverlayResult};
use crate::render::frame::FrameRGBA;

/// Vector overlay layer rasterized with `vello_cpu` and composited over a frame.
///
/// Draw calls paint in call order (later calls on top). Nothing touches the frame until
/// [`OverlayCanvas::composite_onto`].
pub struct OverlayCanvas {
    ctx: vello_cpu::RenderContext,
    width: u16,
    height: u16,
    draws: usize,
}

impl OverlayCanvas {
    /// Create an empty, transparent overlay of the given size.
    pub fn new(width: u32, height: u32) -> OverlayResult<Self> {
        let w: u16 = width
            .try_into()
            .map_err(|_| OverlayError::validation("overlay width exceeds u16"))?;
        let h: u16 = height
            .try_into()
            .map_err(|_| OverlayError::validation("overlay height exceeds u16"))?;
        if w == 0 || h == 0 {
            return Err(OverlayError::validation("overlay width/height must be non-zero"));
        }
        let mut ctx = vello_cpu::RenderContext::new(w, h);
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        Ok(Self {
            ctx,
            width: w,
            height: h,
            draws: 0,
        })
    }

    /// Number of draw calls issued so far.
    pub fn draw_count(&self) -> usize {
        self.draws
    }

    /// Fill a closed path.
    pub fn fill_path(&mut self, path: &BezPath, color: Rgb8) {
        self.ctx.set_paint(paint(color));
        self.ctx.fill_path(&bezpath_to_cpu(path));
        self.draws += 1;
    }

    /// Stroke a path with a line of `width` pixels.
    pub fn stroke_path(&mut self, path: &BezPath, color: Rgb8, width: f64) {
        self.ctx.set_paint(paint(color));
        self.ctx.set_stroke(vello_cpu::kurbo::Stroke::new(width));
        self.ctx.stroke_path(&bezpath_to_cpu(path));
        self.draws += 1;
    }

    /// Fill an axis-aligned rectangle.
    pub fn fill_rect(&mut self, rect: Rect, color: Rgb8) {
        self.ctx.set_paint(paint(color));
        self.ctx.fill_rect(&vello_cpu::kurbo::Rect::new(rect.x0, rect.y0, rect.x1, rect.y1));
        self.draws += 1;
    }

    /// Fill a circle.
    pub fn fill_circle(&mut self, center: Point, radius: f64, color: Rgb8) {
        use kurbo::Shape as _;
        let circle = kurbo::Circle::new(center, radius);
        let mut p = BezPath::new();
        for el in circle.path_elements(0.1) {
            p.push(el);
        }
        self.fill_path(&p, color);
    }

    /// Rasterize the overlay and blend it source-over onto `frame`.
    pub fn composite_onto(mut self, frame: &mut FrameRGBA) -> OverlayResult<()> {
        if frame.width != u32::from(self.width) || frame.height != u32::from(self.height) {
            return Err(OverlayError::validation(format!(
                "overlay is {}x{}, frame is {}x{}",
                self.width, self.height, frame.width, frame.height
            )));
        }
        if self.draws == 0 {
            return Ok(());
        }
        let mut pixmap = vello_cpu::Pixmap::new(self.width, self.height);
        self.ctx.flush();
        self.ctx.render_to_pixmap(&mut pixmap);
        blend_premul_over_straight(&mut frame.data, pixmap.data_as_u8_slice())
    }
}

fn paint(c: Rgb8) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, 255)
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let pt = |p: Point| vello_cpu::kurbo::Point::new(p.x, p.y);
    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(pt(p)),
            PathEl::LineTo(p) => out.line_to(pt(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(pt(p1), pt(p2)),
            PathEl::CurveTo(p1, p2, p3) => out.curve_to(pt(p1), pt(p2), pt(p3)),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

fn mul_div255(x: u16, y: u16) -> u16 {
    ((u32::from(x) * u32::from(y) + 127) / 255) as u16
}

/// `dst = src over dst`, with `src` premultiplied and `dst` straight alpha.
fn blend_premul_over_straight(dst: &mut [u8], src_premul: &[u8]) -> OverlayResult<()> {
    if dst.len() != src_premul.len() || !dst.len().is_multiple_of(4) {
        return Err(OverlayError::validation(
            "blend expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src_premul.chunks_exact(4)) {
        let sa = u16::from(s[3]);
        if sa == 0 {
            continue;
        }
        if sa == 255 {
            d.copy_from_slice(s);
            continue;
        }
        let inv = 255 - sa;
        let da = u16::from(d[3]);
        let out_a = sa + mul_div255(da, inv);
        for c in 0..3 {
            let d_premul = mul_div255(u16::from(d[c]), da);
            let out_premul = u16::from(s[c]) + mul_div255(d_premul, inv);
            d[c] = if out_a == 0 {
                0
            } else {
                ((u32::from(out_premul) * 255 + u32::from(out_a) / 2) / u32::from(out_a)).min(255)
                    as u8
            };
        }
        d[3] = out_a.min(255) as u8;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/render/canvas.rs"]
mod tests;
