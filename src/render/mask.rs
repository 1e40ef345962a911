use crate::calibration::scene::{MaskPolygon, MaskSpace};
use crate::foundation::core::Rgb8;
use crate::geometry::homography::Homography;
use crate::geometry::projector::ProjectedPolygon;
use crate::render::canvas::OverlayCanvas;

/// How many masks were filled or skipped on one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MaskOutcome {
    pub drawn: usize,
    pub skipped: usize,
}

/// Projects occlusion polygons into the live frame and fills them opaque.
#[derive(Clone, Copy, Debug)]
pub struct MaskCompositor {
    pub color: Rgb8,
}

impl Default for MaskCompositor {
    fn default() -> Self {
        Self { color: Rgb8::BLACK }
    }
}

impl MaskCompositor {
    /// Fill every mask in list order.
    ///
    /// `resolve` maps a mask's space to the transform that takes its vertices into the current
    /// frame. A mask is skipped when it has no transform or projects degenerately.
    pub fn apply<F>(&self, canvas: &mut OverlayCanvas, masks: &[MaskPolygon], resolve: F) -> MaskOutcome
    where
        F: Fn(&MaskSpace) -> Option<Homography>,
    {
        let mut out = MaskOutcome::default();
        for mask in masks {
            let projected = resolve(&mask.space)
                .and_then(|h| ProjectedPolygon::project(&mask.vertices, &h))
                .filter(|p| p.vertices.len() >= 3);
            match projected {
                Some(poly) => {
                    canvas.fill_path(&poly.to_path(), self.color);
                    out.drawn += 1;
                }
                None => {
                    tracing::debug!(space = ?mask.space, "mask skipped");
                    out.skipped += 1;
                }
            }
        }
        out
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/mask.rs"]
mod tests;
