use super::*;
use crate::foundation::core::Point;
use crate::render::frame::FrameRGBA;

fn square(x0: f64, y0: f64, s: f64, space: MaskSpace) -> MaskPolygon {
    MaskPolygon {
        vertices: vec![
            Point::new(x0, y0),
            Point::new(x0 + s, y0),
            Point::new(x0 + s, y0 + s),
            Point::new(x0, y0 + s),
        ],
        space,
    }
}

#[test]
fn fills_projected_mask_black() {
    let mut frame = FrameRGBA::solid(64, 64, [200, 200, 200]);
    let mut canvas = OverlayCanvas::new(64, 64).unwrap();
    let masks = [square(10.0, 10.0, 20.0, MaskSpace::Reference)];
    let out = MaskCompositor::default().apply(&mut canvas, &masks, |_| {
        Some(Homography::translation(5.0, 0.0))
    });
    assert_eq!(out, MaskOutcome { drawn: 1, skipped: 0 });
    canvas.composite_onto(&mut frame).unwrap();
    assert_eq!(frame.pixel(20, 20), Some([0, 0, 0, 255]));
    // Shifted right by 5: x in [15, 35).
    assert_eq!(frame.pixel(12, 20), Some([200, 200, 200, 255]));
    assert_eq!(frame.pixel(33, 20), Some([0, 0, 0, 255]));
}

#[test]
fn masks_without_transform_are_skipped() {
    let mut canvas = OverlayCanvas::new(64, 64).unwrap();
    let masks = [
        square(0.0, 0.0, 10.0, MaskSpace::Reference),
        square(0.0, 0.0, 10.0, MaskSpace::Intersection("ID-1".into())),
    ];
    let out = MaskCompositor::default().apply(&mut canvas, &masks, |space| match space {
        MaskSpace::Reference => Some(Homography::identity()),
        MaskSpace::Intersection(_) => None,
    });
    assert_eq!(out, MaskOutcome { drawn: 1, skipped: 1 });
    assert_eq!(canvas.draw_count(), 1);
}
