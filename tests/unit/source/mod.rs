use super::*;

fn frames(n: usize) -> Vec<FrameRGBA> {
    (0..n)
        .map(|i| FrameRGBA::solid(4, 4, [i as u8, 0, 0]))
        .collect()
}

fn fps() -> Fps {
    Fps { num: 30, den: 1 }
}

#[test]
fn in_memory_serves_in_order_then_ends() {
    let mut src = InMemorySource::new(frames(3), fps()).unwrap();
    assert_eq!(src.info().canvas, Canvas { width: 4, height: 4 });
    for i in 0..3u8 {
        let f = src.next_frame().unwrap().unwrap();
        assert_eq!(f.pixel(0, 0), Some([i, 0, 0, 255]));
    }
    assert!(src.next_frame().unwrap().is_none());
}

#[test]
fn in_memory_rejects_mixed_sizes() {
    let mut v = frames(1);
    v.push(FrameRGBA::solid(2, 2, [0, 0, 0]));
    assert!(InMemorySource::new(v, fps()).is_err());
    assert!(InMemorySource::new(Vec::new(), fps()).is_err());
}

#[test]
fn failing_after_reports_source_error() {
    let mut src = InMemorySource::new(frames(3), fps()).unwrap().failing_after(1);
    assert!(src.next_frame().unwrap().is_some());
    assert!(matches!(src.next_frame(), Err(OverlayError::Source(_))));
}

#[test]
fn capture_frame_skips_to_position() {
    let mut src = InMemorySource::new(frames(5), fps()).unwrap();
    let f = capture_frame(&mut src, 3).unwrap();
    assert_eq!(f.pixel(0, 0), Some([3, 0, 0, 255]));

    let mut short = InMemorySource::new(frames(2), fps()).unwrap();
    assert!(capture_frame(&mut short, 2).is_err());
}
