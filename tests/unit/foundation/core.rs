use super::*;

#[test]
fn frame_index_serializes_as_plain_number() {
    let s = serde_json::to_string(&FrameIndex(42)).unwrap();
    assert_eq!(s, "42");
    assert_eq!(FrameIndex(u64::MAX).next(), FrameIndex(u64::MAX));
}

#[test]
fn rgb8_uses_array_form() {
    let c: Rgb8 = serde_json::from_str("[255, 128, 0]").unwrap();
    assert_eq!(c, Rgb8::new(255, 128, 0));
    assert_eq!(serde_json::to_string(&c).unwrap(), "[255,128,0]");
}

#[test]
fn canvas_rgba_len() {
    let c = Canvas {
        width: 4,
        height: 3,
    };
    assert_eq!(c.rgba_len(), 48);
}

#[test]
fn fps_parses_ffprobe_ratios() {
    assert_eq!(Fps::parse_ratio("30000/1001").unwrap(), Fps { num: 30000, den: 1001 });
    assert_eq!(Fps::parse_ratio("25").unwrap(), Fps { num: 25, den: 1 });
    assert!(Fps::parse_ratio("0/0").is_err());
    assert!(Fps::parse_ratio("abc").is_err());
    assert!((Fps::new(30, 1).unwrap().as_f64() - 30.0).abs() < 1e-12);
}
