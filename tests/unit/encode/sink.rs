use super::*;

fn cfg(w: u32, h: u32) -> SinkConfig {
    SinkConfig {
        width: w,
        height: h,
        fps: Fps { num: 30, den: 1 },
    }
}

#[test]
fn in_memory_sink_enforces_order() {
    let mut sink = InMemorySink::new();
    sink.begin(cfg(2, 2)).unwrap();
    let f = FrameRGBA::solid(2, 2, [1, 2, 3]);
    sink.push_frame(FrameIndex(1), &f).unwrap();
    sink.push_frame(FrameIndex(3), &f).unwrap();
    assert!(sink.push_frame(FrameIndex(3), &f).is_err());
    sink.end().unwrap();
    assert!(sink.is_ended());
    assert_eq!(sink.frames().len(), 2);
    assert_eq!(sink.config(), Some(cfg(2, 2)));
}

#[test]
fn png_sequence_writes_numbered_files() {
    let dir = std::env::temp_dir().join(format!("intersight_png_sink_{}", std::process::id()));
    let mut sink = PngSequenceSink::new(&dir, "frame_");
    sink.begin(cfg(4, 2)).unwrap();
    let f = FrameRGBA::solid(4, 2, [9, 8, 7]);
    sink.push_frame(FrameIndex(12), &f).unwrap();
    sink.end().unwrap();

    let path = dir.join("frame_000012.png");
    assert_eq!(sink.frame_path(FrameIndex(12)), path);
    let back = FrameRGBA::from_path(&path).unwrap();
    assert_eq!(back, f);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn png_sequence_rejects_wrong_size() {
    let dir = std::env::temp_dir().join(format!("intersight_png_size_{}", std::process::id()));
    let mut sink = PngSequenceSink::new(&dir, "");
    sink.begin(cfg(4, 4)).unwrap();
    let f = FrameRGBA::solid(2, 2, [0, 0, 0]);
    assert!(sink.push_frame(FrameIndex(1), &f).is_err());
    let _ = std::fs::remove_dir_all(&dir);
}
