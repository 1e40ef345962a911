use super::*;
use crate::foundation::core::Fps;

#[test]
fn transparent_pixel_becomes_background() {
    let src = vec![0u8, 0, 0, 0];
    let mut dst = vec![0u8; 4];
    flatten_straight_over_bg(&mut dst, &src, [10, 20, 30]).unwrap();
    assert_eq!(dst, vec![10, 20, 30, 255]);
}

#[test]
fn opaque_pixel_is_copied() {
    let src = vec![1u8, 2, 3, 255];
    let mut dst = vec![0u8; 4];
    flatten_straight_over_bg(&mut dst, &src, [10, 20, 30]).unwrap();
    assert_eq!(dst, src);
}

#[test]
fn mismatched_buffers_are_rejected() {
    let mut dst = vec![0u8; 8];
    assert!(flatten_straight_over_bg(&mut dst, &[0u8; 4], [0, 0, 0]).is_err());
}

#[test]
fn odd_dimensions_are_rejected_before_spawning() {
    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new(
        std::env::temp_dir().join("intersight_odd.mp4"),
    ));
    let err = sink
        .begin(SinkConfig {
            width: 15,
            height: 16,
            fps: Fps { num: 30, den: 1 },
        })
        .unwrap_err();
    assert!(err.to_string().contains("even"));
}

#[test]
fn push_before_begin_fails() {
    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new("unused.mp4"));
    let frame = FrameRGBA::solid(2, 2, [0, 0, 0]);
    assert!(sink.push_frame(FrameIndex(1), &frame).is_err());
}

#[test]
fn encoder_args_carry_rate_and_quality() {
    let mut opts = FfmpegSinkOpts::new("out/clip.mp4");
    opts.crf = Some(20);
    opts.preset = Some("veryfast".into());
    let sink = FfmpegSink::new(opts);
    let args = sink.ffmpeg_args(SinkConfig {
        width: 640,
        height: 360,
        fps: Fps { num: 30000, den: 1001 },
    });
    let pos = |a: &str| args.iter().position(|x| x == a).unwrap();
    assert_eq!(args[0], "-y");
    assert_eq!(args[pos("-s") + 1], "640x360");
    assert_eq!(args[pos("-r") + 1], "30000/1001");
    assert!(pos("-r") < pos("-i"));
    assert_eq!(args[pos("-crf") + 1], "20");
    assert_eq!(args[pos("-preset") + 1], "veryfast");
    assert_eq!(args.last().map(String::as_str), Some("out/clip.mp4"));
}
