use super::*;

#[test]
fn probe_json_picks_video_stream() {
    let json = br#"{"streams":[
        {"codec_type":"audio"},
        {"codec_type":"video","width":1920,"height":1080,
         "r_frame_rate":"30000/1001","avg_frame_rate":"0/0","nb_frames":"900"}
    ]}"#;
    let info = parse_probe(Path::new("clip.mp4"), json).unwrap();
    assert_eq!((info.width, info.height), (1920, 1080));
    assert_eq!(info.fps, Fps { num: 30000, den: 1001 });
    assert_eq!(info.frame_count, Some(900));
}

#[test]
fn probe_json_without_video_fails() {
    let json = br#"{"streams":[{"codec_type":"audio"}]}"#;
    assert!(parse_probe(Path::new("a.wav"), json).is_err());
}

#[test]
fn read_full_stops_at_eof() {
    let data = [1u8, 2, 3];
    let mut r = &data[..];
    let mut buf = [0u8; 8];
    assert_eq!(read_full(&mut r, &mut buf).unwrap(), 3);
    assert_eq!(read_full(&mut r, &mut buf).unwrap(), 0);
}
