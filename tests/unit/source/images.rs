use super::*;

fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("intersight_images_{tag}_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn reads_images_in_name_order() {
    let dir = temp_dir("order");
    for (name, v) in [("b.png", 2u8), ("a.png", 1), ("c.png", 3)] {
        FrameRGBA::solid(3, 2, [v, v, v])
            .to_rgba_image()
            .unwrap()
            .save(dir.join(name))
            .unwrap();
    }
    std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

    let fps = Fps { num: 25, den: 1 };
    let mut src = ImageSequenceSource::from_dir(&dir, fps).unwrap();
    assert_eq!(src.len(), 3);
    assert_eq!(src.info().canvas, Canvas { width: 3, height: 2 });
    let firsts: Vec<u8> = std::iter::from_fn(|| src.next_frame().unwrap())
        .map(|f| f.data[0])
        .collect();
    assert_eq!(firsts, vec![1, 2, 3]);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn size_change_is_an_error() {
    let dir = temp_dir("size");
    FrameRGBA::solid(3, 2, [0, 0, 0])
        .to_rgba_image()
        .unwrap()
        .save(dir.join("0.png"))
        .unwrap();
    FrameRGBA::solid(4, 2, [0, 0, 0])
        .to_rgba_image()
        .unwrap()
        .save(dir.join("1.png"))
        .unwrap();
    let mut src = ImageSequenceSource::from_dir(&dir, Fps { num: 1, den: 1 }).unwrap();
    assert!(src.next_frame().unwrap().is_some());
    assert!(src.next_frame().is_err());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn empty_directory_is_an_error() {
    let dir = temp_dir("empty");
    assert!(ImageSequenceSource::from_dir(&dir, Fps { num: 1, den: 1 }).is_err());
    let _ = std::fs::remove_dir_all(&dir);
}
