use super::*;

#[test]
fn frame_pixel_lookup_is_bounds_checked() {
    let f = FrameRGBA {
        width: 2,
        height: 1,
        data: vec![1, 2, 3, 4, 5, 6, 7, 8],
        premultiplied: false,
    };
    assert_eq!(f.pixel(1, 0), Some([5, 6, 7, 8]));
    assert_eq!(f.pixel(2, 0), None);
    assert_eq!(f.pixel(0, 1), None);
}

#[test]
fn png_encoding_unpremultiplies() {
    let f = FrameRGBA {
        width: 1,
        height: 1,
        data: vec![64, 0, 0, 128],
        premultiplied: true,
    };
    let png = f.encode_png().unwrap();
    let back = image::load_from_memory(&png).unwrap().to_rgba8();
    assert_eq!(back.get_pixel(0, 0).0, [128, 0, 0, 128]);
}

#[test]
fn png_encoding_rejects_short_buffers() {
    let f = FrameRGBA {
        width: 2,
        height: 2,
        data: vec![0; 4],
        premultiplied: false,
    };
    assert!(f.encode_png().is_err());
}

#[test]
fn instance_bounds_follow_the_transform() {
    let img = PreparedImage::solid(1, 1, [0, 0, 0, 255]);
    let draw = InstanceDraw {
        content: InstanceContent::Image {
            image: &img,
            size: Size::new(20.0, 10.0),
        },
        transform: Affine::translate((5.0, 7.0)),
        opacity: 1.0,
        blend: BlendMode::Normal,
        shadow: None,
        glow: None,
        blur: 0.0,
        noise: 0.0,
        noise_seed: 0,
    };
    assert_eq!(draw.content_bounds(), Rect::new(5.0, 7.0, 25.0, 17.0));
}
