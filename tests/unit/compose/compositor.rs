use std::io::Cursor;

use super::*;
use crate::assets::decode::PreparedImage;
use crate::foundation::error::FiligraneError;
use crate::settings::model::{Anchor, ContentKind};

fn base(name: &str, w: u32, h: u32) -> ImageFile {
    ImageFile::from_decoded(name, PreparedImage::solid(w, h, [255, 255, 255, 255]))
}

fn mark() -> ImageFile {
    ImageFile::from_decoded("mark.png", PreparedImage::solid(2, 2, [255, 0, 0, 255]))
}

fn image_settings() -> WatermarkSettings {
    WatermarkSettings {
        content_kind: ContentKind::Image,
        size: 20.0,
        opacity: 100.0,
        position: Anchor::TopLeft,
        edge_margin: 0.0,
        ..Default::default()
    }
}

/// BMP whose header is intact but whose pixel data is missing.
fn truncated_bmp() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([1, 2, 3, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Bmp)
        .unwrap();
    let data_offset = u32::from_le_bytes([buf[10], buf[11], buf[12], buf[13]]) as usize;
    buf.truncate(data_offset);
    buf
}

#[test]
fn export_keeps_natural_size_and_encodes_png() {
    let mut c = Compositor::new(CompositorOpts::default().with_preview_max(64));
    let settings = image_settings();
    let wm = mark();
    let b = base("holiday.jpeg", 300, 120);
    let out = c
        .render_export(&b, &settings, Watermark::Image(&wm), 1)
        .unwrap();
    assert_eq!((out.width, out.height), (300, 120));
    assert_eq!(out.output_name(), "watermarked_holiday.png");
    assert_eq!(c.state(), CompositorState::Encoded);

    let decoded = image::load_from_memory(&out.png).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (300, 120));
    // 20% of 120 = 24 px watermark at the top-left corner.
    assert_eq!(decoded.get_pixel(10, 10).0, [255, 0, 0, 255]);
    assert_eq!(decoded.get_pixel(100, 100).0, [255, 255, 255, 255]);
}

#[test]
fn preview_fits_bounds_and_scales_the_watermark() {
    let mut c = Compositor::new(CompositorOpts::default().with_preview_max(150));
    let settings = image_settings();
    let wm = mark();
    let b = base("wide.png", 300, 120);
    let frame = c
        .render_preview(&b, &settings, Watermark::Image(&wm), 1)
        .unwrap();
    assert_eq!(frame.size(), PixelSize::new(150, 60));
    assert_eq!(c.state(), CompositorState::WatermarkApplied);
    // The 24 px export watermark is 12 px in the half-size preview.
    let inside = frame.into_straight();
    assert_eq!(inside.pixel(5, 5), Some([255, 0, 0, 255]));
    assert_eq!(inside.pixel(20, 20), Some([255, 255, 255, 255]));
}

#[test]
fn oversized_surface_is_reported() {
    let mut c = Compositor::default();
    let settings = image_settings();
    let wm = mark();
    let b = base("huge.png", 70_000, 1);
    let err = c
        .render_export(&b, &settings, Watermark::Image(&wm), 1)
        .unwrap_err();
    assert!(matches!(err, FiligraneError::SurfaceUnavailable(_)));
    assert!(err.is_batch_fatal());
    assert_eq!(c.state(), CompositorState::Idle);
}

#[test]
fn base_decode_failure_is_surfaced() {
    let b = ImageFile::from_bytes("broken.bmp", truncated_bmp()).unwrap();
    let mut c = Compositor::default();
    let settings = image_settings();
    let wm = mark();
    let err = c
        .render_export(&b, &settings, Watermark::Image(&wm), 1)
        .unwrap_err();
    match err {
        FiligraneError::Decode { name, .. } => assert_eq!(name, "broken.bmp"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(c.state(), CompositorState::Idle);
}

#[test]
fn same_seed_renders_identically() {
    let mut settings = image_settings();
    settings.pattern = crate::settings::model::Pattern::Random;
    settings.quantity = 6;
    let wm = mark();
    let b = base("r.png", 200, 200);
    let mut c = Compositor::default();
    let a = c
        .render_export(&b, &settings, Watermark::Image(&wm), 77)
        .unwrap();
    let again = c
        .render_export(&b, &settings, Watermark::Image(&wm), 77)
        .unwrap();
    assert_eq!(a.png, again.png);
}

#[test]
fn env_default_preview_bound_is_positive() {
    assert!(CompositorOpts::default().preview_max() > 0);
    assert_eq!(CompositorOpts::default().with_preview_max(0).preview_max(), 1);
}

#[test]
fn failure_records_the_state_reached() {
    let mut c = Compositor::default();
    let settings = image_settings();
    let wm = mark();
    let b = ImageFile::from_bytes("broken.bmp", truncated_bmp()).unwrap();
    c.render_export(&b, &settings, Watermark::Image(&wm), 1)
        .unwrap_err();
    assert_eq!(c.failed_in(), Some(CompositorState::Idle));

    let ok = base("fine.png", 10, 10);
    c.render_export(&ok, &settings, Watermark::Image(&wm), 1)
        .unwrap();
    assert_eq!(c.failed_in(), None);
}
