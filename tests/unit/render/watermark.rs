use super::*;
use crate::foundation::core::Point;
use crate::render::cpu::CpuSurface;
use crate::settings::model::{Effects, Offset};

fn placement(x: f64, y: f64, rotation: f64) -> Placement {
    Placement { x, y, rotation }
}

#[test]
fn rotation_by_90_swaps_extents_about_the_same_center() {
    let content = Size::new(40.0, 10.0);
    let p = placement(100.0, 50.0, 0.0);
    let before = instance_bounds(&p, content);
    let after = instance_bounds(&placement(100.0, 50.0, 90.0), content);

    assert!((before.center().x - after.center().x).abs() < 1e-9);
    assert!((before.center().y - after.center().y).abs() < 1e-9);
    assert!((after.width() - before.height()).abs() < 1e-9);
    assert!((after.height() - before.width()).abs() < 1e-9);
    assert_eq!(before.center(), Point::new(120.0, 55.0));
}

#[test]
fn unrotated_transform_maps_local_box_to_placement() {
    let t = instance_transform(&placement(7.0, 9.0, 0.0), Size::new(4.0, 2.0));
    assert_eq!(t * Point::new(0.0, 0.0), Point::new(7.0, 9.0));
    assert_eq!(t * Point::new(4.0, 2.0), Point::new(11.0, 11.0));
}

#[test]
fn image_size_uses_shorter_base_side_and_keeps_aspect() {
    let s = image_target_size(PixelSize::new(400, 200), PixelSize::new(1000, 800), 25.0);
    assert_eq!(s, Size::new(200.0, 100.0));
    let s = image_target_size(PixelSize::new(100, 300), PixelSize::new(600, 900), 50.0);
    assert_eq!(s, Size::new(100.0, 300.0));
    assert_eq!(
        image_target_size(PixelSize::new(0, 3), PixelSize::new(10, 10), 50.0),
        Size::ZERO
    );
}

#[test]
fn scaled_effects_halve_at_half_scale() {
    let settings = WatermarkSettings {
        text: "x".to_owned(),
        font_size: 48.0,
        effects: Effects {
            shadow: true,
            shadow_blur: 10.0,
            shadow_offset: Offset { x: 4.0, y: -6.0 },
            stroke: true,
            stroke_width: 3.0,
            glow: true,
            glow_spread: 12.0,
            blur: 2.0,
            ..Default::default()
        },
        ..Default::default()
    };
    let full = ScaledEffects::from_settings(&settings, RenderScale::IDENTITY);
    let half = ScaledEffects::from_settings(&settings, RenderScale::from_widths(1000, 500));

    assert_eq!(half.font_size, full.font_size / 2.0);
    assert_eq!(half.blur, full.blur / 2.0);
    let (fs, hs) = (full.shadow.unwrap(), half.shadow.unwrap());
    assert_eq!(hs.blur, fs.blur / 2.0);
    assert_eq!(hs.offset, fs.offset / 2.0);
    assert_eq!(half.stroke.unwrap().width, full.stroke.unwrap().width / 2.0);
    assert_eq!(half.glow.unwrap().blur, full.glow.unwrap().blur / 2.0);
    assert_eq!(half.opacity, full.opacity);
}

#[test]
fn text_ignores_blend_mode_and_images_ignore_stroke() {
    let mut settings = WatermarkSettings {
        text: "x".to_owned(),
        blend_mode: BlendMode::Multiply,
        ..Default::default()
    };
    settings.effects.stroke = true;
    let fx = ScaledEffects::from_settings(&settings, RenderScale::IDENTITY);
    assert_eq!(fx.blend, BlendMode::Normal);
    assert!(fx.stroke.is_some());

    settings.content_kind = ContentKind::Image;
    let fx = ScaledEffects::from_settings(&settings, RenderScale::IDENTITY);
    assert_eq!(fx.blend, BlendMode::Multiply);
    assert!(fx.stroke.is_none());
}

#[test]
fn select_requires_the_active_content() {
    let text = WatermarkSettings {
        text: "hi".to_owned(),
        ..Default::default()
    };
    assert!(matches!(Watermark::select(&text, None), Ok(Watermark::Text("hi"))));

    let image = WatermarkSettings {
        content_kind: ContentKind::Image,
        ..Default::default()
    };
    assert!(matches!(
        Watermark::select(&image, None),
        Err(FiligraneError::Validation(_))
    ));
    let file = ImageFile::from_decoded("m.png", PreparedImage::solid(2, 2, [0, 0, 0, 255]));
    assert!(matches!(
        Watermark::select(&image, Some(&file)),
        Ok(Watermark::Image(_))
    ));

    let empty = WatermarkSettings::default();
    assert!(Watermark::select(&empty, None).is_err());
}

#[test]
fn image_watermark_prepares_at_render_size() {
    let settings = WatermarkSettings {
        content_kind: ContentKind::Image,
        size: 50.0,
        ..Default::default()
    };
    let file = ImageFile::from_decoded("m.png", PreparedImage::solid(20, 10, [0, 0, 0, 255]));
    let mut fonts = FontRegistry::new();
    let r = WatermarkRenderer::new(&settings, RenderScale::from_widths(400, 200));
    let prepared = r
        .prepare(Watermark::Image(&file), PixelSize::new(400, 200), &mut fonts)
        .unwrap();
    // 50% of 200 = 100 original px on the long side, halved for the preview.
    assert_eq!(prepared.size(), Size::new(50.0, 25.0));
}

#[test]
fn text_watermark_with_unknown_font_fails_predictably() {
    let settings = WatermarkSettings {
        text: "hello".to_owned(),
        font_family: "Nope Sans".to_owned(),
        ..Default::default()
    };
    let mut fonts = FontRegistry::new();
    let r = WatermarkRenderer::new(&settings, RenderScale::IDENTITY);
    let err = r
        .prepare(Watermark::Text("hello"), PixelSize::new(10, 10), &mut fonts)
        .unwrap_err();
    assert!(matches!(err, FiligraneError::FontNotRegistered(_)));
}

#[test]
fn draw_all_places_every_instance() {
    let settings = WatermarkSettings {
        content_kind: ContentKind::Image,
        size: 20.0,
        opacity: 100.0,
        ..Default::default()
    };
    let file = ImageFile::from_decoded("m.png", PreparedImage::solid(1, 1, [255, 0, 0, 255]));
    let mut fonts = FontRegistry::new();
    let r = WatermarkRenderer::new(&settings, RenderScale::IDENTITY);
    let prepared = r
        .prepare(Watermark::Image(&file), PixelSize::new(50, 50), &mut fonts)
        .unwrap();
    assert_eq!(prepared.size(), Size::new(10.0, 10.0));

    let mut surface = CpuSurface::default();
    surface.reset(PixelSize::new(50, 50)).unwrap();
    let placements = [placement(0.0, 0.0, 0.0), placement(30.0, 30.0, 0.0)];
    r.draw_all(&mut surface, &prepared, &placements, 0).unwrap();
    let f = surface.snapshot();
    assert_eq!(f.pixel(5, 5).map(|p| p[3]), Some(255));
    assert_eq!(f.pixel(35, 35).map(|p| p[3]), Some(255));
    assert_eq!(f.pixel(20, 20).map(|p| p[3]), Some(0));
}
