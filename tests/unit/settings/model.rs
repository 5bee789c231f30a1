use super::*;
use serde_json::json;

#[test]
fn defaults_match_product_defaults() {
    let s = WatermarkSettings::default();
    assert_eq!(s.size, 25.0);
    assert_eq!(s.opacity, 70.0);
    assert_eq!(s.position, Anchor::BottomRight);
    assert_eq!(s.pattern, Pattern::Single);
    assert_eq!(s.quantity, 1);
    assert_eq!(s.edge_margin, 20.0);
    assert_eq!(s.font_family, "Arial");
    assert_eq!(s.font_size, 24.0);
    assert_eq!(s.font_color, Color::WHITE);
    assert_eq!(s.effects.shadow_blur, 5.0);
    assert_eq!(s.effects.wave_amplitude, 20.0);
    assert_eq!(s.effects.wave_frequency, 0.02);
}

#[test]
fn parses_camel_case_snapshot_and_ignores_unknown_fields() {
    let v = json!({
        "size": 30,
        "opacity": 55,
        "rotation": -15,
        "quantity": 9,
        "position": "middle-center",
        "pattern": "grid",
        "edgeMargin": 12,
        "text": "(c) 2024",
        "fontFamily": "Inter",
        "fontSize": 32,
        "fontColor": "#ff8800",
        "blendMode": "color-dodge",
        "snapToGrid": true,
        "customFonts": [],
        "effects": {
            "shadow": true,
            "shadowColor": "#000000",
            "shadowBlur": 8,
            "shadowOffset": {"x": 2, "y": 3},
            "embossDepth": 5
        }
    });
    let s = WatermarkSettings::from_json_str(&v.to_string()).unwrap();
    assert_eq!(s.position, Anchor::MiddleCenter);
    assert_eq!(s.pattern, Pattern::Grid);
    assert_eq!(s.quantity, 9);
    assert_eq!(s.blend_mode, BlendMode::ColorDodge);
    assert_eq!(s.font_color, Color::rgb(0xff, 0x88, 0x00));
    assert!(s.effects.shadow);
    assert_eq!(s.effects.shadow_offset, Offset { x: 2.0, y: 3.0 });
    // Missing effect fields keep their defaults.
    assert_eq!(s.effects.stroke_width, 1.0);
}

#[test]
fn json_roundtrip_preserves_settings() {
    let mut s = WatermarkSettings::default();
    s.custom_position = Some(Point::new(10.0, 20.0));
    s.blend_mode = BlendMode::Luminosity;
    let text = s.to_json_string().unwrap();
    let back = WatermarkSettings::from_json_str(&text).unwrap();
    assert_eq!(back, s);
}

#[test]
fn clamped_normalizes_producer_values() {
    let s = WatermarkSettings {
        size: 140.0,
        opacity: -3.0,
        quantity: 0,
        edge_margin: -5.0,
        rotation: f64::NAN,
        ..Default::default()
    }
    .clamped();
    assert_eq!(s.size, 100.0);
    assert_eq!(s.opacity, 0.0);
    assert_eq!(s.quantity, 1);
    assert_eq!(s.edge_margin, 0.0);
    assert_eq!(s.rotation, 0.0);
}

#[test]
fn validate_requires_text_for_text_content() {
    let s = WatermarkSettings::default();
    assert!(matches!(s.validate(), Err(FiligraneError::Validation(_))));

    let s = WatermarkSettings {
        text: "hello".to_owned(),
        ..Default::default()
    };
    s.validate().unwrap();

    let s = WatermarkSettings {
        content_kind: ContentKind::Image,
        ..Default::default()
    };
    s.validate().unwrap();
}

#[test]
fn validate_rejects_zero_quantity_for_multi_patterns() {
    let s = WatermarkSettings {
        content_kind: ContentKind::Image,
        pattern: Pattern::Grid,
        quantity: 0,
        ..Default::default()
    };
    assert!(s.validate().is_err());
}

#[test]
fn blend_mode_names_are_css_like() {
    assert_eq!(
        serde_json::to_value(BlendMode::HardLight).unwrap(),
        json!("hard-light")
    );
    assert_eq!(BlendMode::ALL.len(), 16);
}
