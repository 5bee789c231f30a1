use super::*;
use serde_json::json;

#[test]
fn parses_hex_forms() {
    let c: Color = serde_json::from_value(json!("#ff0000")).unwrap();
    assert_eq!(c, Color::rgb(255, 0, 0));

    let c: Color = serde_json::from_value(json!("#0000ff80")).unwrap();
    assert_eq!(c, Color::rgba(0, 0, 255, 128));

    let c: Color = serde_json::from_value(json!("#FFF")).unwrap();
    assert_eq!(c, Color::WHITE);
}

#[test]
fn parses_css_rgb_functions() {
    assert_eq!(Color::parse("rgb(1, 2, 3)").unwrap(), Color::rgb(1, 2, 3));
    assert_eq!(
        Color::parse("rgba(99, 102, 241, 0.6)").unwrap(),
        Color::rgba(99, 102, 241, 153)
    );
    assert!(Color::parse("rgb(1, 2)").is_err());
    assert!(Color::parse("rgb(1, 2, 3").is_err());
}

#[test]
fn parses_hsla_object_and_array() {
    let c: Color = serde_json::from_value(json!({"h": 0.0, "s": 1.0, "l": 0.5})).unwrap();
    assert_eq!(c, Color::rgb(255, 0, 0));

    let c: Color = serde_json::from_value(json!([0.0, 0.5, 1.0])).unwrap();
    assert_eq!(c, Color::rgb(0, 128, 255));
}

#[test]
fn rejects_malformed_hex() {
    assert!(Color::parse("#12345").is_err());
    assert!(Color::parse("#gg0000").is_err());
}

#[test]
fn serializes_as_hex_string() {
    assert_eq!(
        serde_json::to_value(Color::rgb(255, 255, 255)).unwrap(),
        json!("#ffffff")
    );
    assert_eq!(
        serde_json::to_value(Color::rgba(0, 0, 0, 0x80)).unwrap(),
        json!("#00000080")
    );
}

#[test]
fn alpha_scaling_clamps() {
    assert_eq!(Color::WHITE.with_alpha_scaled(0.5).a, 128);
    assert_eq!(Color::WHITE.with_alpha_scaled(3.0).a, 255);
    assert_eq!(Color::WHITE.with_alpha_scaled(-1.0).a, 0);
}
