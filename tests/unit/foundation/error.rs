use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        FiligraneError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        FiligraneError::surface("x")
            .to_string()
            .contains("surface unavailable:")
    );
    assert!(
        FiligraneError::packaging("x")
            .to_string()
            .contains("packaging error:")
    );
    assert!(
        FiligraneError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
    assert!(
        FiligraneError::font_not_registered("Lobster")
            .to_string()
            .contains("font not registered: Lobster")
    );
}

#[test]
fn decode_error_names_the_input() {
    let err = FiligraneError::decode("IMG_0001.jpg", "unexpected eof");
    let s = err.to_string();
    assert!(s.contains("IMG_0001.jpg"));
    assert!(s.contains("unexpected eof"));
}

#[test]
fn only_surface_errors_abort_a_batch() {
    assert!(FiligraneError::surface("no pixmap").is_batch_fatal());
    assert!(!FiligraneError::decode("a.png", "bad").is_batch_fatal());
    assert!(!FiligraneError::packaging("disk full").is_batch_fatal());
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = FiligraneError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
