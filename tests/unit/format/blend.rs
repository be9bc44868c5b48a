use super::*;

#[test]
fn channel_ops() {
    assert_eq!(BlendMode::Normal.apply(10, 200), 10);
    assert_eq!(BlendMode::Additive.apply(100, 200), 255);
    assert_eq!(BlendMode::Subtractive.apply(100, 60), 0);
    assert_eq!(BlendMode::Subtractive.apply(60, 100), 40);
    assert_eq!(BlendMode::Multiply.apply(255, 77), 77);
    assert_eq!(BlendMode::Multiply.apply(0, 77), 0);
    assert_eq!(BlendMode::Difference.apply(10, 200), 190);
}

#[test]
fn serde_names_are_snake_case() {
    let m: BlendMode = serde_json::from_str("\"subtractive\"").unwrap();
    assert_eq!(m, BlendMode::Subtractive);
    assert_eq!(
        serde_json::to_string(&BlendMode::Normal).unwrap(),
        "\"normal\""
    );
}
