use super::*;

fn assert_close(a: &[KPoint; 4], b: &[KPoint; 4]) {
    for (p, q) in a.iter().zip(b) {
        assert!(
            (p.x - q.x).abs() < 1e-9 && (p.y - q.y).abs() < 1e-9,
            "{p:?} != {q:?}"
        );
    }
}

#[test]
fn zero_rotation_matches_axis_aligned_corners() {
    let area = Area::new(12, 7, 43, 22);
    for pivot in [Point::new(0, 0), Point::new(16, 8), Point::new(-100, 300)] {
        let m = transform_matrix(area.origin(), pivot, 0, SCALE_NONE, SCALE_NONE);
        assert_close(&transformed_quad(m, &area), &blit_corners(&area));
    }
}

#[test]
fn quarter_turn_about_center() {
    let area = Area::new(0, 0, 9, 9);
    let m = transform_matrix(area.origin(), Point::new(5, 5), 900, SCALE_NONE, SCALE_NONE);
    let q = transformed_quad(m, &area);
    // Top-left corner swings to the top-right.
    assert_close(
        &q,
        &[
            KPoint::new(10.0, 0.0),
            KPoint::new(10.0, 10.0),
            KPoint::new(0.0, 10.0),
            KPoint::new(0.0, 0.0),
        ],
    );
}

#[test]
fn scale_is_relative_to_pivot_and_origin() {
    let area = Area::new(100, 50, 109, 59);
    let m = transform_matrix(area.origin(), Point::new(0, 0), 0, 512, 128);
    let q = transformed_quad(m, &area);
    assert_close(
        &q,
        &[
            KPoint::new(100.0, 50.0),
            KPoint::new(120.0, 50.0),
            KPoint::new(120.0, 55.0),
            KPoint::new(100.0, 55.0),
        ],
    );
}

#[test]
fn texel_map_reproduces_quad() {
    let area = Area::new(3, 4, 10, 9);
    let m = transform_matrix(area.origin(), Point::new(2, 1), 300, 300, 200);
    let q = transformed_quad(m, &area);
    let t = texel_to_quad(&q, 8.0, 6.0);
    let mapped = [
        t * KPoint::new(0.0, 0.0),
        t * KPoint::new(8.0, 0.0),
        t * KPoint::new(8.0, 6.0),
        t * KPoint::new(0.0, 6.0),
    ];
    assert_close(&mapped, &q);
}

#[test]
fn bounds_cover_fractional_quads() {
    let quad = [
        KPoint::new(0.5, 0.25),
        KPoint::new(4.0, 0.25),
        KPoint::new(4.0, 3.0),
        KPoint::new(0.5, 3.0),
    ];
    assert_eq!(quad_bounds(&quad), Area::new(0, 0, 3, 2));
}
