use super::*;

fn rect(cf: ColorFormat, w: usize, h: usize, stride: usize) -> PixelRect {
    PixelRect::new(StridedAddr::new(0, stride, cf.size()), cf, w, h)
}

#[test]
fn same_format_copy_respects_both_strides() {
    let src: Vec<u8> = (0u8..24).collect();
    let s = rect(ColorFormat::L8, 3, 2, 12);
    let mut dst = vec![0u8; 10];
    let d = rect(ColorFormat::L8, 3, 2, 5);
    copy_convert(&src, &s, &mut dst, &d);
    assert_eq!(dst, vec![0, 1, 2, 0, 0, 12, 13, 14, 0, 0]);
}

#[test]
fn converting_copy_changes_layout() {
    let src = vec![10u8, 20, 30, 99];
    let s = rect(ColorFormat::Xrgb8888, 1, 1, 4);
    let mut dst = vec![0u8; 3];
    let d = rect(ColorFormat::Rgb888, 1, 1, 3);
    copy_convert(&src, &s, &mut dst, &d);
    assert_eq!(dst, vec![10, 20, 30]);
}

#[test]
fn blend_over_opaque_destination() {
    let dst = Color32::opaque(0, 0, 0);
    assert_eq!(
        blend_px(Color32::opaque(200, 100, 50), dst, 255, BlendMode::Normal),
        Color32::opaque(200, 100, 50)
    );
    assert_eq!(
        blend_px(Color32::new(255, 255, 255, 128), dst, 255, BlendMode::Normal),
        Color32::opaque(128, 128, 128)
    );
    assert_eq!(
        blend_px(Color32::opaque(255, 255, 255), dst, 0, BlendMode::Normal),
        dst
    );
}

#[test]
fn blend_onto_transparent_keeps_source_color() {
    let out = blend_px(
        Color32::new(40, 80, 120, 100),
        Color32::transparent(),
        255,
        BlendMode::Normal,
    );
    assert_eq!(out, Color32::new(40, 80, 120, 100));
}

#[test]
fn additive_mode_saturates() {
    let out = blend_px(
        Color32::opaque(200, 10, 0),
        Color32::opaque(100, 10, 7),
        255,
        BlendMode::Additive,
    );
    assert_eq!(out, Color32::opaque(255, 20, 7));
}

#[test]
fn identity_map_samples_exact_texels() {
    let data: Vec<u8> = (1u8..=6).collect();
    let tex = Texture {
        data: &data,
        rect: rect(ColorFormat::L8, 3, 2, 3),
    };
    for filter in [TexFilter::PointSample, TexFilter::Bilinear] {
        let mut dst = vec![0u8; 20];
        let d = rect(ColorFormat::L8, 5, 4, 5);
        let n = map_texture(
            &tex,
            filter,
            Affine::translate((1.0, 1.0)),
            &mut dst,
            &d,
            &Area::new(0, 0, 4, 3),
            |s, _| s,
        );
        assert_eq!(n, 6);
        assert_eq!(
            dst,
            vec![0, 0, 0, 0, 0, 0, 1, 2, 3, 0, 0, 4, 5, 6, 0, 0, 0, 0, 0, 0]
        );
    }
}

#[test]
fn region_limits_written_pixels() {
    let data = vec![9u8; 4];
    let tex = Texture {
        data: &data,
        rect: rect(ColorFormat::L8, 2, 2, 2),
    };
    let mut dst = vec![0u8; 4];
    let d = rect(ColorFormat::L8, 2, 2, 2);
    let n = map_texture(
        &tex,
        TexFilter::PointSample,
        Affine::IDENTITY,
        &mut dst,
        &d,
        &Area::new(1, 0, 1, 1),
        |s, _| s,
    );
    assert_eq!(n, 2);
    assert_eq!(dst, vec![0, 9, 0, 9]);
}

#[test]
fn degenerate_map_writes_nothing() {
    let data = vec![9u8; 4];
    let tex = Texture {
        data: &data,
        rect: rect(ColorFormat::L8, 2, 2, 2),
    };
    let mut dst = vec![0u8; 4];
    let d = rect(ColorFormat::L8, 2, 2, 2);
    let n = map_texture(
        &tex,
        TexFilter::PointSample,
        Affine::scale_non_uniform(0.0, 1.0),
        &mut dst,
        &d,
        &Area::new(0, 0, 1, 1),
        |s, _| s,
    );
    assert_eq!(n, 0);
    assert_eq!(dst, vec![0; 4]);
}
