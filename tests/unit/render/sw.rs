use super::*;
use crate::draw::image::ImageHeader;
use crate::format::color::Color32;
use crate::foundation::core::Point;

fn l8_ramp(w: u32, h: u32) -> ImageDescriptor {
    let data: Vec<u8> = (0..(w * h) as u8).collect();
    ImageDescriptor::new(ImageHeader::new(ColorFormat::L8, w, h), data).unwrap()
}

fn l8_target(area: Area) -> TargetBuffer {
    TargetBuffer::new(area, ColorFormat::L8).unwrap()
}

#[test]
fn clipped_copy_samples_shifted_origin() {
    let img = l8_ramp(4, 4);
    let task = DrawTask::new(img.clone(), Area::new(10, 10, 13, 13));
    let mut target = l8_target(Area::new(0, 0, 19, 19));
    let clip = Area::new(12, 11, 13, 13);

    SoftwareUnit::default()
        .execute(&task, &img, &mut target, &clip)
        .unwrap();

    assert_eq!(target.pixel(12, 11).unwrap().r, 6);
    assert_eq!(target.pixel(13, 13).unwrap().r, 15);
    assert_eq!(target.pixel(11, 11).unwrap().r, 0);
    assert_eq!(target.pixel(10, 10).unwrap().r, 0);
}

#[test]
fn coords_larger_than_image_only_draw_image_pixels() {
    let img = l8_ramp(2, 2);
    let task = DrawTask::new(img.clone(), Area::new(0, 0, 3, 3));
    let mut target = l8_target(Area::new(0, 0, 3, 3));
    target.fill(Color32::opaque(200, 200, 200));

    SoftwareUnit::default()
        .execute(&task, &img, &mut target, &Area::new(0, 0, 3, 3))
        .unwrap();

    assert_eq!(target.pixel(1, 1).unwrap().r, 3);
    assert_eq!(target.pixel(2, 2).unwrap().r, 200);
}

#[test]
fn constant_opacity_blends() {
    let img = ImageDescriptor::new(
        ImageHeader::new(ColorFormat::Argb8888, 1, 1),
        vec![0u8, 0, 0, 255],
    )
    .unwrap();
    let task = DrawTask::new(img.clone(), Area::new(0, 0, 0, 0)).with_opa(128);
    let mut target = TargetBuffer::new(Area::new(0, 0, 0, 0), ColorFormat::Rgb888).unwrap();
    target.fill(Color32::opaque(255, 255, 255));

    SoftwareUnit::default()
        .execute(&task, &img, &mut target, &Area::new(0, 0, 0, 0))
        .unwrap();

    assert_eq!(target.pixel(0, 0), Some(Color32::opaque(127, 127, 127)));
}

#[test]
fn tiles_repeat_from_anchor() {
    let img = l8_ramp(2, 2);
    let task = DrawTask::new(img.clone(), Area::new(0, 0, 4, 2))
        .with_image_area(Area::new(0, 0, 1, 1))
        .with_tile(true);
    let mut target = l8_target(Area::new(0, 0, 4, 2));

    SoftwareUnit::default()
        .execute(&task, &img, &mut target, &Area::new(0, 0, 4, 2))
        .unwrap();

    let row = |y: i32| -> Vec<u8> { (0..5).map(|x| target.pixel(x, y).unwrap().r).collect() };
    assert_eq!(row(0), vec![0, 1, 0, 1, 0]);
    assert_eq!(row(1), vec![2, 3, 2, 3, 2]);
    assert_eq!(row(2), vec![0, 1, 0, 1, 0]);
}

#[test]
fn half_turn_flips_both_axes() {
    let img = l8_ramp(2, 2);
    let task = DrawTask::new(img.clone(), Area::new(0, 0, 1, 1))
        .with_rotation(1800)
        .with_pivot(Point::new(1, 1));
    let mut target = l8_target(Area::new(0, 0, 1, 1));

    SoftwareUnit::default()
        .execute(&task, &img, &mut target, &Area::new(0, 0, 1, 1))
        .unwrap();

    assert_eq!(target.data(), &[3, 2, 1, 0]);
}

#[test]
fn pending_hardware_writes_are_invalidated_before_cpu_access() {
    let coherency = Arc::new(CoherencyManager::default());
    let img = l8_ramp(2, 2);
    let task = DrawTask::new(img.clone(), Area::new(0, 0, 1, 1));
    let mut target = l8_target(Area::new(0, 0, 7, 7));
    let hw = target.cache_area(&Area::new(0, 0, 3, 3)).unwrap();
    coherency.begin_hw_write(&hw);

    SoftwareUnit::new(coherency.clone())
        .execute(&task, &img, &mut target, &Area::new(0, 0, 1, 1))
        .unwrap();

    assert!(coherency.pending_writes().is_empty());
    assert_eq!(coherency.stats().invalidates, 1);
}

#[test]
fn opaque_copy_rule() {
    assert!(is_opaque_copy(ColorFormat::Rgb565, 255, BlendMode::Normal));
    assert!(is_opaque_copy(ColorFormat::Xrgb8888, OPA_MAX, BlendMode::Normal));
    assert!(!is_opaque_copy(ColorFormat::Argb8888, 255, BlendMode::Normal));
    assert!(!is_opaque_copy(ColorFormat::Rgb565, 200, BlendMode::Normal));
    assert!(!is_opaque_copy(ColorFormat::Rgb565, 255, BlendMode::Additive));
}
