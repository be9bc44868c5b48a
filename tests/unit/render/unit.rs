use super::*;
use crate::draw::image::ImageHeader;
use crate::foundation::core::SCALE_NONE;

struct OnlyRgb565;

impl DrawUnit for OnlyRgb565 {
    fn kind(&self) -> UnitKind {
        UnitKind::Dma2d
    }

    fn supports(&self, cf: ColorFormat, op: OpKind) -> bool {
        cf == ColorFormat::Rgb565 && !matches!(op, OpKind::Tile | OpKind::Transform)
    }

    fn execute(
        &mut self,
        _task: &DrawTask,
        _image: &ImageDescriptor,
        _target: &mut TargetBuffer,
        _clip: &Area,
    ) -> BlitResult<()> {
        Ok(())
    }
}

fn task(cf: ColorFormat) -> DrawTask {
    let img = ImageDescriptor::new(ImageHeader::new(cf, 2, 2), vec![0u8; 16]).unwrap();
    DrawTask::new(img, Area::new(0, 0, 1, 1))
}

#[test]
fn plain_task_needs_read_write_and_blend() {
    let ops = required_ops(
        &task(ColorFormat::Rgb565),
        ColorFormat::Rgb565,
        ColorFormat::Argb8888,
    );
    assert_eq!(
        ops.as_slice(),
        &[
            (ColorFormat::Rgb565, OpKind::ReadSource),
            (ColorFormat::Argb8888, OpKind::WriteTarget),
            (ColorFormat::Rgb565, OpKind::Blend(BlendMode::Normal)),
        ]
    );
}

#[test]
fn tile_and_transform_add_ops() {
    let t = task(ColorFormat::Rgb565)
        .with_tile(true)
        .with_scale(SCALE_NONE * 2, SCALE_NONE);
    let ops = required_ops(&t, ColorFormat::Rgb565, ColorFormat::Rgb565);
    assert!(ops.contains(&(ColorFormat::Rgb565, OpKind::Tile)));
    assert!(ops.contains(&(ColorFormat::Rgb565, OpKind::Transform)));
}

#[test]
fn default_check_reports_first_missing_capability() {
    let unit = OnlyRgb565;
    let rgb565 = TargetBuffer::new(Area::new(0, 0, 3, 3), ColorFormat::Rgb565).unwrap();
    let argb = TargetBuffer::new(Area::new(0, 0, 3, 3), ColorFormat::Argb8888).unwrap();

    assert!(unit.check(&task(ColorFormat::Rgb565), &rgb565).is_ok());
    let err = unit.check(&task(ColorFormat::Rgb565), &argb).unwrap_err();
    assert!(err.is_unsupported());
    assert!(err.to_string().contains("WriteTarget"));
    assert!(
        unit.check(&task(ColorFormat::Rgb565).with_tile(true), &rgb565)
            .is_err()
    );
}

#[test]
fn hardware_is_preferred_over_software() {
    assert!(UnitKind::Dma2d.default_preference() < UnitKind::Software.default_preference());
    assert!(UnitKind::Gpu.default_preference() < UnitKind::Software.default_preference());
    assert_eq!(OnlyRgb565.name(), "dma2d");
    assert_eq!(UnitKind::Gpu.to_string(), "gpu");
}
