use std::sync::Arc;

use blitcore::{
    Area, BlendMode, Color32, ColorFormat, CoherencyManager, DispatchOpts, Dispatcher, DrawTask,
    ImageDescriptor, ImageHeader, Point, SCALE_NONE, TargetBuffer, TaskQueue, create_unit, write_px,
};

fn checker(cf: ColorFormat, size: u32, a: Color32, b: Color32) -> anyhow::Result<ImageDescriptor> {
    let hdr = ImageHeader::new(cf, size, size);
    let mut data = vec![0u8; hdr.byte_len()];
    let px = cf.size();
    for y in 0..size {
        for x in 0..size {
            let c = if (x / 4 + y / 4) % 2 == 0 { a } else { b };
            let off = (y * size + x) as usize * px;
            write_px(cf, &mut data[off..off + px], c);
        }
    }
    Ok(ImageDescriptor::new(hdr, data)?)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let opts = DispatchOpts::default()
        .with_parallel(true)
        .with_env_overrides()?;
    let coherency = Arc::new(CoherencyManager::default());
    let mut dispatcher = Dispatcher::new(coherency.clone(), opts.clone())?;
    for kind in &opts.units {
        dispatcher.register(create_unit(*kind, coherency.clone(), opts.cache_maintenance));
    }

    let mut target = TargetBuffer::new(Area::new(0, 0, 159, 119), ColorFormat::Rgb565)?;
    target.fill(Color32::opaque(18, 20, 28));

    let board = checker(
        ColorFormat::Rgb565,
        16,
        Color32::opaque(240, 240, 240),
        Color32::opaque(40, 40, 40),
    )?;
    let glass = checker(
        ColorFormat::Argb8888,
        32,
        Color32::new(255, 80, 0, 200),
        Color32::new(0, 120, 255, 90),
    )?;

    let mut queue = TaskQueue::new();
    queue.push(
        DrawTask::new(board.clone(), Area::new(0, 0, 159, 59))
            .with_image_area(Area::new(0, 0, 15, 15))
            .with_tile(true),
    );
    queue.push(DrawTask::new(glass.clone(), Area::new(10, 70, 41, 101)));
    queue.push(DrawTask::new(glass.clone(), Area::new(60, 70, 91, 101)).with_opa(128));
    queue.push(
        DrawTask::new(glass.clone(), Area::new(110, 70, 141, 101)).with_blend(BlendMode::Additive),
    );
    queue.push(
        DrawTask::new(glass, Area::new(64, 14, 95, 45))
            .with_clip(Area::new(0, 0, 159, 119))
            .with_rotation(300)
            .with_scale(SCALE_NONE * 3 / 2, SCALE_NONE * 3 / 2)
            .with_pivot(Point::new(16, 16))
            .with_antialias(true),
    );
    queue.push(DrawTask::new(board, Area::new(200, 200, 215, 215)));

    let stats = dispatcher.dispatch(&mut queue, &mut target)?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    for (id, kind, name) in dispatcher.units() {
        println!("unit {} = {name} ({kind})", id.0);
    }
    for rec in queue.iter() {
        let unit = rec
            .unit
            .map(|u| format!("unit {}", u.0))
            .unwrap_or_else(|| "-".to_string());
        println!("task {}: {:?} [{unit}]", rec.id.0, rec.state);
    }
    println!("{:?}", coherency.stats());
    Ok(())
}
