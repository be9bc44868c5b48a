use std::collections::HashMap;
use std::sync::Mutex;

use super::*;
use crate::draw::image::{ImageHeader, ImageSource};
use crate::format::blend::BlendMode;
use crate::format::color::{Color32, ColorFormat, write_px};
use crate::render::dma2d::{Dma2dDriver, TransferDescriptor, TransferMemory};
use crate::render::unit::OpKind;

const RED: Color32 = Color32::opaque(255, 0, 0);
const BLUE: Color32 = Color32::opaque(0, 0, 255);

fn solid(cf: ColorFormat, w: u32, h: u32, c: Color32) -> ImageDescriptor {
    let hdr = ImageHeader::new(cf, w, h);
    let mut data = vec![0u8; hdr.byte_len()];
    for px in data.chunks_exact_mut(cf.size()) {
        write_px(cf, px, c);
    }
    ImageDescriptor::new(hdr, data).unwrap()
}

fn target() -> TargetBuffer {
    TargetBuffer::new(Area::new(0, 0, 19, 19), ColorFormat::Rgb565).unwrap()
}

#[derive(Clone, Default)]
struct Recording {
    log: Arc<Mutex<Vec<TransferDescriptor>>>,
}

impl Dma2dDriver for Recording {
    fn configure_and_execute(
        &mut self,
        conf: &TransferDescriptor,
        mem: TransferMemory<'_>,
    ) -> BlitResult<()> {
        self.log.lock().unwrap().push(*conf);
        SoftDma2d::new().configure_and_execute(conf, mem)
    }

    fn wait_for_finish(&mut self) -> BlitResult<()> {
        Ok(())
    }
}

/// Claims everything at GPU preference, then fails at execution time.
struct Faulty {
    err: fn() -> BlitError,
}

impl DrawUnit for Faulty {
    fn kind(&self) -> UnitKind {
        UnitKind::Gpu
    }

    fn name(&self) -> &str {
        "faulty"
    }

    fn supports(&self, _cf: ColorFormat, _op: OpKind) -> bool {
        true
    }

    fn execute(
        &mut self,
        _task: &DrawTask,
        _image: &ImageDescriptor,
        _target: &mut TargetBuffer,
        _clip: &Area,
    ) -> BlitResult<()> {
        Err((self.err)())
    }
}

#[test]
fn opts_defaults_and_validation() {
    let opts = DispatchOpts::default();
    assert!(!opts.parallel);
    assert_eq!(opts.max_batch, 16);
    assert!(opts.validate().is_ok());

    let err = DispatchOpts::default()
        .with_threads(Some(0))
        .validate()
        .unwrap_err();
    assert!(matches!(err, BlitError::Config(_)));

    let err = Dispatcher::from_opts(DispatchOpts::default().with_units(Vec::new())).unwrap_err();
    assert!(matches!(err, BlitError::Config(_)));
}

#[test]
fn opts_from_json_keeps_missing_defaults() {
    let opts = DispatchOpts::from_json(r#"{"parallel": true, "units": ["gpu", "software"]}"#)
        .unwrap();
    assert!(opts.parallel);
    assert_eq!(opts.units, vec![UnitKind::Gpu, UnitKind::Software]);
    assert_eq!(opts.max_batch, 16);
    assert!(opts.cache_maintenance);

    assert!(matches!(
        DispatchOpts::from_json(r#"{"max_batch": 0}"#),
        Err(BlitError::Config(_))
    ));
    assert!(matches!(
        DispatchOpts::from_json("not json"),
        Err(BlitError::Config(_))
    ));
}

#[test]
fn overrides_parse_and_validate() {
    let vars: HashMap<&str, &str> = [
        ("BLITCORE_PARALLEL", "on"),
        ("BLITCORE_THREADS", "3"),
        ("BLITCORE_MAX_BATCH", " 4 "),
    ]
    .into_iter()
    .collect();
    let opts = DispatchOpts::default()
        .with_overrides_from(|k| vars.get(k).map(|v| v.to_string()))
        .unwrap();
    assert!(opts.parallel);
    assert_eq!(opts.threads, Some(3));
    assert_eq!(opts.max_batch, 4);

    let unchanged = DispatchOpts::default()
        .with_overrides_from(|_| None)
        .unwrap();
    assert_eq!(unchanged, DispatchOpts::default());

    for (key, value) in [
        ("BLITCORE_PARALLEL", "maybe"),
        ("BLITCORE_THREADS", "0"),
        ("BLITCORE_THREADS", "many"),
    ] {
        let err = DispatchOpts::default()
            .with_overrides_from(|k| (k == key).then(|| value.to_string()))
            .unwrap_err();
        assert!(matches!(err, BlitError::Config(_)), "{key}={value}");
    }
}

#[test]
fn select_prefers_lowest_score_then_registration_order() {
    let d = Dispatcher::from_opts(DispatchOpts::default()).unwrap();
    let t = target();

    let opaque = DrawTask::new(solid(ColorFormat::Rgb565, 4, 4, RED), Area::new(0, 0, 3, 3));
    assert_eq!(d.select(&opaque, &t), Some(UnitId(0)));

    // DMA2D has no tiling.
    let tiled = opaque.clone().with_tile(true);
    assert_eq!(d.select(&tiled, &t), Some(UnitId(1)));

    // Neither accelerator does difference blending.
    let diff = opaque.with_blend(BlendMode::Difference);
    assert_eq!(d.select(&diff, &t), Some(UnitId(2)));

    let kinds: Vec<UnitKind> = d.units().map(|(_, kind, _)| kind).collect();
    assert_eq!(kinds, vec![UnitKind::Dma2d, UnitKind::Gpu, UnitKind::Software]);
}

#[test]
fn invisible_task_is_skipped_without_hardware_activity() {
    let rec = Recording::default();
    let coherency = Arc::new(CoherencyManager::default());
    let mut d = Dispatcher::new(coherency.clone(), DispatchOpts::default()).unwrap();
    d.register(Box::new(Dma2dUnit::new(
        Box::new(rec.clone()),
        coherency.clone(),
        Dma2dOpts::default(),
    )));

    let mut queue = TaskQueue::new();
    let id = queue.push(
        DrawTask::new(solid(ColorFormat::Rgb565, 4, 4, RED), Area::new(0, 0, 3, 3)).with_opa(0),
    );
    let mut t = target();
    let before = t.clone();

    let stats = d.dispatch(&mut queue, &mut t).unwrap();

    assert_eq!(
        queue.state(id),
        Some(&TaskState::Skipped(SkipReason::InvisibleOpacity))
    );
    assert_eq!((stats.total, stats.skipped, stats.done), (1, 1, 0));
    assert!(rec.log.lock().unwrap().is_empty());
    assert_eq!(coherency.stats(), Default::default());
    assert_eq!(t, before);
}

#[test]
fn opacity_at_threshold_is_invisible_and_just_above_is_drawn() {
    let mut d = Dispatcher::from_opts(DispatchOpts::default()).unwrap();
    let mut queue = TaskQueue::new();
    let img = solid(ColorFormat::Rgb565, 4, 4, RED);
    let at = queue.push(DrawTask::new(img.clone(), Area::new(0, 0, 3, 3)).with_opa(OPA_MIN));
    let above = queue.push(DrawTask::new(img, Area::new(8, 8, 11, 11)).with_opa(OPA_MIN + 1));
    let mut t = target();

    d.dispatch(&mut queue, &mut t).unwrap();

    assert_eq!(
        queue.state(at),
        Some(&TaskState::Skipped(SkipReason::InvisibleOpacity))
    );
    assert_eq!(queue.state(above), Some(&TaskState::Done));
}

#[test]
fn empty_clip_is_skipped_and_buffer_untouched() {
    let mut d = Dispatcher::from_opts(DispatchOpts::default()).unwrap();
    let mut queue = TaskQueue::new();
    let img = solid(ColorFormat::Rgb565, 4, 4, RED);
    let outside = queue.push(DrawTask::new(img.clone(), Area::new(30, 30, 33, 33)));
    let clipped_away = queue.push(
        DrawTask::new(img, Area::new(0, 0, 3, 3)).with_clip(Area::new(10, 10, 12, 12)),
    );
    let mut t = target();
    let before = t.clone();

    let stats = d.dispatch(&mut queue, &mut t).unwrap();

    for id in [outside, clipped_away] {
        assert_eq!(
            queue.state(id),
            Some(&TaskState::Skipped(SkipReason::EmptyClip))
        );
    }
    assert_eq!(stats.skipped, 2);
    assert_eq!(t, before);
}

#[test]
fn overlapping_tasks_keep_submission_order() {
    for parallel in [false, true] {
        let opts = DispatchOpts::default()
            .with_parallel(parallel)
            .with_threads(Some(2));
        let mut d = Dispatcher::from_opts(opts).unwrap();
        let mut queue = TaskQueue::new();
        queue.push(DrawTask::new(
            solid(ColorFormat::Rgb565, 10, 10, RED),
            Area::new(0, 0, 9, 9),
        ));
        queue.push(DrawTask::new(
            solid(ColorFormat::Rgb565, 10, 10, BLUE),
            Area::new(5, 5, 14, 14),
        ));
        let mut t = target();

        let stats = d.dispatch(&mut queue, &mut t).unwrap();

        assert_eq!(stats.done, 2);
        assert_eq!(t.pixel(2, 2), Some(RED));
        assert_eq!(t.pixel(7, 7), Some(BLUE), "parallel={parallel}");
        assert_eq!(t.pixel(12, 12), Some(BLUE));
        assert_eq!(t.pixel(17, 2), Some(Color32::opaque(0, 0, 0)));
    }
}

#[test]
fn claim_time_fallback_routes_to_software() {
    let opts = DispatchOpts::default().with_units(vec![UnitKind::Dma2d, UnitKind::Software]);
    let mut d = Dispatcher::from_opts(opts).unwrap();
    let mut queue = TaskQueue::new();
    let id = queue.push(
        DrawTask::new(solid(ColorFormat::Rgb565, 4, 4, RED), Area::new(0, 0, 9, 9))
            .with_image_area(Area::new(0, 0, 3, 3))
            .with_tile(true),
    );
    let mut t = target();

    let stats = d.dispatch(&mut queue, &mut t).unwrap();

    assert_eq!(queue.state(id), Some(&TaskState::Done));
    assert_eq!(queue.get(id).unwrap().unit, Some(UnitId(1)));
    assert_eq!(stats.fallbacks, 1);
    assert_eq!(stats.per_unit.get(&UnitKind::Software), Some(&1));
    assert_eq!(t.pixel(9, 9), Some(RED));
    assert_eq!(t.pixel(10, 10), Some(Color32::opaque(0, 0, 0)));
}

#[test]
fn execute_time_unsupported_falls_back_to_software() {
    let coherency = Arc::new(CoherencyManager::default());
    let mut d = Dispatcher::new(coherency.clone(), DispatchOpts::default()).unwrap();
    let faulty = d.register(Box::new(Faulty {
        err: || BlitError::unsupported("no"),
    }));
    let sw = d.register(Box::new(SoftwareUnit::new(coherency)));
    let mut queue = TaskQueue::new();
    let task = DrawTask::new(solid(ColorFormat::Rgb565, 4, 4, RED), Area::new(0, 0, 3, 3));
    assert_eq!(d.select(&task, &target()), Some(faulty));
    let id = queue.push(task);
    let mut t = target();

    let stats = d.dispatch(&mut queue, &mut t).unwrap();

    assert_eq!(queue.state(id), Some(&TaskState::Done));
    assert_eq!(queue.get(id).unwrap().unit, Some(sw));
    assert_eq!(stats.fallbacks, 1);
    assert_eq!(t.pixel(3, 3), Some(RED));
}

#[test]
fn hardware_error_fails_task_and_queue_continues() {
    let coherency = Arc::new(CoherencyManager::default());
    let mut d = Dispatcher::new(coherency.clone(), DispatchOpts::default()).unwrap();
    d.register(Box::new(Faulty {
        err: || BlitError::hardware("bus fault"),
    }));
    d.register(Box::new(SoftwareUnit::new(coherency)));
    let mut queue = TaskQueue::new();
    let broken = queue.push(DrawTask::new(
        solid(ColorFormat::Rgb565, 4, 4, RED),
        Area::new(0, 0, 3, 3),
    ));
    let mut t = target();

    let stats = d.dispatch(&mut queue, &mut t).unwrap();

    let Some(TaskState::Failed(msg)) = queue.state(broken) else {
        panic!("expected failure, got {:?}", queue.state(broken));
    };
    assert!(msg.contains("bus fault"));
    assert_eq!(stats.failed, 1);
    assert_eq!(t.pixel(0, 0), Some(Color32::opaque(0, 0, 0)));
}

#[test]
fn undecodable_source_fails_only_its_task() {
    let mut d = Dispatcher::from_opts(DispatchOpts::default()).unwrap();
    let mut queue = TaskQueue::new();
    let bad = queue.push(DrawTask::new(
        ImageSource::Encoded(Arc::from(&b"definitely not a png"[..])),
        Area::new(0, 0, 3, 3),
    ));
    let good = queue.push(DrawTask::new(
        solid(ColorFormat::Rgb565, 4, 4, BLUE),
        Area::new(2, 2, 5, 5),
    ));
    let mut t = target();

    let stats = d.dispatch(&mut queue, &mut t).unwrap();

    assert!(matches!(queue.state(bad), Some(TaskState::Failed(_))));
    assert_eq!(queue.state(good), Some(&TaskState::Done));
    assert_eq!((stats.failed, stats.done), (1, 1));
    assert_eq!(t.pixel(2, 2), Some(BLUE));
}

#[test]
fn dispatch_only_claims_pending_tasks() {
    let mut d = Dispatcher::from_opts(DispatchOpts::default()).unwrap();
    let mut queue = TaskQueue::new();
    queue.push(DrawTask::new(
        solid(ColorFormat::Rgb565, 4, 4, RED),
        Area::new(0, 0, 3, 3),
    ));
    let mut t = target();

    assert_eq!(d.dispatch(&mut queue, &mut t).unwrap().total, 1);
    assert_eq!(d.dispatch(&mut queue, &mut t).unwrap().total, 0);
    assert_eq!(queue.retire_finished(), 1);
    assert!(queue.is_empty());
}

fn mixed_queue() -> TaskQueue {
    let mut queue = TaskQueue::new();
    queue.push(DrawTask::new(
        solid(ColorFormat::Rgb565, 8, 8, RED),
        Area::new(0, 0, 7, 7),
    ));
    queue.push(DrawTask::new(
        solid(ColorFormat::Argb8888, 8, 8, Color32::new(0, 200, 40, 128)),
        Area::new(10, 0, 17, 7),
    ));
    queue.push(DrawTask::new(
        solid(ColorFormat::L8, 10, 8, Color32::opaque(90, 90, 90)),
        Area::new(4, 4, 13, 11),
    ));
    queue.push(
        DrawTask::new(solid(ColorFormat::Rgb565, 4, 4, BLUE), Area::new(0, 12, 19, 19))
            .with_image_area(Area::new(0, 12, 3, 15))
            .with_tile(true)
            .with_opa(128),
    );
    queue
}

#[test]
fn parallel_and_sequential_produce_identical_pixels() {
    let mut seq_target = target();
    let mut seq_queue = mixed_queue();
    let seq = Dispatcher::from_opts(DispatchOpts::default())
        .unwrap()
        .dispatch(&mut seq_queue, &mut seq_target)
        .unwrap();

    let mut par_target = target();
    let mut par_queue = mixed_queue();
    let opts = DispatchOpts::default()
        .with_parallel(true)
        .with_threads(Some(4));
    let par = Dispatcher::from_opts(opts)
        .unwrap()
        .dispatch(&mut par_queue, &mut par_target)
        .unwrap();

    assert_eq!(seq.done, 4);
    assert_eq!(par.done, 4);
    assert_eq!(seq.per_unit, par.per_unit);
    assert!(par.batches < seq.batches);
    assert_eq!(seq_target.data(), par_target.data());
}

#[test]
fn dispatch_leaves_no_pending_hardware_writes() {
    let mut d = Dispatcher::from_opts(DispatchOpts::default()).unwrap();
    let mut queue = mixed_queue();
    let mut t = target();

    d.dispatch(&mut queue, &mut t).unwrap();

    assert!(d.coherency().pending_writes().is_empty());
    assert!(d.coherency().stats().cleans > 0);
}
