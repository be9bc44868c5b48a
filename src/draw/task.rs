use crate::draw::image::ImageSource;
use crate::format::blend::BlendMode;
use crate::foundation::core::{Area, OPA_COVER, Opa, Point, SCALE_NONE};
use crate::foundation::error::{BlitError, BlitResult};
use crate::render::unit::UnitId;

/// One "draw this image here" instruction.
///
/// Read-only while a unit executes it.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawTask {
    /// Pixels to draw.
    pub src: ImageSource,
    /// Natural placement of the image (one tile when tiling); `coords` when unset.
    pub image_area: Option<Area>,
    /// Requested destination area.
    pub coords: Area,
    /// Nothing outside this area may change.
    pub clip_area: Area,
    /// Constant opacity.
    pub opa: Opa,
    /// Blend mode.
    pub blend_mode: BlendMode,
    /// Rotation in tenths of a degree.
    pub rotation: i32,
    /// Horizontal scale, [`SCALE_NONE`] = 1.0.
    pub scale_x: i32,
    /// Vertical scale, [`SCALE_NONE`] = 1.0.
    pub scale_y: i32,
    /// Rotation/scale anchor, relative to the image's top-left corner.
    pub pivot: Point,
    /// Repeat the image across `coords`.
    pub tile: bool,
    /// Sample with filtering.
    pub antialias: bool,
}

impl DrawTask {
    /// Opaque, untransformed draw of `src` at `coords`, clipped to `coords`.
    pub fn new(src: impl Into<ImageSource>, coords: Area) -> Self {
        Self {
            src: src.into(),
            image_area: None,
            coords,
            clip_area: coords,
            opa: OPA_COVER,
            blend_mode: BlendMode::Normal,
            rotation: 0,
            scale_x: SCALE_NONE,
            scale_y: SCALE_NONE,
            pivot: Point::default(),
            tile: false,
            antialias: false,
        }
    }

    /// Declare the image placement (the anchor tile when tiling).
    pub fn with_image_area(mut self, area: Area) -> Self {
        self.image_area = Some(area);
        self
    }

    /// Restrict drawing to `clip`.
    pub fn with_clip(mut self, clip: Area) -> Self {
        self.clip_area = clip;
        self
    }

    /// Set the constant opacity.
    pub fn with_opa(mut self, opa: Opa) -> Self {
        self.opa = opa;
        self
    }

    /// Set the blend mode.
    pub fn with_blend(mut self, mode: BlendMode) -> Self {
        self.blend_mode = mode;
        self
    }

    /// Rotate by tenths of a degree around the pivot.
    pub fn with_rotation(mut self, tenths_of_degree: i32) -> Self {
        self.rotation = tenths_of_degree;
        self
    }

    /// Scale around the pivot, [`SCALE_NONE`] meaning 1.0.
    pub fn with_scale(mut self, scale_x: i32, scale_y: i32) -> Self {
        self.scale_x = scale_x;
        self.scale_y = scale_y;
        self
    }

    /// Set the rotation/scale anchor.
    pub fn with_pivot(mut self, pivot: Point) -> Self {
        self.pivot = pivot;
        self
    }

    /// Repeat the image across the destination area.
    pub fn with_tile(mut self, tile: bool) -> Self {
        self.tile = tile;
        self
    }

    /// Sample with bilinear filtering.
    pub fn with_antialias(mut self, antialias: bool) -> Self {
        self.antialias = antialias;
        self
    }

    /// Return `true` when rotation or scale is requested.
    pub fn has_transform(&self) -> bool {
        self.rotation != 0 || self.scale_x != SCALE_NONE || self.scale_y != SCALE_NONE
    }

    /// Declared image placement, defaulting to `coords`.
    pub fn image_area(&self) -> Area {
        self.image_area.unwrap_or(self.coords)
    }

    /// Pixels this task may modify in a buffer covering `bound`, or `None` when there are none.
    pub fn effective_clip(&self, bound: &Area) -> Option<Area> {
        self.coords.intersect(&self.clip_area)?.intersect(bound)
    }
}

/// Position of a task in its queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u32);

/// Why a task retired without drawing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Nothing of the task is visible inside its clip.
    EmptyClip,
    /// Opacity at or below the visibility threshold.
    InvisibleOpacity,
    /// No registered unit can execute the task.
    Unsupported,
}

/// Lifecycle of a task.
///
/// `Pending -> Dispatched -> Executing -> Done`, with `Skipped` reachable from `Dispatched`
/// and `Failed` from `Executing`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// Queued.
    Pending,
    /// Claimed by the dispatcher.
    Dispatched,
    /// Running on a unit.
    Executing,
    /// Completed.
    Done,
    /// Retired without drawing.
    Skipped(SkipReason),
    /// Retired after an unrecoverable error.
    Failed(String),
}

impl TaskState {
    /// Return `true` for `Done`, `Skipped` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Done | TaskState::Skipped(_) | TaskState::Failed(_)
        )
    }

    fn can_advance_to(&self, next: &TaskState) -> bool {
        matches!(
            (self, next),
            (TaskState::Pending, TaskState::Dispatched)
                | (TaskState::Dispatched, TaskState::Executing)
                | (TaskState::Dispatched, TaskState::Skipped(_))
                | (TaskState::Executing, TaskState::Done)
                | (TaskState::Executing, TaskState::Failed(_))
        )
    }

    /// Move to `next`, rejecting transitions outside the lifecycle.
    pub fn advance(&mut self, next: TaskState) -> BlitResult<()> {
        if !self.can_advance_to(&next) {
            return Err(BlitError::validation(format!(
                "invalid task transition {self:?} -> {next:?}"
            )));
        }
        *self = next;
        Ok(())
    }
}

/// A queued task with its bookkeeping.
#[derive(Clone, Debug)]
pub struct TaskRecord {
    /// Queue position.
    pub id: TaskId,
    /// The instruction.
    pub task: DrawTask,
    /// Current lifecycle state.
    pub state: TaskState,
    /// Unit that executed the task.
    pub unit: Option<UnitId>,
}

/// Tasks in submission order.
#[derive(Clone, Debug, Default)]
pub struct TaskQueue {
    records: Vec<TaskRecord>,
}

impl TaskQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task; ids follow submission order.
    pub fn push(&mut self, task: DrawTask) -> TaskId {
        let id = TaskId(self.records.len() as u32);
        self.records.push(TaskRecord {
            id,
            task,
            state: TaskState::Pending,
            unit: None,
        });
        id
    }

    /// Number of tasks, retired ones included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Return `true` when no task is queued.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record of task `id`.
    pub fn get(&self, id: TaskId) -> Option<&TaskRecord> {
        self.records.get(id.0 as usize)
    }

    pub(crate) fn get_mut(&mut self, id: TaskId) -> Option<&mut TaskRecord> {
        self.records.get_mut(id.0 as usize)
    }

    /// State of task `id`.
    pub fn state(&self, id: TaskId) -> Option<&TaskState> {
        self.get(id).map(|r| &r.state)
    }

    /// Records in submission order.
    pub fn iter(&self) -> impl Iterator<Item = &TaskRecord> {
        self.records.iter()
    }

    /// Ids of tasks still waiting to be dispatched.
    pub fn pending(&self) -> Vec<TaskId> {
        self.records
            .iter()
            .filter(|r| r.state == TaskState::Pending)
            .map(|r| r.id)
            .collect()
    }

    /// Drop every retired task; ids of remaining tasks are reassigned in order.
    pub fn retire_finished(&mut self) -> usize {
        let before = self.records.len();
        self.records.retain(|r| !r.state.is_terminal());
        for (i, r) in self.records.iter_mut().enumerate() {
            r.id = TaskId(i as u32);
        }
        before - self.records.len()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/draw/task.rs"]
mod tests;
