use crate::foundation::core::Area;

/// Draw tasks grouped into waves of pairwise disjoint clips.
///
/// A task lands one wave after the latest earlier task whose clip overlaps its own, so running
/// the waves in order keeps every overlapping pair in submission order. Each wave lists task
/// indices in ascending order.
pub(crate) struct OverlapWaves {
    waves: Vec<Vec<usize>>,
}

impl OverlapWaves {
    pub(crate) fn new(clips: &[Area]) -> Self {
        let mut level = vec![0usize; clips.len()];
        let mut waves: Vec<Vec<usize>> = Vec::new();

        for (j, clip) in clips.iter().enumerate() {
            let depth = clips[..j]
                .iter()
                .zip(&level)
                .filter(|(earlier, _)| earlier.overlaps(clip))
                .map(|(_, &l)| l + 1)
                .max()
                .unwrap_or(0);
            level[j] = depth;
            if waves.len() <= depth {
                waves.resize_with(depth + 1, Vec::new);
            }
            waves[depth].push(j);
        }

        Self { waves }
    }

    pub(crate) fn len(&self) -> usize {
        self.waves.len()
    }

    /// Waves in execution order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &[usize]> {
        self.waves.iter().map(Vec::as_slice)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/scheduler.rs"]
mod tests;
