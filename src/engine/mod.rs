mod error;
mod overlap;

pub use error::ValidationError;
pub use overlap::{Classified, IntervalKind, classify, compute_overlap, count_slots, grid_start, rank_slots};

use crate::limits::*;
use crate::model::*;

/// Policy knobs for one engine. The defaults are the production policy; tests
/// widen or shift them to probe edge cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlapConfig {
    pub min_slot_ms: Ms,
    pub max_slot_ms: Ms,
    pub all_day_threshold_ms: Ms,
}

impl Default for OverlapConfig {
    fn default() -> Self {
        Self {
            min_slot_ms: MIN_SLOT_MINUTES * MINUTE_MS,
            max_slot_ms: MAX_SLOT_MINUTES * MINUTE_MS,
            all_day_threshold_ms: ALL_DAY_THRESHOLD_MS,
        }
    }
}

/// Stateless overlap engine: intervals in, ranked slots out.
///
/// Holds nothing but its config, so one instance can be shared freely across
/// tasks and calls never influence each other.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlapEngine {
    config: OverlapConfig,
}

impl OverlapEngine {
    pub fn new(config: OverlapConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OverlapConfig {
        &self.config
    }

    pub fn check_slot_width(&self, slot_width_ms: Ms) -> Result<(), ValidationError> {
        if slot_width_ms <= 0 {
            return Err(ValidationError::NonPositiveSlotWidth(slot_width_ms));
        }
        if slot_width_ms < self.config.min_slot_ms || slot_width_ms > self.config.max_slot_ms {
            return Err(ValidationError::SlotWidthOutOfRange {
                width_ms: slot_width_ms,
                min_ms: self.config.min_slot_ms,
                max_ms: self.config.max_slot_ms,
            });
        }
        Ok(())
    }

    pub fn compute(
        &self,
        intervals: &[AvailabilityInterval],
        slot_width_ms: Ms,
    ) -> Result<OverlapReport, ValidationError> {
        self.check_slot_width(slot_width_ms)?;
        compute_overlap(intervals, slot_width_ms, self.config.all_day_threshold_ms)
    }
}
