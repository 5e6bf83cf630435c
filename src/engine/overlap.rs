use std::collections::HashSet;

use tracing::trace;

use crate::model::*;

use super::ValidationError;

// ── Overlap Algorithm ────────────────────────────────────────────

/// Two-way tag decided once per interval, before any slotting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalKind {
    /// Long enough to mean "free anytime"; counted in the summary only.
    AllDay,
    Normal,
}

/// A valid interval, borrowed from its row and tagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classified<'a> {
    pub participant_id: &'a str,
    pub span: Span,
    pub kind: IntervalKind,
}

/// Parse, validate and tag every row. Rows with an unparseable bound or
/// `end <= start` are dropped without error.
pub fn classify(intervals: &[AvailabilityInterval], all_day_threshold_ms: Ms) -> Vec<Classified<'_>> {
    intervals
        .iter()
        .filter_map(|row| {
            let Some(span) = row.span() else {
                trace!(participant_id = %row.participant_id, "dropping malformed interval");
                return None;
            };
            let kind = if span.duration_ms() >= all_day_threshold_ms {
                IntervalKind::AllDay
            } else {
                IntervalKind::Normal
            };
            Some(Classified {
                participant_id: &row.participant_id,
                span,
                kind,
            })
        })
        .collect()
}

/// Floor `t` to a multiple of the slot width. Euclidean, so instants before
/// the epoch floor downwards too.
pub fn grid_start(t: Ms, slot_width_ms: Ms) -> Ms {
    t.div_euclid(slot_width_ms) * slot_width_ms
}

/// Count distinct participants per grid slot, in ascending slot order.
///
/// The grid starts at the floor of the earliest start and runs while the slot
/// start is before the latest end. Intervals are swept in start order with an
/// active list; stretches where nothing is active are skipped by jumping to
/// the grid slot holding the next start, so the cost follows occupied slots
/// rather than the width of the whole range. Empty slots are never emitted.
pub fn count_slots(normal: &[Classified<'_>], slot_width_ms: Ms) -> Vec<RankedSlot> {
    let mut by_start: Vec<&Classified<'_>> = normal.iter().collect();
    by_start.sort_by_key(|c| c.span.start);

    let Some(first) = by_start.first() else {
        return Vec::new();
    };
    let last_end = by_start
        .iter()
        .map(|c| c.span.end)
        .max()
        .unwrap_or(first.span.end);

    let mut slots = Vec::new();
    let mut active: Vec<&Classified<'_>> = Vec::new();
    let mut next = 0;
    let mut slot_start = grid_start(first.span.start, slot_width_ms);

    while slot_start < last_end {
        let slot_end = slot_start.saturating_add(slot_width_ms);

        while next < by_start.len() && by_start[next].span.start < slot_end {
            active.push(by_start[next]);
            next += 1;
        }
        // Half-open: an interval ending exactly at slot_start is out.
        active.retain(|c| c.span.end > slot_start);

        if active.is_empty() {
            match by_start.get(next) {
                Some(upcoming) => {
                    slot_start = grid_start(upcoming.span.start, slot_width_ms);
                    continue;
                }
                None => break,
            }
        }

        let present: HashSet<&str> = active.iter().map(|c| c.participant_id).collect();
        slots.push(RankedSlot {
            slot_start,
            slot_end,
            participant_count: present.len(),
        });
        slot_start = slot_end;
    }

    slots
}

/// Best overlap first; earliest start among equal counts. Stable.
pub fn rank_slots(slots: &mut [RankedSlot]) {
    slots.sort_by(|a, b| {
        b.participant_count
            .cmp(&a.participant_count)
            .then(a.slot_start.cmp(&b.slot_start))
    });
}

/// The whole pipeline: validate, partition, slot, rank.
///
/// Only a non-positive width is rejected here; range policy belongs to
/// [`super::OverlapEngine`].
pub fn compute_overlap(
    intervals: &[AvailabilityInterval],
    slot_width_ms: Ms,
    all_day_threshold_ms: Ms,
) -> Result<OverlapReport, ValidationError> {
    if slot_width_ms <= 0 {
        return Err(ValidationError::NonPositiveSlotWidth(slot_width_ms));
    }

    let (all_day, normal): (Vec<_>, Vec<_>) = classify(intervals, all_day_threshold_ms)
        .into_iter()
        .partition(|c| c.kind == IntervalKind::AllDay);

    let all_day_count = all_day
        .iter()
        .map(|c| c.participant_id)
        .collect::<HashSet<_>>()
        .len();

    let mut slots = count_slots(&normal, slot_width_ms);
    rank_slots(&mut slots);

    Ok(OverlapReport {
        slots,
        all_day_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: Ms = HOUR_MS;
    const M: Ms = MINUTE_MS;

    fn normal(participant_id: &str, start: Ms, end: Ms) -> Classified<'_> {
        Classified {
            participant_id,
            span: Span::new(start, end),
            kind: IntervalKind::Normal,
        }
    }

    fn slot(start: Ms, end: Ms, count: usize) -> RankedSlot {
        RankedSlot {
            slot_start: start,
            slot_end: end,
            participant_count: count,
        }
    }

    // ── grid_start ───────────────────────────────────────

    #[test]
    fn grid_start_floors_to_width() {
        assert_eq!(grid_start(9 * H + 17 * M, 30 * M), 9 * H);
        assert_eq!(grid_start(9 * H + 30 * M, 30 * M), 9 * H + 30 * M);
        assert_eq!(grid_start(0, 30 * M), 0);
    }

    #[test]
    fn grid_start_before_epoch_floors_down() {
        assert_eq!(grid_start(-1, 30 * M), -30 * M);
        assert_eq!(grid_start(-30 * M, 30 * M), -30 * M);
    }

    // ── classify ─────────────────────────────────────────

    #[test]
    fn classify_tags_by_duration() {
        let rows = vec![
            AvailabilityInterval::from_ms("r", "a", 0, 23 * H + 29 * M),
            AvailabilityInterval::from_ms("r", "b", 0, 23 * H + 30 * M),
            AvailabilityInterval::from_ms("r", "c", 0, 48 * H),
        ];
        let kinds: Vec<_> = classify(&rows, 23 * H + 30 * M)
            .into_iter()
            .map(|c| (c.participant_id, c.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("a", IntervalKind::Normal),
                ("b", IntervalKind::AllDay),
                ("c", IntervalKind::AllDay),
            ]
        );
    }

    #[test]
    fn classify_drops_invalid_rows() {
        let rows = vec![
            AvailabilityInterval::from_ms("r", "a", H, H),
            AvailabilityInterval::from_ms("r", "b", 2 * H, H),
            AvailabilityInterval::new("r", "c", "soon", "later"),
            AvailabilityInterval::new("r", "d", "1970-01-01T01:00:00Z", ""),
            AvailabilityInterval::from_ms("r", "e", H, 2 * H),
        ];
        let kept = classify(&rows, 24 * H);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].participant_id, "e");
    }

    // ── count_slots ──────────────────────────────────────

    #[test]
    fn count_slots_empty() {
        assert!(count_slots(&[], 30 * M).is_empty());
    }

    #[test]
    fn count_slots_single_interval_off_grid() {
        // 09:10–09:50 touches two 30-min slots anchored at 09:00.
        let intervals = vec![normal("a", 9 * H + 10 * M, 9 * H + 50 * M)];
        assert_eq!(
            count_slots(&intervals, 30 * M),
            vec![
                slot(9 * H, 9 * H + 30 * M, 1),
                slot(9 * H + 30 * M, 10 * H, 1),
            ]
        );
    }

    #[test]
    fn count_slots_boundary_is_exclusive() {
        let intervals = vec![normal("a", 9 * H, 10 * H), normal("b", 10 * H, 11 * H)];
        assert_eq!(
            count_slots(&intervals, 60 * M),
            vec![slot(9 * H, 10 * H, 1), slot(10 * H, 11 * H, 1)]
        );
    }

    #[test]
    fn count_slots_skips_gaps() {
        let intervals = vec![normal("a", 0, H), normal("b", 1000 * H, 1001 * H)];
        let slots = count_slots(&intervals, 30 * M);
        assert_eq!(
            slots,
            vec![
                slot(0, 30 * M, 1),
                slot(30 * M, H, 1),
                slot(1000 * H, 1000 * H + 30 * M, 1),
                slot(1000 * H + 30 * M, 1001 * H, 1),
            ]
        );
    }

    #[test]
    fn count_slots_counts_participants_not_intervals() {
        let intervals = vec![
            normal("a", 9 * H, 10 * H),
            normal("a", 9 * H + 15 * M, 9 * H + 45 * M),
            normal("b", 9 * H, 9 * H + 30 * M),
        ];
        assert_eq!(
            count_slots(&intervals, 30 * M),
            vec![
                slot(9 * H, 9 * H + 30 * M, 2),
                slot(9 * H + 30 * M, 10 * H, 1),
            ]
        );
    }

    #[test]
    fn count_slots_long_interval_keeps_earlier_active() {
        // "a" starts first and outlives "b"; the sweep must not drop it.
        let intervals = vec![normal("b", 9 * H, 9 * H + 30 * M), normal("a", 8 * H, 11 * H)];
        let slots = count_slots(&intervals, 60 * M);
        assert_eq!(
            slots,
            vec![
                slot(8 * H, 9 * H, 1),
                slot(9 * H, 10 * H, 2),
                slot(10 * H, 11 * H, 1),
            ]
        );
    }

    #[test]
    fn count_slots_huge_width_single_slot() {
        let intervals = vec![normal("a", 9 * H, 10 * H), normal("b", 20 * H, 21 * H)];
        let width = 365 * 24 * H;
        let slots = count_slots(&intervals, width);
        assert_eq!(slots, vec![slot(0, width, 2)]);
    }

    // ── rank_slots ───────────────────────────────────────

    #[test]
    fn rank_by_count_then_start() {
        let mut slots = vec![
            slot(0, 10, 1),
            slot(10, 20, 3),
            slot(20, 30, 1),
            slot(30, 40, 3),
            slot(40, 50, 2),
        ];
        rank_slots(&mut slots);
        assert_eq!(
            slots,
            vec![
                slot(10, 20, 3),
                slot(30, 40, 3),
                slot(40, 50, 2),
                slot(0, 10, 1),
                slot(20, 30, 1),
            ]
        );
    }

    // ── compute_overlap ──────────────────────────────────

    #[test]
    fn compute_rejects_non_positive_width() {
        assert_eq!(
            compute_overlap(&[], 0, 24 * H),
            Err(ValidationError::NonPositiveSlotWidth(0))
        );
        assert_eq!(
            compute_overlap(&[], -5, 24 * H),
            Err(ValidationError::NonPositiveSlotWidth(-5))
        );
    }

    #[test]
    fn compute_all_day_only_yields_no_slots() {
        let rows = vec![
            AvailabilityInterval::from_ms("r", "a", 0, 24 * H),
            AvailabilityInterval::from_ms("r", "a", 24 * H, 48 * H),
            AvailabilityInterval::from_ms("r", "b", 0, 30 * H),
        ];
        let report = compute_overlap(&rows, 30 * M, 23 * H + 30 * M).unwrap();
        assert!(report.slots.is_empty());
        assert_eq!(report.all_day_count, 2);
    }
}
