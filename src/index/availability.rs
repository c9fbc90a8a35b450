use chrono::NaiveDate;
use serde::Serialize;

use crate::model::*;

use super::IndexSnapshot;

/// One bookable slot in the day grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub span: Span,
    pub booked: bool,
}

impl IndexSnapshot {
    /// Fixed-step slots from `policy.open` up to `policy.close`, each tagged
    /// booked if any booking overlaps it. A trailing partial step is dropped.
    pub fn slots(&self, hall: &str, date: NaiveDate, policy: &SlotPolicy) -> Vec<Slot> {
        let mut slots = Vec::new();
        if policy.step_minutes == 0 {
            return slots;
        }
        let mut start = policy.open;
        while let Some(end) = start.checked_add_minutes(policy.step_minutes)
            && end <= policy.close
        {
            let span = Span::new(start, end);
            slots.push(Slot {
                span,
                booked: !self.is_available(hall, date, &span),
            });
            start = end;
        }
        slots
    }

    /// Free stretches of `window` on a hall/date, merged and sorted.
    pub fn free_spans(&self, hall: &str, date: NaiveDate, window: &Span) -> Vec<Span> {
        let taken: Vec<Span> = self.overlapping(hall, date, window).map(|o| o.span).collect();
        if taken.is_empty() {
            return vec![*window];
        }
        subtract_intervals(&[*window], &merge_overlapping(&taken))
    }
}

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end
        {
            last.end = last.end.max(span.end);
            continue;
        }
        merged.push(span);
    }
    merged
}

/// `base` minus `to_remove`. Both inputs sorted by start and disjoint.
pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Span::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(Span::new(current_start, current_end));
        }
    }

    result
}
