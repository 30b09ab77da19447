//! Choosing the part of a long line that is shown.
//!
//! The window starts as the tightest char range covering every match span.
//! Spare columns are split between both sides, then each cut is moved
//! inward to the nearest word boundary if one lies close enough. A cover
//! wider than the budget is trimmed from both edges around its center,
//! falling back to the first span when the trimmed middle holds no match.

use super::width::WidthIndex;
use crate::search::MatchSpan;

pub const ELLIPSIS: &str = "…";
const ELLIPSIS_WIDTH: usize = 1;

/// Farthest a cut moves, in chars, to land on a word boundary.
const SNAP_DISTANCE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Byte offset of the first char kept
    pub start: usize,
    /// Byte offset past the last char kept
    pub end: usize,
    pub leading: bool,
    pub trailing: bool,
    /// The matches did not all fit
    pub truncated: bool,
}

impl Window {
    fn whole(len: usize) -> Self {
        Self {
            start: 0,
            end: len,
            leading: false,
            trailing: false,
            truncated: false,
        }
    }

    pub fn is_partial(&self) -> bool {
        self.leading || self.trailing
    }
}

/// Pick the window of `text` to display within `max_width` columns,
/// counting one column for each ellipsis the window needs.
///
/// `spans` are byte offsets on char boundaries of `text`.
pub fn fit_window(text: &str, spans: &[MatchSpan], max_width: usize) -> Window {
    let index = WidthIndex::new(text);
    if index.total_width() <= max_width {
        return Window::whole(text.len());
    }

    let budget = max_width.saturating_sub(2 * ELLIPSIS_WIDTH);
    let (left, right, truncated) = match cover(&index, spans) {
        None => {
            let right = index.last_within_col(max_width.saturating_sub(ELLIPSIS_WIDTH));
            (0, snap_right(&index, right, 1), false)
        }
        Some((lo, hi)) if index.width(lo, hi) <= budget => {
            let (left, right) = widen(&index, lo, hi, budget);
            (snap_left(&index, left, lo), snap_right(&index, right, hi), false)
        }
        Some((lo, hi)) => {
            let (left, right) = squeeze(&index, lo, hi, budget, spans);
            (left, right, true)
        }
    };

    Window {
        start: index.byte(left),
        end: index.byte(right),
        leading: left > 0,
        trailing: right < index.len(),
        truncated,
    }
}

/// Boundaries enclosing every span.
fn cover(index: &WidthIndex, spans: &[MatchSpan]) -> Option<(usize, usize)> {
    let start = spans.iter().map(|s| s.start).min()?;
    let end = spans.iter().map(|s| s.end).max()?;
    Some((
        index.boundary_at_or_before(start),
        index.boundary_at_or_after(end),
    ))
}

/// Grow `lo..hi` by up to `budget` columns in total, half on each side,
/// handing whatever one side cannot use to the other.
fn widen(index: &WidthIndex, lo: usize, hi: usize, budget: usize) -> (usize, usize) {
    let extra = budget - index.width(lo, hi);

    let mut left = index.first_at_col(index.col(lo).saturating_sub(extra / 2));
    let used_left = index.width(left, lo);
    let right = index.last_within_col(index.col(hi) + (extra - used_left));
    let spare = extra - used_left - index.width(hi, right);

    if spare > 0 && left > 0 {
        left = index.first_at_col(index.col(left).saturating_sub(spare));
    }
    (left, right)
}

/// Cut `lo..hi` down to `budget` columns, keeping the middle. Keeps at
/// least part of one span on screen.
fn squeeze(
    index: &WidthIndex,
    lo: usize,
    hi: usize,
    budget: usize,
    spans: &[MatchSpan],
) -> (usize, usize) {
    let excess = index.width(lo, hi) - budget;
    let left = index.first_at_col(index.col(lo) + excess / 2);
    let right = index.last_within_col(index.col(left) + budget).max(left);
    if shows_any(index, left, right, spans) {
        return (left, right);
    }

    let first = spans.iter().map(|s| s.start).min().unwrap_or(0);
    let left = index.boundary_at_or_before(first);
    let right = index.last_within_col(index.col(left) + budget).max(left);
    (left, right)
}

fn shows_any(index: &WidthIndex, left: usize, right: usize, spans: &[MatchSpan]) -> bool {
    let (start, end) = (index.byte(left), index.byte(right));
    spans.iter().any(|s| s.start.max(start) < s.end.min(end))
}

/// Move a left cut forward onto a boundary, never past `ceiling`.
fn snap_left(index: &WidthIndex, left: usize, ceiling: usize) -> usize {
    if index.is_break(left) {
        return left;
    }
    let ceiling = ceiling.min(left + SNAP_DISTANCE);
    index.break_at_or_after(left, ceiling).unwrap_or(left)
}

/// Move a right cut back onto a boundary, never before `floor`.
fn snap_right(index: &WidthIndex, right: usize, floor: usize) -> usize {
    if index.is_break(right) {
        return right;
    }
    let floor = floor.max(right.saturating_sub(SNAP_DISTANCE));
    index.break_at_or_before(right, floor).unwrap_or(right)
}
