//! Due-set selection.
//!
//! Read-only queries over a snapshot of one kind's items. Every query returns
//! items in a fixed order so repeated calls on the same snapshot agree;
//! shuffling for presentation belongs to the caller.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::core::item::LearnableItem;
use crate::core::ladder::Ladders;
use crate::core::resolver::{is_gate_open, ItemGraph};

/// Skip records that fail validation, with a warning.
fn well_formed<'a>(
    items: &'a [LearnableItem],
    ladders: &'a Ladders,
) -> impl Iterator<Item = &'a LearnableItem> + 'a {
    items.iter().filter(move |item| {
        match item.validate(ladders.for_kind(item.kind())) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(id = %item.id, error = %e, "skipping corrupt record");
                false
            }
        }
    })
}

/// Items in the review cycle whose scheduled time has come.
///
/// Ordered by due time, ties broken by id.
pub fn due_for_review<'a>(
    items: &'a [LearnableItem],
    now: DateTime<Utc>,
    ladders: &'a Ladders,
) -> Vec<&'a LearnableItem> {
    let mut due: Vec<&LearnableItem> = well_formed(items, ladders)
        .filter(|item| ladders.for_kind(item.kind()).is_active(item.stage()))
        .filter(|item| item.progress.next_review_at.is_some_and(|at| at <= now))
        .collect();

    due.sort_by(|a, b| {
        a.progress
            .next_review_at
            .cmp(&b.progress.next_review_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    due
}

/// Locked or new items whose level and prerequisites are satisfied.
///
/// This is both the first-time learning queue (new words) and the set of
/// candidates an unlock pass would open. Ordered by level, then id.
pub fn available_to_learn<'a>(
    items: &'a [LearnableItem],
    graph: &ItemGraph<'_>,
    ladders: &'a Ladders,
) -> Vec<&'a LearnableItem> {
    let mut available: Vec<&LearnableItem> = well_formed(items, ladders)
        .filter(|item| ladders.for_kind(item.kind()).is_pre_active(item.stage()))
        .filter(|item| is_gate_open(item, graph, ladders))
        .collect();

    available.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.id.cmp(&b.id)));
    available
}

/// Unlocked items that have never been answered.
///
/// A freshly unlocked item is shown once as a lesson before it is scheduled.
/// Ordered by unlock time, then id.
pub fn lessons<'a>(items: &'a [LearnableItem], ladders: &'a Ladders) -> Vec<&'a LearnableItem> {
    let mut pending: Vec<&LearnableItem> = well_formed(items, ladders)
        .filter(|item| ladders.for_kind(item.kind()).is_active(item.stage()))
        .filter(|item| item.progress.next_review_at.is_none())
        .collect();

    pending.sort_by(|a, b| {
        a.progress
            .unlocked_at
            .cmp(&b.progress.unlocked_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    pending
}

/// Earliest scheduled review strictly after `now`.
pub fn next_review_at(items: &[LearnableItem], now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    items
        .iter()
        .filter_map(|item| item.progress.next_review_at)
        .filter(|at| *at > now)
        .min()
}

/// Reviews coming due in one forecast window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForecastBucket {
    /// Start of the window (inclusive).
    pub starts_at: DateTime<Utc>,
    /// Reviews falling due in `[starts_at, starts_at + bucket)`.
    pub count: usize,
}

/// Upper bound on the number of forecast buckets.
pub const MAX_FORECAST_BUCKETS: usize = 1_000;

/// Count upcoming reviews per `bucket` over the next `horizon`.
///
/// Reviews already due are not counted; `due_for_review` covers those.
/// Returns an empty forecast for a non-positive bucket or horizon. At most
/// `MAX_FORECAST_BUCKETS` buckets are returned, and the forecast stops early
/// at the end of the representable calendar.
pub fn due_forecast(
    items: &[LearnableItem],
    now: DateTime<Utc>,
    horizon: Duration,
    bucket: Duration,
) -> Vec<ForecastBucket> {
    if bucket <= Duration::zero() || horizon <= Duration::zero() {
        return Vec::new();
    }

    let bucket_ms = bucket.num_milliseconds().max(1);
    let step = Duration::milliseconds(bucket_ms);
    let wanted = horizon.num_milliseconds().saturating_add(bucket_ms - 1) / bucket_ms;
    let buckets = usize::try_from(wanted)
        .unwrap_or(usize::MAX)
        .min(MAX_FORECAST_BUCKETS);

    let mut forecast = Vec::with_capacity(buckets);
    let mut starts_at = Some(now);
    while let Some(at) = starts_at {
        if forecast.len() == buckets {
            break;
        }
        forecast.push(ForecastBucket {
            starts_at: at,
            count: 0,
        });
        starts_at = at.checked_add_signed(step);
    }

    // None when the horizon runs past the calendar: nothing is beyond it.
    let end = now.checked_add_signed(horizon);
    for at in items.iter().filter_map(|item| item.progress.next_review_at) {
        if at <= now || end.is_some_and(|end| at >= end) {
            continue;
        }
        let offset = (at - now).num_milliseconds() / bucket_ms;
        let index = usize::try_from(offset).unwrap_or(usize::MAX);
        if let Some(slot) = forecast.get_mut(index) {
            slot.count += 1;
        }
    }

    forecast
}
