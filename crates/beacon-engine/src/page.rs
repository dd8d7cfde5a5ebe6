//! Sorting, window sizing and pagination.

use std::cmp::Ordering;

use beacon_core::query::{EnrichedCandidate, SortField, SortOrder};
use chrono::{DateTime, Utc};

/// Window multiplier without free-text search.
pub const WINDOW_MULTIPLIER: usize = 10;
/// Window multiplier with free-text search, which tends to discard more.
pub const SEARCH_WINDOW_MULTIPLIER: usize = 50;

/// How many candidates to load so that filtering still leaves enough for the
/// requested page: at least `offset + page_size`, at least `page_size` times
/// the multiplier, never above `max_take`.
pub fn window_take(
  offset:        usize,
  page_size:     usize,
  search_active: bool,
  max_take:      usize,
) -> usize {
  let multiplier = if search_active { SEARCH_WINDOW_MULTIPLIER } else { WINDOW_MULTIPLIER };
  offset
    .saturating_add(page_size)
    .max(page_size.saturating_mul(multiplier))
    .min(max_take)
}

/// Stable sort: equal keys keep their incoming (loader) order.
pub fn sort(candidates: &mut [EnrichedCandidate], field: SortField, order: SortOrder) {
  candidates.sort_by(|a, b| order.apply(compare(a, b, field)));
}

fn compare(a: &EnrichedCandidate, b: &EnrichedCandidate, field: SortField) -> Ordering {
  match field {
    SortField::Stamps => a.total_stamps().cmp(&b.total_stamps()),
    SortField::Coupons => a.valid_coupons().cmp(&b.valid_coupons()),
    SortField::LastVisit => {
      let at = |c: &EnrichedCandidate| c.last_activity_at().unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
      at(a).cmp(&at(b))
    }
    SortField::Name => a
      .subject
      .full_name()
      .to_lowercase()
      .cmp(&b.subject.full_name().to_lowercase()),
  }
}

/// The contiguous slice `[offset, offset + page_size)`; empty when `offset` is
/// past the end.
pub fn paginate(
  mut sorted: Vec<EnrichedCandidate>,
  offset:     usize,
  page_size:  usize,
) -> Vec<EnrichedCandidate> {
  if offset >= sorted.len() {
    return Vec::new();
  }
  sorted.truncate(offset.saturating_add(page_size));
  sorted.split_off(offset)
}
