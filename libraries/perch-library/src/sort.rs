//! Recency-first ordering shared by playlists and albums.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// Sort `items` by last-modified date descending. Undated items sort after
/// all dated ones. The sort is stable, so ties and undated runs keep their
/// original fetch order.
pub fn sort_by_recency<T>(items: &mut [T], date_of: impl Fn(&T) -> Option<DateTime<Utc>>) {
    items.sort_by(|a, b| match (date_of(a), date_of(b)) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}
