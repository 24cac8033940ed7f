//! Perch Artwork - two-tier image cache
//!
//! Library artwork (playlist and album covers) lives in an on-disk tree
//! partitioned by category with a read-through in-memory tier on top. Queue
//! artwork is ephemeral: in-memory only, capped, and trimmed by recency.
//! Fetching goes through the [`ImageFetcher`] seam so tests never touch the
//! network.

#![forbid(unsafe_code)]

mod cache;
mod error;
mod fetcher;

pub use cache::{ImageCache, ImageCacheConfig};
pub use error::{ArtworkError, Result};
pub use fetcher::{HttpImageFetcher, ImageFetcher};
