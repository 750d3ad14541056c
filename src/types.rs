//! Core domain types for freshet
//!
//! Defines the normalized release model handed to the host pipeline, the
//! four-tier audio quality ladder used for variant expansion, and the
//! fingerprint identity that decides cache applicability.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Protocol tag stamped on every candidate so the host pipeline can route
/// it to the matching download client.
pub const DOWNLOAD_PROTOCOL: &str = "freshet";

/// Media-tag marker for CD-quality lossless availability.
pub const TAG_LOSSLESS: &str = "LOSSLESS";

/// Media-tag marker for hi-res lossless availability.
pub const TAG_HIRES_LOSSLESS: &str = "HIRES_LOSSLESS";

// ============================================================================
// Audio quality ladder
// ============================================================================

/// One of the four fixed audio encoding classes offered by the catalog.
///
/// The catalog does not report download sizes, so each tier carries a
/// bytes-per-second constant used to estimate size from track duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioQuality {
    /// Low-bitrate lossy (96 kbps AAC)
    Low,
    /// High-bitrate lossy (320 kbps AAC)
    High,
    /// CD-quality lossless (16-bit/44.1 kHz FLAC)
    Lossless,
    /// Hi-res lossless (up to 24-bit/96 kHz FLAC)
    HiResLossless,
}

impl AudioQuality {
    /// Codec short name.
    pub fn codec(&self) -> &'static str {
        match self {
            AudioQuality::Low | AudioQuality::High => "AAC",
            AudioQuality::Lossless | AudioQuality::HiResLossless => "FLAC",
        }
    }

    /// Container file extension.
    pub fn container(&self) -> &'static str {
        match self {
            AudioQuality::Low | AudioQuality::High => "m4a",
            AudioQuality::Lossless | AudioQuality::HiResLossless => "flac",
        }
    }

    /// Human-readable quality label used in synthesized titles.
    pub fn label(&self) -> &'static str {
        match self {
            AudioQuality::Low => "AAC 96",
            AudioQuality::High => "AAC 320",
            AudioQuality::Lossless => "FLAC 16/44",
            AudioQuality::HiResLossless => "FLAC 24/96",
        }
    }

    /// Estimated stream rate in bytes per second for size estimation.
    pub fn bytes_per_second(&self) -> u64 {
        match self {
            AudioQuality::Low => 12_000,
            AudioQuality::High => 40_000,
            AudioQuality::Lossless => 176_400,
            AudioQuality::HiResLossless => 1_152_000,
        }
    }

    /// Identifier suffix appended to the album id to form the candidate id.
    pub fn id_suffix(&self) -> &'static str {
        match self {
            AudioQuality::Low => "low",
            AudioQuality::High => "high",
            AudioQuality::Lossless => "lossless",
            AudioQuality::HiResLossless => "hires",
        }
    }

    /// Tiers produced for an album with the given media tags.
    ///
    /// Both lossy tiers are always offered. A `LOSSLESS` tag adds the
    /// lossless tier; a `HIRES_LOSSLESS` tag adds hi-res on top of lossless
    /// (hi-res availability implies the CD-quality variant exists too).
    pub fn for_media_tags<S: AsRef<str>>(tags: &[S]) -> Vec<AudioQuality> {
        let mut tiers = vec![AudioQuality::Low, AudioQuality::High];
        let has_hires = tags.iter().any(|t| t.as_ref() == TAG_HIRES_LOSSLESS);
        let has_lossless = tags.iter().any(|t| t.as_ref() == TAG_LOSSLESS);
        if has_lossless || has_hires {
            tiers.push(AudioQuality::Lossless);
        }
        if has_hires {
            tiers.push(AudioQuality::HiResLossless);
        }
        tiers
    }
}

// ============================================================================
// Release candidate
// ============================================================================

/// One downloadable variant of one album, as handed to the host pipeline.
///
/// Immutable once created; a batch is ordered before it is cached or
/// returned, and candidates are never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseCandidate {
    /// Stable identifier: `<catalog album id>-<tier suffix>`.
    pub id: String,
    /// Synthesized display title, e.g.
    /// `Artist - Album (2024) (Explicit) [FLAC 16/44] [flac]`.
    pub title: String,
    /// Primary artist display name.
    pub artist: String,
    /// Album display name.
    pub album: String,
    /// Download/info locator understood by the download client.
    pub info_url: String,
    /// Best-effort publish date (release date, else stream-start date,
    /// else the time of normalization).
    pub published: DateTime<Utc>,
    /// Estimated size: album duration seconds × tier bytes/second.
    pub size_bytes: u64,
    /// Quality tier of this variant.
    pub quality: AudioQuality,
    /// Explicit-content flag.
    pub explicit: bool,
    /// Protocol tag identifying the consuming downloader.
    pub protocol: String,
}

// ============================================================================
// Fingerprint
// ============================================================================

/// Fixed fingerprint used when polling the curated home feed.
pub const HOME_FEED_FINGERPRINT: &str = "home-feed";

/// Fixed fingerprint used for the keyword-search fallback strategy.
pub const SEARCH_FINGERPRINT: &str = "search-fallback";

/// Normalized, order-insensitive identity of the poll configuration.
///
/// Two configurations naming the same artist set in different orders (or
/// with duplicates) produce equal fingerprints, so a cached batch stays
/// valid across cosmetic configuration rewrites.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Canonical fingerprint for a monitored-artist configuration:
    /// sorted, deduplicated ids joined by commas.
    pub fn for_artists<S: AsRef<str>>(artist_ids: &[S]) -> Self {
        let canonical: BTreeSet<&str> = artist_ids
            .iter()
            .map(|id| id.as_ref().trim())
            .filter(|id| !id.is_empty())
            .collect();
        Fingerprint(canonical.into_iter().collect::<Vec<_>>().join(","))
    }

    /// Constant fingerprint for home-feed polling.
    pub fn home_feed() -> Self {
        Fingerprint(HOME_FEED_FINGERPRINT.to_string())
    }

    /// Constant fingerprint for the search fallback.
    pub fn search_fallback() -> Self {
        Fingerprint(SEARCH_FINGERPRINT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Source kinds and ordering
// ============================================================================

/// Which upstream payload shape a response carries.
///
/// Routed alongside each response so the normalizer picks the right branch
/// without re-deriving intent from the request URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Keyword-search payload (parallel album and track lists).
    Search,
    /// Paginated artist-album listing.
    ArtistAlbums,
    /// Curated home-page feed of modules.
    HomeFeed,
}

impl SourceKind {
    /// Batch ordering for candidates of this provenance.
    ///
    /// Search results mix album and track provenance without a comparable
    /// date, so they order by size alone.
    pub fn sort_mode(&self) -> SortMode {
        match self {
            SourceKind::Search => SortMode::SizeOnly,
            SourceKind::ArtistAlbums | SourceKind::HomeFeed => SortMode::PublishedThenSize,
        }
    }
}

/// Deterministic presentation order for a candidate batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    /// Descending publish date, ties broken by descending size.
    PublishedThenSize,
    /// Descending size only.
    SizeOnly,
}

impl SortMode {
    /// Sort a batch in place. Stable given a fixed input.
    pub fn sort(&self, releases: &mut [ReleaseCandidate]) {
        match self {
            SortMode::PublishedThenSize => releases.sort_by(|a, b| {
                b.published
                    .cmp(&a.published)
                    .then(b.size_bytes.cmp(&a.size_bytes))
                    .then(a.id.cmp(&b.id))
            }),
            SortMode::SizeOnly => releases.sort_by(|a, b| {
                b.size_bytes.cmp(&a.size_bytes).then(a.id.cmp(&b.id))
            }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
