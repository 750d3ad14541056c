//! Response normalizer
//!
//! Turns the three upstream payload shapes (keyword search, paginated
//! artist-album listing, curated home feed) into ordered
//! [`ReleaseCandidate`] batches. Items are parsed one at a time so a
//! malformed record is logged and skipped without aborting its payload.
//! Apart from the nested album lookup on the search branch, everything
//! here is a pure function of its inputs.

use crate::services::catalog_client::{
    ArtistAlbumsPayload, CatalogAlbum, CatalogClient, CatalogError, CatalogTrack, FeedModule,
    FeedPayload, SearchPayload,
};
use crate::types::{AudioQuality, ReleaseCandidate, SourceKind, DOWNLOAD_PROTOCOL};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde_json::Value;
use std::collections::HashSet;

/// Feed module type that marks an album section outright.
const ALBUM_LIST_MODULE_TYPE: &str = "ALBUM_LIST";

/// Title keywords that qualify a feed module as an album section when its
/// declared type does not.
const MODULE_TITLE_KEYWORDS: [&str; 4] = ["new", "release", "album", "top"];

/// Normalize a keyword-search payload.
///
/// Album results expand directly. Track results stand in for their parent
/// album: a track whose album is not already represented triggers a full
/// album lookup before expansion, and a lookup that reports the album gone
/// skips the track rather than failing the batch.
pub async fn normalize_search(
    payload: &SearchPayload,
    client: &CatalogClient,
) -> Vec<ReleaseCandidate> {
    let now = Utc::now();
    let mut candidates = Vec::new();
    let mut seen_albums: HashSet<u64> = HashSet::new();

    for item in &payload.albums.items {
        match serde_json::from_value::<CatalogAlbum>(item.clone()) {
            Ok(album) => {
                seen_albums.insert(album.id);
                candidates.extend(expand_album(&album, now));
            }
            Err(e) => tracing::warn!("Skipping malformed search album: {}", e),
        }
    }

    for item in &payload.tracks.items {
        let track = match serde_json::from_value::<CatalogTrack>(item.clone()) {
            Ok(track) => track,
            Err(e) => {
                tracing::warn!("Skipping malformed search track: {}", e);
                continue;
            }
        };

        let Some(album_ref) = track.album else {
            tracing::debug!(track_id = track.id, "Search track carries no album; skipping");
            continue;
        };

        if !seen_albums.insert(album_ref.id) {
            continue;
        }

        match client.album(album_ref.id).await {
            Ok(album) => candidates.extend(expand_album(&album, now)),
            Err(CatalogError::AlbumNotFound(id)) => {
                tracing::debug!(album_id = id, "Track's album gone upstream; skipping");
            }
            Err(e) => {
                tracing::warn!(album_id = album_ref.id, "Album lookup failed: {}", e);
            }
        }
    }

    SourceKind::Search.sort_mode().sort(&mut candidates);
    candidates
}

/// Normalize a paginated artist-album listing, keeping only albums whose
/// best-effort date falls within the look-back window ending at `now`.
///
/// An album dated exactly at the cutoff passes; an album with no parsable
/// date is excluded. The "published defaults to now" rule applies only to
/// display on albums that pass, never to the filter itself.
pub fn normalize_artist_albums(
    payload: &ArtistAlbumsPayload,
    days_back: u32,
    now: DateTime<Utc>,
) -> Vec<ReleaseCandidate> {
    let cutoff = now - Duration::days(days_back as i64);
    let mut candidates = Vec::new();

    for item in &payload.items {
        let album = match serde_json::from_value::<CatalogAlbum>(item.clone()) {
            Ok(album) => album,
            Err(e) => {
                tracing::warn!("Skipping malformed artist album: {}", e);
                continue;
            }
        };

        let Some(published) = best_effort_date(&album) else {
            tracing::debug!(album_id = album.id, "Album has no parsable date; outside window");
            continue;
        };

        if published < cutoff {
            continue;
        }

        candidates.extend(expand_album(&album, now));
    }

    SourceKind::ArtistAlbums.sort_mode().sort(&mut candidates);
    candidates
}

/// Normalize the curated home feed.
///
/// Rows hold modules; a module qualifies as an album section by declared
/// type or by title keyword, and within one an item counts as an album by
/// declared type or by carrying a track count. An album repeated across
/// modules expands once.
pub fn normalize_home_feed(payload: &FeedPayload, now: DateTime<Utc>) -> Vec<ReleaseCandidate> {
    let mut candidates = Vec::new();
    let mut seen_albums: HashSet<u64> = HashSet::new();

    for row in &payload.rows {
        for module in &row.modules {
            if !is_album_module(module) {
                continue;
            }
            let Some(paged) = &module.paged_list else {
                continue;
            };

            for item in &paged.items {
                if !looks_like_album(item) {
                    continue;
                }
                match serde_json::from_value::<CatalogAlbum>(item.clone()) {
                    Ok(album) => {
                        if seen_albums.insert(album.id) {
                            candidates.extend(expand_album(&album, now));
                        }
                    }
                    Err(e) => tracing::warn!(
                        module = module.title.as_deref().unwrap_or("?"),
                        "Skipping malformed feed item: {}",
                        e
                    ),
                }
            }
        }
    }

    SourceKind::HomeFeed.sort_mode().sort(&mut candidates);
    candidates
}

fn is_album_module(module: &FeedModule) -> bool {
    if module
        .module_type
        .as_deref()
        .is_some_and(|t| t.eq_ignore_ascii_case(ALBUM_LIST_MODULE_TYPE))
    {
        return true;
    }

    match &module.title {
        Some(title) => {
            let lowered = title.to_lowercase();
            MODULE_TITLE_KEYWORDS.iter().any(|k| lowered.contains(k))
        }
        None => false,
    }
}

fn looks_like_album(item: &Value) -> bool {
    let declared_album = item
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|t| t.eq_ignore_ascii_case("album"));

    declared_album || matches!(item.get("numberOfTracks"), Some(v) if !v.is_null())
}

/// Expand one album record into its 2-4 quality variants.
fn expand_album(album: &CatalogAlbum, now: DateTime<Utc>) -> Vec<ReleaseCandidate> {
    let release_date = best_effort_date(album);
    let published = release_date.unwrap_or(now);
    let artist = primary_artist(album);
    let duration = album.duration.unwrap_or(0);
    let info_url = album
        .url
        .clone()
        .unwrap_or_else(|| format!("album:{}", album.id));

    AudioQuality::for_media_tags(&album.media_metadata.tags)
        .into_iter()
        .map(|quality| ReleaseCandidate {
            id: format!("{}-{}", album.id, quality.id_suffix()),
            title: synthesize_title(&artist, album, quality, release_date.map(|d| d.year())),
            artist: artist.clone(),
            album: album.title.clone(),
            info_url: info_url.clone(),
            published,
            size_bytes: duration * quality.bytes_per_second(),
            quality,
            explicit: album.explicit,
            protocol: DOWNLOAD_PROTOCOL.to_string(),
        })
        .collect()
}

fn synthesize_title(
    artist: &str,
    album: &CatalogAlbum,
    quality: AudioQuality,
    release_year: Option<i32>,
) -> String {
    let mut title = format!("{} - {}", artist, album.title);
    if let Some(year) = release_year {
        title.push_str(&format!(" ({})", year));
    }
    if album.explicit {
        title.push_str(" (Explicit)");
    }
    title.push_str(&format!(" [{}] [{}]", quality.label(), quality.container()));
    title
}

fn primary_artist(album: &CatalogAlbum) -> String {
    if let Some(artist) = &album.artist {
        return artist.name.clone();
    }
    album
        .artists
        .first()
        .map(|a| a.name.clone())
        .unwrap_or_else(|| "Unknown Artist".to_string())
}

/// Best-effort publish date: the release date when it parses, else the
/// stream-start date, else nothing.
fn best_effort_date(album: &CatalogAlbum) -> Option<DateTime<Utc>> {
    album
        .release_date
        .as_deref()
        .and_then(parse_release_date)
        .or_else(|| {
            album
                .stream_start_date
                .as_deref()
                .and_then(parse_stream_start)
        })
}

fn parse_release_date(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

fn parse_stream_start(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|date| date.with_timezone(&Utc))
}
