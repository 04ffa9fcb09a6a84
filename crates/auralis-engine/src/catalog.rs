//! The track catalog boundary.
//!
//! The real catalog (SQL, remote, whatever) lives outside the core; the
//! engine talks to it through the [`Catalog`] trait. Two implementations
//! ship here: [`MemoryCatalog`] (the reference implementation, also the
//! test double) and [`CachedCatalog`], which wraps any catalog with the
//! tagged read cache and the targeted invalidation table:
//!
//! | mutation | invalidates |
//! |---|---|
//! | add track | listings, search, recent |
//! | update metadata | that track, search, listings |
//! | delete track | listings, search, favorites, recent, popular, that track |
//! | set favorite | favorites only |
//! | record play | recent, popular, listings, that track |
//! | fingerprint saved | that track only |

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use auralis_core::Fingerprint;
use parking_lot::RwLock;

use crate::cache::{CacheConfig, TaggedCache};
use crate::error::CatalogError;
use crate::track::{FingerprintStatus, Track, TrackId};

/// Data needed to register a track.
#[derive(Debug, Clone)]
pub struct NewTrack {
    /// Canonical file path; must be unique.
    pub path: PathBuf,
    /// Container format.
    pub format: String,
    /// Display title.
    pub title: String,
    /// Artist, optional.
    pub artist: Option<String>,
    /// Album, optional.
    pub album: Option<String>,
    /// Native sample rate, Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
    /// Duration in samples.
    pub duration_samples: u64,
}

/// Repository operations the core requires of the catalog.
///
/// Paginated operations always return `(items, total)`, where `total` is
/// consistent with `items` within the call.
pub trait Catalog: Send + Sync {
    /// Register a new track. Fails with `Conflict` on a duplicate path.
    fn add_track(&self, new: NewTrack) -> Result<Track, CatalogError>;

    /// Fetch one track.
    fn get_track(&self, id: TrackId) -> Result<Option<Track>, CatalogError>;

    /// Page through all tracks, ordered by id.
    fn list_tracks(&self, limit: usize, offset: usize)
    -> Result<(Vec<Track>, u64), CatalogError>;

    /// Case-insensitive text search over title, artist and album.
    /// Tracks without an artist are still findable by title.
    fn search_tracks(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<Track>, u64), CatalogError>;

    /// Update display metadata.
    fn update_track_metadata(
        &self,
        id: TrackId,
        title: String,
        artist: Option<String>,
        album: Option<String>,
    ) -> Result<(), CatalogError>;

    /// Remove a track.
    fn delete_track(&self, id: TrackId) -> Result<(), CatalogError>;

    /// Move a track through the fingerprint lifecycle.
    fn set_fingerprint_status(
        &self,
        id: TrackId,
        status: FingerprintStatus,
        error: Option<String>,
    ) -> Result<(), CatalogError>;

    /// Persist a computed fingerprint (and mark the track complete).
    fn save_fingerprint(&self, id: TrackId, fingerprint: Fingerprint)
    -> Result<(), CatalogError>;

    /// Tracks whose fingerprints still need extraction. `Processing`
    /// entries are included: workers are not persistent, so a processing
    /// status on startup means the previous run died mid-job.
    fn list_pending_fingerprints(
        &self,
        limit: usize,
    ) -> Result<Vec<(TrackId, PathBuf)>, CatalogError>;

    /// Flag or unflag a favorite.
    fn set_favorite(&self, id: TrackId, favorite: bool) -> Result<(), CatalogError>;

    /// Record a play (for recency/popularity features).
    fn record_play(&self, id: TrackId) -> Result<(), CatalogError>;
}

struct MemoryInner {
    tracks: BTreeMap<i64, Track>,
    favorites: std::collections::HashSet<i64>,
    plays: Vec<i64>,
    next_id: i64,
}

/// In-memory reference catalog.
pub struct MemoryCatalog {
    inner: RwLock<MemoryInner>,
}

impl MemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryInner {
                tracks: BTreeMap::new(),
                favorites: std::collections::HashSet::new(),
                plays: Vec::new(),
                next_id: 1,
            }),
        }
    }

    /// Whether a track is currently flagged as a favorite.
    pub fn is_favorite(&self, id: TrackId) -> bool {
        self.inner.read().favorites.contains(&id.0)
    }

    fn matches(track: &Track, needle: &str) -> bool {
        let hit = |field: &str| field.to_lowercase().contains(needle);
        hit(&track.title)
            || track.artist.as_deref().is_some_and(hit)
            || track.album.as_deref().is_some_and(hit)
    }
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog for MemoryCatalog {
    fn add_track(&self, new: NewTrack) -> Result<Track, CatalogError> {
        let mut inner = self.inner.write();
        if inner.tracks.values().any(|t| t.path == new.path) {
            return Err(CatalogError::Conflict(format!(
                "path already registered: {}",
                new.path.display()
            )));
        }
        let id = TrackId(inner.next_id);
        inner.next_id += 1;
        let track = Track {
            id,
            path: new.path,
            format: new.format,
            title: new.title,
            artist: new.artist,
            album: new.album,
            sample_rate: new.sample_rate,
            channels: new.channels,
            duration_samples: new.duration_samples,
            fingerprint_status: FingerprintStatus::Pending,
            fingerprint: None,
            fingerprint_error: None,
        };
        inner.tracks.insert(id.0, track.clone());
        Ok(track)
    }

    fn get_track(&self, id: TrackId) -> Result<Option<Track>, CatalogError> {
        Ok(self.inner.read().tracks.get(&id.0).cloned())
    }

    fn list_tracks(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<Track>, u64), CatalogError> {
        let inner = self.inner.read();
        let total = inner.tracks.len() as u64;
        let items = inner
            .tracks
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Ok((items, total))
    }

    fn search_tracks(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<Track>, u64), CatalogError> {
        let needle = query.to_lowercase();
        let inner = self.inner.read();
        let matching: Vec<&Track> = inner
            .tracks
            .values()
            .filter(|t| Self::matches(t, &needle))
            .collect();
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Ok((items, total))
    }

    fn update_track_metadata(
        &self,
        id: TrackId,
        title: String,
        artist: Option<String>,
        album: Option<String>,
    ) -> Result<(), CatalogError> {
        let mut inner = self.inner.write();
        let track = inner
            .tracks
            .get_mut(&id.0)
            .ok_or(CatalogError::NotFound(id))?;
        track.title = title;
        track.artist = artist;
        track.album = album;
        Ok(())
    }

    fn delete_track(&self, id: TrackId) -> Result<(), CatalogError> {
        let mut inner = self.inner.write();
        if inner.tracks.remove(&id.0).is_none() {
            return Err(CatalogError::NotFound(id));
        }
        inner.favorites.remove(&id.0);
        inner.plays.retain(|&p| p != id.0);
        Ok(())
    }

    fn set_fingerprint_status(
        &self,
        id: TrackId,
        status: FingerprintStatus,
        error: Option<String>,
    ) -> Result<(), CatalogError> {
        let mut inner = self.inner.write();
        let track = inner
            .tracks
            .get_mut(&id.0)
            .ok_or(CatalogError::NotFound(id))?;
        track.fingerprint_status = status;
        track.fingerprint_error = error;
        Ok(())
    }

    fn save_fingerprint(
        &self,
        id: TrackId,
        fingerprint: Fingerprint,
    ) -> Result<(), CatalogError> {
        let mut inner = self.inner.write();
        let track = inner
            .tracks
            .get_mut(&id.0)
            .ok_or(CatalogError::NotFound(id))?;
        track.fingerprint = Some(fingerprint);
        track.fingerprint_status = FingerprintStatus::Complete;
        track.fingerprint_error = None;
        Ok(())
    }

    fn list_pending_fingerprints(
        &self,
        limit: usize,
    ) -> Result<Vec<(TrackId, PathBuf)>, CatalogError> {
        let inner = self.inner.read();
        Ok(inner
            .tracks
            .values()
            .filter(|t| {
                matches!(
                    t.fingerprint_status,
                    FingerprintStatus::Pending | FingerprintStatus::Processing
                )
            })
            .take(limit)
            .map(|t| (t.id, t.path.clone()))
            .collect())
    }

    fn set_favorite(&self, id: TrackId, favorite: bool) -> Result<(), CatalogError> {
        let mut inner = self.inner.write();
        if !inner.tracks.contains_key(&id.0) {
            return Err(CatalogError::NotFound(id));
        }
        if favorite {
            inner.favorites.insert(id.0);
        } else {
            inner.favorites.remove(&id.0);
        }
        Ok(())
    }

    fn record_play(&self, id: TrackId) -> Result<(), CatalogError> {
        let mut inner = self.inner.write();
        if !inner.tracks.contains_key(&id.0) {
            return Err(CatalogError::NotFound(id));
        }
        inner.plays.push(id.0);
        Ok(())
    }
}

/// Cache group names used by the cached catalog.
mod groups {
    pub const LISTINGS: &str = "listings";
    pub const SEARCH: &str = "search";
    pub const FAVORITES: &str = "favorites";
    pub const RECENT: &str = "recent";
    pub const POPULAR: &str = "popular";

    pub fn track(id: i64) -> String {
        format!("track:{id}")
    }
}

#[derive(Clone)]
enum Cached {
    One(Option<Track>),
    Page(Vec<Track>, u64),
}

/// A catalog wrapper that caches reads and invalidates by logical group.
pub struct CachedCatalog<C: Catalog> {
    backing: C,
    cache: Arc<TaggedCache<String, Cached>>,
}

impl<C: Catalog> CachedCatalog<C> {
    /// Wrap a catalog with a read cache of the given bounds.
    pub fn new(backing: C, config: CacheConfig) -> Self {
        Self {
            backing,
            cache: Arc::new(TaggedCache::new(config)),
        }
    }

    /// The underlying catalog.
    pub fn backing(&self) -> &C {
        &self.backing
    }

    /// Whether a read-cache entry is currently warm (for tests).
    pub fn is_warm(&self, key: &str) -> bool {
        self.cache.contains(&key.to_string())
    }

    /// Full flush escape hatch for maintenance operations.
    pub fn flush_all(&self) {
        self.cache.clear();
    }

    fn page_size(items: &[Track]) -> u64 {
        // Coarse accounting: a track record is small and bounded.
        (items.len() as u64 + 1) * 256
    }
}

impl<C: Catalog> Catalog for CachedCatalog<C> {
    fn add_track(&self, new: NewTrack) -> Result<Track, CatalogError> {
        let track = self.backing.add_track(new)?;
        self.cache.invalidate_group(groups::LISTINGS);
        self.cache.invalidate_group(groups::SEARCH);
        self.cache.invalidate_group(groups::RECENT);
        Ok(track)
    }

    fn get_track(&self, id: TrackId) -> Result<Option<Track>, CatalogError> {
        let key = format!("track:{}", id.0);
        let tag = groups::track(id.0);
        let cached = self.cache.get_or_compute(
            key,
            &[tag.as_str()],
            |_| 256,
            || self.backing.get_track(id).map(Cached::One),
        )?;
        match cached {
            Cached::One(track) => Ok(track),
            Cached::Page(..) => Err(CatalogError::Storage("cache shape mismatch".into())),
        }
    }

    fn list_tracks(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<Track>, u64), CatalogError> {
        let key = format!("list:{limit}:{offset}");
        let cached = self.cache.get_or_compute(
            key,
            &[groups::LISTINGS],
            |v| match v {
                Cached::Page(items, _) => Self::page_size(items),
                Cached::One(_) => 256,
            },
            || {
                self.backing
                    .list_tracks(limit, offset)
                    .map(|(items, total)| Cached::Page(items, total))
            },
        )?;
        match cached {
            Cached::Page(items, total) => Ok((items, total)),
            Cached::One(_) => Err(CatalogError::Storage("cache shape mismatch".into())),
        }
    }

    fn search_tracks(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<Track>, u64), CatalogError> {
        let key = format!("search:{query}:{limit}:{offset}");
        let cached = self.cache.get_or_compute(
            key,
            &[groups::SEARCH],
            |v| match v {
                Cached::Page(items, _) => Self::page_size(items),
                Cached::One(_) => 256,
            },
            || {
                self.backing
                    .search_tracks(query, limit, offset)
                    .map(|(items, total)| Cached::Page(items, total))
            },
        )?;
        match cached {
            Cached::Page(items, total) => Ok((items, total)),
            Cached::One(_) => Err(CatalogError::Storage("cache shape mismatch".into())),
        }
    }

    fn update_track_metadata(
        &self,
        id: TrackId,
        title: String,
        artist: Option<String>,
        album: Option<String>,
    ) -> Result<(), CatalogError> {
        self.backing.update_track_metadata(id, title, artist, album)?;
        self.cache.invalidate_group(&groups::track(id.0));
        self.cache.invalidate_group(groups::SEARCH);
        self.cache.invalidate_group(groups::LISTINGS);
        Ok(())
    }

    fn delete_track(&self, id: TrackId) -> Result<(), CatalogError> {
        self.backing.delete_track(id)?;
        self.cache.invalidate_group(groups::LISTINGS);
        self.cache.invalidate_group(groups::SEARCH);
        self.cache.invalidate_group(groups::FAVORITES);
        self.cache.invalidate_group(groups::RECENT);
        self.cache.invalidate_group(groups::POPULAR);
        self.cache.invalidate_group(&groups::track(id.0));
        Ok(())
    }

    fn set_fingerprint_status(
        &self,
        id: TrackId,
        status: FingerprintStatus,
        error: Option<String>,
    ) -> Result<(), CatalogError> {
        self.backing.set_fingerprint_status(id, status, error)?;
        self.cache.invalidate_group(&groups::track(id.0));
        Ok(())
    }

    fn save_fingerprint(
        &self,
        id: TrackId,
        fingerprint: Fingerprint,
    ) -> Result<(), CatalogError> {
        self.backing.save_fingerprint(id, fingerprint)?;
        // Fingerprint updates touch only that track; rendered chunks
        // re-key themselves through the parameter digest.
        self.cache.invalidate_group(&groups::track(id.0));
        Ok(())
    }

    fn list_pending_fingerprints(
        &self,
        limit: usize,
    ) -> Result<Vec<(TrackId, PathBuf)>, CatalogError> {
        // Always fresh: the queue depends on seeing real state.
        self.backing.list_pending_fingerprints(limit)
    }

    fn set_favorite(&self, id: TrackId, favorite: bool) -> Result<(), CatalogError> {
        self.backing.set_favorite(id, favorite)?;
        self.cache.invalidate_group(groups::FAVORITES);
        Ok(())
    }

    fn record_play(&self, id: TrackId) -> Result<(), CatalogError> {
        self.backing.record_play(id)?;
        self.cache.invalidate_group(groups::RECENT);
        self.cache.invalidate_group(groups::POPULAR);
        self.cache.invalidate_group(groups::LISTINGS);
        self.cache.invalidate_group(&groups::track(id.0));
        Ok(())
    }
}
