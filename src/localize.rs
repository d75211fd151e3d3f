use std::sync::Arc;

use dashmap::DashMap;
use futures::{StreamExt, stream};
use tokio::sync::{OnceCell, watch};
use tracing::debug;

use crate::{
    models::{DisplayFields, FilmRecord, ImageAsset, LocalizedFields},
    tmdb::MovieSource,
    view::ViewSnapshot,
};

/// `None` once resolved means the lookup failed and is not retried.
type Slot = Arc<OnceCell<Option<LocalizedFields>>>;

/// Localized title/poster per TMDB id. Entries live as long as the cache; there
/// is no eviction and no TTL.
#[derive(Debug, Default)]
pub struct LocalizationCache {
    entries: DashMap<i32, Slot>,
}

impl LocalizationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tmdb_id: i32) -> Option<LocalizedFields> {
        self.entries.get(&tmdb_id).and_then(|slot| slot.get().cloned().flatten())
    }

    /// Whether a lookup for `tmdb_id` has finished, successfully or not.
    pub fn is_resolved(&self, tmdb_id: i32) -> bool {
        self.entries.get(&tmdb_id).is_some_and(|slot| slot.initialized())
    }

    /// Successfully localized entries.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| matches!(e.value().get(), Some(Some(_)))).count()
    }

    fn slot(&self, tmdb_id: i32) -> Slot {
        self.entries.entry(tmdb_id).or_default().clone()
    }
}

/// Resolves what a film should display in the configured region.
pub struct Localizer {
    source: Arc<dyn MovieSource>,
    cache: Arc<LocalizationCache>,
    region: String,
    language: String,
}

impl Localizer {
    pub fn new(
        source: Arc<dyn MovieSource>,
        cache: Arc<LocalizationCache>,
        region: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self { source, cache, region: region.into(), language: language.into() }
    }

    pub fn applies_to(&self, film: &FilmRecord) -> bool {
        film.is_from(&self.region)
    }

    /// Cache-only view of [`Localizer::display`]: while a lookup is pending or
    /// has failed, the stored fields are shown.
    pub fn cached_display(&self, film: &FilmRecord) -> DisplayFields {
        let localized = if self.applies_to(film) { self.cache.get(film.tmdb_id) } else { None };
        merge(film, localized)
    }

    /// Stored fields, overridden by the localized ones when the film comes from
    /// the configured region. Never fails: a failed lookup shows stored fields.
    pub async fn display(&self, film: &FilmRecord) -> DisplayFields {
        if !self.applies_to(film) {
            return merge(film, None);
        }
        let slot = self.cache.slot(film.tmdb_id);
        let localized = slot.get_or_init(|| self.fetch(film.tmdb_id)).await.clone();
        merge(film, localized)
    }

    /// Starts a background lookup for `film` unless one has already finished.
    pub fn prefetch(self: &Arc<Self>, film: FilmRecord) {
        if !self.applies_to(&film) || self.cache.is_resolved(film.tmdb_id) {
            return;
        }
        let localizer = self.clone();
        tokio::spawn(async move {
            localizer.display(&film).await;
        });
    }

    async fn fetch(&self, tmdb_id: i32) -> Option<LocalizedFields> {
        let (details, images) = tokio::join!(
            self.source.localized_details(tmdb_id, &self.language),
            self.source.poster_images(tmdb_id, &self.language),
        );
        let details = match details {
            Ok(details) => details,
            Err(err) => {
                debug!(tmdb_id, error = %err, "localization failed");
                return None;
            },
        };
        let posters = images.unwrap_or_else(|err| {
            debug!(tmdb_id, error = %err, "poster manifest unavailable");
            Vec::new()
        });

        let fields = LocalizedFields {
            title: Some(details.title.trim().to_string()).filter(|t| !t.is_empty()),
            poster_path: select_poster(&posters, &self.language),
        };
        debug!(tmdb_id, title = ?fields.title, "localized film");
        Some(fields)
    }
}

fn merge(film: &FilmRecord, localized: Option<LocalizedFields>) -> DisplayFields {
    let localized = localized.unwrap_or_default();
    DisplayFields {
        title: localized.title.unwrap_or_else(|| film.title.clone()),
        poster_path: localized.poster_path.unwrap_or_else(|| film.poster_path.clone()),
    }
}

/// Poster tagged with `language`, else the untagged one. `None` leaves the
/// stored poster in place.
pub fn select_poster(posters: &[ImageAsset], language: &str) -> Option<String> {
    let tagged = posters
        .iter()
        .find(|p| p.language.as_deref().is_some_and(|l| l.eq_ignore_ascii_case(language)));
    let untagged = || posters.iter().find(|p| p.language.is_none());
    tagged.or_else(untagged).map(|p| p.file_path.clone())
}

/// Pre-fetches localization for visible films every time the hub publishes.
/// Ids that already resolved, including failed ones, are skipped.
pub async fn warm(
    localizer: Arc<Localizer>,
    mut rx: watch::Receiver<Arc<ViewSnapshot>>,
    max_concurrent: usize,
) {
    loop {
        let snapshot = rx.borrow_and_update().clone();
        let pending: Vec<&FilmRecord> = snapshot
            .visible
            .iter()
            .filter(|f| localizer.applies_to(f) && !localizer.cache.is_resolved(f.tmdb_id))
            .collect();

        if !pending.is_empty() {
            debug!(count = pending.len(), cached = localizer.cache.len(), "warming localization cache");
            stream::iter(pending)
                .for_each_concurrent(max_concurrent.max(1), |film| {
                    let localizer = &localizer;
                    async move {
                        localizer.display(film).await;
                    }
                })
                .await;
        }

        if rx.changed().await.is_err() {
            break;
        }
    }
}
