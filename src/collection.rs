use std::{sync::Arc, time::Duration};

use tracing::{debug, info, warn};

use crate::{
    error::AppResult,
    models::{AddOutcome, FilmPatch, ImportItem, ImportSummary, UpdateOutcome},
    store::{FilmStore, StoreError},
    tmdb::MovieSource,
    view::{CollectionHub, ViewChange},
};

/// User-triggered operations on the collection. Each mutation is followed by
/// a reload so the view always reflects the store.
#[derive(Clone)]
pub struct Collection {
    store: Arc<dyn FilmStore>,
    tmdb: Arc<dyn MovieSource>,
    hub: Arc<CollectionHub>,
}

impl Collection {
    pub fn new(store: Arc<dyn FilmStore>, tmdb: Arc<dyn MovieSource>, hub: Arc<CollectionHub>) -> Self {
        Self { store, tmdb, hub }
    }

    /// Reloads every record into the view. On failure the previous collection
    /// stays in place.
    pub async fn reload(&self) -> AppResult<()> {
        let films = self.store.list_all().await?;
        self.hub.update(ViewChange::Films(films));
        Ok(())
    }

    async fn reload_or_warn(&self) {
        if let Err(err) = self.reload().await {
            warn!(error = %err, "failed to reload collection");
        }
    }

    pub async fn add(&self, tmdb_id: i32) -> AppResult<AddOutcome> {
        let outcome = self.insert_from_tmdb(tmdb_id).await?;
        if matches!(outcome, AddOutcome::Added { .. }) {
            self.reload_or_warn().await;
        }
        Ok(outcome)
    }

    async fn insert_from_tmdb(&self, tmdb_id: i32) -> AppResult<AddOutcome> {
        if self.store.exists_by_external_id(tmdb_id).await? {
            debug!(tmdb_id, "film already in collection");
            return Ok(AddOutcome::Duplicate);
        }

        let details = self.tmdb.details(tmdb_id).await?;
        let trailer_key = self.tmdb.trailer_key(tmdb_id).await?;
        let title = details.title.clone();

        let id = self.store.insert(details.into_new_film(trailer_key)).await?;
        info!(id, tmdb_id, title = %title, "film added");
        Ok(AddOutcome::Added { title })
    }

    /// Saves `patch`. When the table lacks an optional column the update is
    /// retried once without it and reported as [`UpdateOutcome::SavedWithout`].
    pub async fn update(&self, id: i32, patch: FilmPatch) -> AppResult<UpdateOutcome> {
        let outcome = match self.store.update(id, &patch).await {
            Ok(()) => UpdateOutcome::Saved,
            Err(StoreError::MissingColumn { column }) => {
                warn!(id, column, "column missing, retrying update without it");
                self.store.update(id, &patch.without(column)).await?;
                UpdateOutcome::SavedWithout { column }
            },
            Err(err) => return Err(err.into()),
        };
        self.reload_or_warn().await;
        Ok(outcome)
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.store.delete(id).await?;
        info!(id, "film deleted");
        self.reload_or_warn().await;
        Ok(())
    }

    /// Adds `items` one at a time with `delay` between them. Items that fail
    /// are logged and counted; the import carries on with the next one.
    pub async fn import<F, Fut>(&self, items: Vec<ImportItem>, delay: Duration, resolve: F) -> ImportSummary
    where
        F: Fn(ImportItem) -> Fut,
        Fut: Future<Output = AppResult<Option<i32>>>,
    {
        let mut summary = ImportSummary::default();
        let total = items.len();

        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(delay).await;
            }

            let slug = item.slug.clone();
            let result = async {
                match resolve(item).await? {
                    Some(tmdb_id) => self.insert_from_tmdb(tmdb_id).await.map(Some),
                    None => Ok(None),
                }
            }
            .await;

            match result {
                Ok(Some(AddOutcome::Added { .. })) => summary.imported += 1,
                Ok(Some(AddOutcome::Duplicate)) => summary.skipped += 1,
                Ok(None) => {
                    debug!(slug = %slug, "no TMDB match");
                    summary.skipped += 1;
                },
                Err(err) => {
                    warn!(slug = %slug, error = %err, "failed to import film");
                    summary.failed += 1;
                },
            }
        }

        info!(
            total,
            imported = summary.imported,
            skipped = summary.skipped,
            failed = summary.failed,
            "import finished"
        );
        self.reload_or_warn().await;
        summary
    }

    /// Resolves an import item to a TMDB id: the id it already carries, then
    /// the Letterboxd film page, then a title search.
    pub async fn resolve_import_item(&self, http: &reqwest::Client, item: ImportItem) -> AppResult<Option<i32>> {
        if item.tmdb_id.is_some() {
            return Ok(item.tmdb_id);
        }

        match crate::scraper::fetch_tmdb_id(http, &item.slug).await {
            Ok(Some(id)) => return Ok(Some(id)),
            Ok(None) => debug!(slug = %item.slug, "film page has no TMDB id"),
            Err(err) => warn!(slug = %item.slug, error = %err, "failed to fetch Letterboxd film page"),
        }

        self.search_tmdb_id(&item).await
    }

    async fn search_tmdb_id(&self, item: &ImportItem) -> AppResult<Option<i32>> {
        let hits = self.tmdb.search(&item.title).await?;
        let best = hits
            .iter()
            .find(|h| item.year.is_some() && h.year() == item.year)
            .or_else(|| hits.first());
        Ok(best.map(|h| h.id))
    }
}
