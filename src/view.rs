use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::{
    filters::{Facets, FilterCriteria, apply_filters, derive_facets},
    models::FilmRecord,
};

/// What a page renders: the visible subset plus everything needed for the
/// filter bar.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ViewSnapshot {
    pub total: usize,
    pub facets: Facets,
    pub criteria: FilterCriteria,
    pub visible: Vec<FilmRecord>,
}

#[derive(Clone, Debug)]
pub enum ViewChange {
    Films(Vec<FilmRecord>),
    Filters { genre: Option<String>, year: Option<String>, country: Option<String> },
    Search(String),
    Clear,
}

/// The full collection and the active criteria. Facets are cached and only
/// recomputed when the collection changes.
#[derive(Debug, Default)]
pub struct CollectionView {
    films: Vec<FilmRecord>,
    facets: Facets,
    criteria: FilterCriteria,
}

impl CollectionView {
    pub fn new(films: Vec<FilmRecord>) -> Self {
        let facets = derive_facets(&films);
        Self { films, facets, criteria: FilterCriteria::cleared() }
    }

    pub fn apply(&mut self, change: ViewChange) {
        match change {
            ViewChange::Films(films) => {
                self.facets = derive_facets(&films);
                self.films = films;
            },
            ViewChange::Filters { genre, year, country } => {
                self.criteria.genre = genre;
                self.criteria.year = year;
                self.criteria.country = country;
            },
            ViewChange::Search(term) => self.criteria.search_term = term.trim().to_string(),
            ViewChange::Clear => self.criteria = FilterCriteria::cleared(),
        }
    }

    pub fn films(&self) -> &[FilmRecord] {
        &self.films
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            total: self.films.len(),
            facets: self.facets.clone(),
            criteria: self.criteria.clone(),
            visible: apply_filters(&self.films, &self.criteria),
        }
    }
}

/// Owns the [`CollectionView`] and publishes a snapshot after every change.
///
/// Updates run in two phases: the next snapshot is computed while holding the
/// view lock, and subscribers are notified only after the lock is released,
/// so no subscriber ever runs inside an update.
pub struct CollectionHub {
    view: Mutex<CollectionView>,
    tx: watch::Sender<Arc<ViewSnapshot>>,
}

impl CollectionHub {
    pub fn new(films: Vec<FilmRecord>) -> Self {
        let view = CollectionView::new(films);
        let (tx, _) = watch::channel(Arc::new(view.snapshot()));
        Self { view: Mutex::new(view), tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ViewSnapshot>> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> Arc<ViewSnapshot> {
        self.tx.borrow().clone()
    }

    /// Looks a record up in the full collection, ignoring the filters.
    pub fn find(&self, id: i32) -> Option<FilmRecord> {
        self.view.lock().films().iter().find(|f| f.id == id).cloned()
    }

    pub fn all(&self) -> Vec<FilmRecord> {
        self.view.lock().films().to_vec()
    }

    pub fn update(&self, change: ViewChange) -> Arc<ViewSnapshot> {
        let next = {
            let mut view = self.view.lock();
            view.apply(change);
            Arc::new(view.snapshot())
        };
        debug!(total = next.total, visible = next.visible.len(), "collection view updated");
        self.tx.send_replace(next.clone());
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{filters::ALL, testing::film};

    fn films() -> Vec<FilmRecord> {
        vec![
            film(1, "Heat", "1995-12-15", &["Crime"], &["US"]),
            film(2, "The Raid", "2011-09-08", &["Action"], &["ID"]),
        ]
    }

    #[test]
    fn facets_come_from_full_collection() {
        let mut view = CollectionView::new(films());
        view.apply(ViewChange::Filters { genre: None, year: None, country: Some("ID".into()) });
        let snap = view.snapshot();
        assert_eq!(snap.visible.len(), 1);
        assert_eq!(snap.total, 2);
        assert_eq!(snap.facets.countries, vec![ALL, "ID", "US"]);
    }

    #[test]
    fn filters_survive_collection_reload() {
        let mut view = CollectionView::new(films());
        view.apply(ViewChange::Search(" raid ".into()));
        assert_eq!(view.snapshot().criteria.search_term, "raid");

        let mut more = films();
        more.push(film(3, "The Raid 2", "2014-03-28", &["Action"], &["ID"]));
        view.apply(ViewChange::Films(more));
        let snap = view.snapshot();
        assert_eq!(snap.visible.len(), 2);
        assert_eq!(snap.facets.years, vec![ALL, "2014", "2011", "1995"]);
    }

    #[test]
    fn clear_resets_all_criteria() {
        let mut view = CollectionView::new(films());
        view.apply(ViewChange::Filters {
            genre: Some("Crime".into()),
            year: Some("1995".into()),
            country: Some("US".into()),
        });
        view.apply(ViewChange::Search("heat".into()));
        view.apply(ViewChange::Clear);
        let snap = view.snapshot();
        assert_eq!(snap.criteria, FilterCriteria::cleared());
        assert_eq!(snap.visible, films());
    }

    #[tokio::test]
    async fn subscribers_see_published_snapshot() {
        let hub = Arc::new(CollectionHub::new(films()));
        let mut rx = hub.subscribe();
        rx.borrow_and_update();

        let returned = hub.update(ViewChange::Search("heat".into()));
        rx.changed().await.unwrap();
        let seen = rx.borrow_and_update().clone();
        assert!(Arc::ptr_eq(&seen, &returned));
        assert_eq!(seen.visible.len(), 1);
        assert!(Arc::ptr_eq(&hub.snapshot(), &returned));
    }

    #[tokio::test]
    async fn subscriber_can_read_hub_while_notified() {
        // A subscriber that reads the hub on notification would deadlock if
        // notification happened under the view lock.
        let hub = Arc::new(CollectionHub::new(films()));
        let mut rx = hub.subscribe();
        let reader = {
            let hub = hub.clone();
            tokio::spawn(async move {
                rx.changed().await.unwrap();
                hub.find(2).map(|f| f.title)
            })
        };
        hub.update(ViewChange::Clear);
        assert_eq!(reader.await.unwrap().as_deref(), Some("The Raid"));
    }

    #[test]
    fn find_ignores_filters() {
        let hub = CollectionHub::new(films());
        hub.update(ViewChange::Search("heat".into()));
        assert_eq!(hub.find(2).map(|f| f.title), Some("The Raid".to_string()));
        assert!(hub.find(99).is_none());
        assert_eq!(hub.all().len(), 2);
    }
}
