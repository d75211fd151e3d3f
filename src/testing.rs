//! Fixtures shared by the unit tests.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use jiff::Timestamp;
use parking_lot::Mutex;

use crate::{
    error::AppResult,
    models::{FilmRecord, ImageAsset, MovieDetails, NewFilm, SearchHit},
    store::DbFilmStore,
    tmdb::MovieSource,
};

pub async fn memory_store() -> DbFilmStore {
    let db = crate::db::connect("sqlite::memory:", true).await.unwrap();
    DbFilmStore::new(db)
}

pub fn new_film(tmdb_id: i32, title: &str) -> NewFilm {
    NewFilm {
        tmdb_id,
        title: title.to_string(),
        poster_path: format!("/{tmdb_id}.jpg"),
        backdrop_path: String::new(),
        overview: format!("Overview of {title}"),
        release_date: "1999-10-15".to_string(),
        vote_average: 8.4,
        runtime: 139,
        genres: vec!["Drama".to_string()],
        origin_country: vec!["US".to_string()],
        trailer_key: String::new(),
    }
}

/// An in-memory record for engine tests.
pub fn film(id: i32, title: &str, release_date: &str, genres: &[&str], countries: &[&str]) -> FilmRecord {
    FilmRecord {
        id,
        tmdb_id: 1000 + id,
        title: title.to_string(),
        poster_path: format!("/{id}.jpg"),
        backdrop_path: String::new(),
        overview: String::new(),
        release_date: release_date.to_string(),
        vote_average: 7.0,
        runtime: 120,
        genres: genres.iter().map(|g| g.to_string()).collect(),
        origin_country: countries.iter().map(|c| c.to_string()).collect(),
        trailer_key: String::new(),
        created_at: Timestamp::UNIX_EPOCH,
        storage_locations: None,
    }
}

pub fn details(id: i32, title: &str) -> MovieDetails {
    MovieDetails {
        id,
        title: title.to_string(),
        poster_path: Some(format!("/{id}-poster.jpg")),
        backdrop_path: Some(format!("/{id}-backdrop.jpg")),
        overview: format!("Overview of {title}"),
        release_date: "2001-01-01".to_string(),
        vote_average: 7.5,
        runtime: 101,
        genres: vec!["Drama".to_string()],
        origin_country: vec!["ID".to_string()],
    }
}

/// Scripted `MovieSource` that counts every call.
#[derive(Default)]
pub struct FakeSource {
    pub hits: Mutex<Vec<SearchHit>>,
    pub localized_title: Mutex<Option<String>>,
    pub posters: Mutex<Vec<ImageAsset>>,
    pub fail_details_for: Mutex<Vec<i32>>,
    pub fail_images: Mutex<bool>,
    pub fail_search: Mutex<bool>,
    pub searches: AtomicUsize,
    pub detail_calls: AtomicUsize,
    pub trailer_calls: AtomicUsize,
    pub localized_calls: AtomicUsize,
    pub image_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MovieSource for FakeSource {
    async fn search(&self, query: &str) -> AppResult<Vec<SearchHit>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if *self.fail_search.lock() {
            return Err(anyhow::anyhow!("search unavailable").into());
        }
        let q = query.to_lowercase();
        Ok(self.hits.lock().iter().filter(|h| h.title.to_lowercase().contains(&q)).cloned().collect())
    }

    async fn details(&self, tmdb_id: i32) -> AppResult<MovieDetails> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_details_for.lock().contains(&tmdb_id) {
            return Err(anyhow::anyhow!("details unavailable for {tmdb_id}").into());
        }
        Ok(details(tmdb_id, &format!("Film {tmdb_id}")))
    }

    async fn trailer_key(&self, tmdb_id: i32) -> AppResult<String> {
        self.trailer_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("yt-{tmdb_id}"))
    }

    async fn localized_details(&self, tmdb_id: i32, _language: &str) -> AppResult<MovieDetails> {
        self.localized_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_details_for.lock().contains(&tmdb_id) {
            return Err(anyhow::anyhow!("details unavailable for {tmdb_id}").into());
        }
        let mut out = details(tmdb_id, &format!("Film {tmdb_id}"));
        if let Some(title) = self.localized_title.lock().clone() {
            out.title = title;
        }
        Ok(out)
    }

    async fn poster_images(&self, _tmdb_id: i32, _language: &str) -> AppResult<Vec<ImageAsset>> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_images.lock() {
            return Err(anyhow::anyhow!("images unavailable").into());
        }
        Ok(self.posters.lock().clone())
    }
}
