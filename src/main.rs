mod collection;
mod config;
mod db;
mod debounce;
mod entities;
mod error;
mod filters;
mod localize;
mod models;
mod routes;
mod scraper;
mod search;
mod store;
mod templates;
#[cfg(test)]
mod testing;
mod tmdb;
mod view;

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{
    collection::Collection,
    config::Config,
    debounce::SearchDebouncer,
    localize::{LocalizationCache, Localizer},
    search::{SearchRegistration, SearchRegistry},
    store::{DbFilmStore, FilmStore, NullFilmStore},
    tmdb::{MovieSource, TmdbClient},
    view::{CollectionHub, ViewChange},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub http: reqwest::Client,
    pub store: Arc<dyn FilmStore>,
    pub hub: Arc<CollectionHub>,
    pub collection: Collection,
    pub localizer: Arc<Localizer>,
    pub finder: Arc<SearchDebouncer>,
    pub search: SearchRegistry,
}

impl AppState {
    /// Wires the components together around an empty view. Must be called
    /// from within a Tokio runtime.
    pub fn new(
        config: Arc<Config>,
        http: reqwest::Client,
        store: Arc<dyn FilmStore>,
        source: Arc<dyn MovieSource>,
    ) -> Self {
        let hub = Arc::new(CollectionHub::new(Vec::new()));
        let collection = Collection::new(store.clone(), source.clone(), hub.clone());
        let localizer = Arc::new(Localizer::new(
            source.clone(),
            Arc::new(LocalizationCache::new()),
            config.localize_region.clone(),
            config.localize_language.clone(),
        ));
        let finder =
            Arc::new(SearchDebouncer::new(source, Duration::from_millis(config.search_debounce_ms)));

        Self {
            config,
            http,
            store,
            hub,
            collection,
            localizer,
            finder,
            search: SearchRegistry::new(),
        }
    }

    /// Points the header search box at the collection view.
    pub fn register_search(&self) -> SearchRegistration {
        let hub = self.hub.clone();
        self.search.register(move |term| {
            hub.update(ViewChange::Search(term.to_string()));
        })
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(routes::home))
        .route("/filters", post(routes::set_filters))
        .route("/filters/clear", post(routes::clear_filters))
        .route("/search", post(routes::search))
        .route("/films/{id}", get(routes::film_detail))
        .route("/add", get(routes::add_page))
        .route("/add/search", get(routes::add_search))
        .route("/add/{tmdb_id}", post(routes::add_film))
        .route("/manage", get(routes::manage))
        .route("/manage/{id}", post(routes::update_film))
        .route("/manage/{id}/edit", get(routes::edit_film))
        .route("/manage/{id}/delete", post(routes::delete_film))
        .route("/export.json", get(routes::export))
        .route("/import", post(routes::import))
        .route("/import/run", get(routes::import_run))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,moviary=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    let http = reqwest::Client::builder()
        .user_agent("moviary/0.1")
        .timeout(Duration::from_secs(30))
        .build()?;

    let store: Arc<dyn FilmStore> = match config.database_url.as_deref() {
        Some(url) => {
            let db = db::connect(url, config.auto_migrate).await?;
            Arc::new(DbFilmStore::new(db))
        },
        None => {
            warn!("DATABASE_URL is not set; running without persistence");
            Arc::new(NullFilmStore)
        },
    };

    let tmdb = TmdbClient::new(
        http.clone(),
        config.tmdb_access_token.clone(),
        config.tmdb_base_url.clone(),
        config.tmdb_rps,
    );

    let state = Arc::new(AppState::new(config.clone(), http, store, Arc::new(tmdb)));

    if let Err(err) = state.collection.reload().await {
        warn!(error = %err, "failed to load collection");
    }
    tokio::spawn(localize::warm(
        state.localizer.clone(),
        state.hub.subscribe(),
        config.max_concurrent,
    ));
    let _search = state.register_search();

    let app = app(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!(addr = %config.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
