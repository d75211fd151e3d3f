use std::{str::FromStr, sync::Arc, time::Duration};

use axum::{
    extract::{Form, Path, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::warn;

use crate::{
    AppState,
    debounce::SearchOutcome,
    filters::selection,
    models::{AddOutcome, FilmPatch, Notice, UpdateOutcome},
    templates::{self, Card, Chrome},
    view::ViewChange,
};

fn chrome(state: &AppState) -> Chrome {
    Chrome::new(state.store.is_configured(), &state.hub.snapshot().criteria)
}

fn error_response(state: &AppState, status: StatusCode, message: impl Into<String>) -> Response {
    (status, Html(templates::error_page(&chrome(state), message.into()))).into_response()
}

fn not_found(state: &AppState) -> Response {
    error_response(state, StatusCode::NOT_FOUND, "Film not found.")
}

fn datastar_fragment(body: String, selector: &'static str) -> Response {
    let mut resp = Html(body).into_response();
    resp.headers_mut().insert("datastar-selector", HeaderValue::from_static(selector));
    resp.headers_mut().insert("datastar-mode", HeaderValue::from_static("outer"));
    resp
}

pub async fn home(State(state): State<Arc<AppState>>) -> Html<String> {
    let snapshot = state.hub.snapshot();
    let cards: Vec<Card> = snapshot
        .visible
        .iter()
        .map(|film| Card { film, display: state.localizer.cached_display(film) })
        .collect();
    let chrome = Chrome::new(state.store.is_configured(), &snapshot.criteria);
    Html(templates::home_page(&chrome, &snapshot, &cards))
}

#[derive(Debug, Deserialize)]
pub struct FilterForm {
    genre: Option<String>,
    year: Option<String>,
    country: Option<String>,
}

pub async fn set_filters(State(state): State<Arc<AppState>>, Form(form): Form<FilterForm>) -> Redirect {
    state.hub.update(ViewChange::Filters {
        genre: selection(form.genre.as_deref()),
        year: selection(form.year.as_deref()),
        country: selection(form.country.as_deref()),
    });
    Redirect::to("/")
}

pub async fn clear_filters(State(state): State<Arc<AppState>>) -> Redirect {
    state.hub.update(ViewChange::Clear);
    Redirect::to("/")
}

#[derive(Debug, Deserialize)]
pub struct SearchForm {
    #[serde(default)]
    q: String,
}

pub async fn search(State(state): State<Arc<AppState>>, Form(form): Form<SearchForm>) -> Redirect {
    state.search.dispatch(&form.q);
    Redirect::to("/")
}

pub async fn film_detail(State(state): State<Arc<AppState>>, Path(id): Path<i32>) -> Response {
    let Some(film) = state.hub.find(id) else { return not_found(&state) };
    let display = state.localizer.cached_display(&film);
    state.localizer.prefetch(film.clone());
    Html(templates::film_page(&chrome(&state), &film, &display)).into_response()
}

pub async fn add_page(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(templates::add_page(&chrome(&state), None))
}

pub async fn add_search(State(state): State<Arc<AppState>>, Query(q): Query<SearchForm>) -> Response {
    match state.finder.search(&q.q).await {
        Ok(SearchOutcome::Results(hits)) => {
            datastar_fragment(templates::search_results_fragment(&hits), "#search-results")
        },
        Ok(SearchOutcome::Superseded) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            warn!(query = %q.q, error = %err, "TMDB search failed");
            datastar_fragment(templates::search_error_fragment(), "#search-results")
        },
    }
}

pub async fn add_film(State(state): State<Arc<AppState>>, Path(tmdb_id): Path<i32>) -> Html<String> {
    let notice = match state.collection.add(tmdb_id).await {
        Ok(AddOutcome::Added { title }) => Notice::Success(format!("Added {title} to your collection.")),
        Ok(AddOutcome::Duplicate) => Notice::Warning("That film is already in your collection.".to_string()),
        Err(err) => {
            warn!(tmdb_id, error = %err, "failed to add film");
            Notice::Error("Could not add the film. Please try again.".to_string())
        },
    };
    Html(templates::add_page(&chrome(&state), Some(&notice)))
}

pub async fn manage(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(templates::manage_page(&chrome(&state), &state.hub.all(), None))
}

pub async fn edit_film(State(state): State<Arc<AppState>>, Path(id): Path<i32>) -> Response {
    match state.hub.find(id) {
        Some(film) => Html(templates::edit_page(&chrome(&state), &film)).into_response(),
        None => not_found(&state),
    }
}

/// Every field is optional so partial forms only touch what they send.
#[derive(Debug, Default, Deserialize)]
pub struct EditForm {
    tmdb_id: Option<String>,
    title: Option<String>,
    overview: Option<String>,
    release_date: Option<String>,
    vote_average: Option<String>,
    runtime: Option<String>,
    genres: Option<String>,
    origin_country: Option<String>,
    trailer_key: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    storage_locations: Option<String>,
}

impl EditForm {
    fn into_patch(self) -> anyhow::Result<FilmPatch> {
        let trimmed = |s: String| s.trim().to_string();
        Ok(FilmPatch {
            tmdb_id: parse_number(self.tmdb_id.as_deref(), "TMDB id")?,
            title: self.title.map(trimmed).filter(|t| !t.is_empty()),
            overview: self.overview.map(trimmed),
            release_date: self.release_date.map(trimmed),
            vote_average: parse_number_or_zero(self.vote_average.as_deref(), "Rating")?,
            runtime: parse_number_or_zero(self.runtime.as_deref(), "Runtime")?,
            genres: self.genres.as_deref().map(split_list),
            origin_country: self
                .origin_country
                .as_deref()
                .map(|raw| split_list(raw).into_iter().map(|c| c.to_ascii_uppercase()).collect()),
            trailer_key: self.trailer_key.map(trimmed),
            poster_path: self.poster_path.map(trimmed),
            backdrop_path: self.backdrop_path.map(trimmed),
            storage_locations: self.storage_locations.as_deref().map(split_list),
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

fn parse_number<T: FromStr>(raw: Option<&str>, field: &str) -> anyhow::Result<Option<T>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v.parse().map(Some).map_err(|_| anyhow::anyhow!("{field} must be a number")),
    }
}

/// Like [`parse_number`], but a submitted blank clears the value to zero.
fn parse_number_or_zero<T: FromStr + Default>(raw: Option<&str>, field: &str) -> anyhow::Result<Option<T>> {
    match raw.map(str::trim) {
        Some("") => Ok(Some(T::default())),
        raw => parse_number(raw, field),
    }
}

pub async fn update_film(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Form(form): Form<EditForm>,
) -> Html<String> {
    let notice = match form.into_patch() {
        Err(err) => Notice::Error(err.to_string()),
        Ok(patch) => match state.collection.update(id, patch).await {
            Ok(UpdateOutcome::Saved) => Notice::Success("Changes saved.".to_string()),
            Ok(UpdateOutcome::SavedWithout { column }) => Notice::Warning(format!(
                "Changes saved, but this database has no {} column so that field was not stored.",
                column.replace('_', " ")
            )),
            Err(err) => {
                warn!(id, error = %err, "failed to update film");
                Notice::Error("Could not save changes. Please try again.".to_string())
            },
        },
    };
    Html(templates::manage_page(&chrome(&state), &state.hub.all(), Some(&notice)))
}

#[derive(Debug, Deserialize)]
pub struct DeleteForm {
    confirm: Option<String>,
}

pub async fn delete_film(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Form(form): Form<DeleteForm>,
) -> Html<String> {
    let notice = if form.confirm.as_deref() != Some("yes") {
        Notice::Warning("Tick the confirmation box to delete a film.".to_string())
    } else {
        match state.collection.delete(id).await {
            Ok(()) => Notice::Success("Film deleted.".to_string()),
            Err(err) => {
                warn!(id, error = %err, "failed to delete film");
                Notice::Error("Could not delete the film.".to_string())
            },
        }
    };
    Html(templates::manage_page(&chrome(&state), &state.hub.all(), Some(&notice)))
}

pub async fn export(State(state): State<Arc<AppState>>) -> Response {
    match serde_json::to_string_pretty(&state.hub.all()) {
        Ok(body) => (
            [
                (CONTENT_TYPE, "application/json"),
                (CONTENT_DISPOSITION, "attachment; filename=\"moviary-export.json\""),
            ],
            body,
        )
            .into_response(),
        Err(err) => {
            warn!(error = %err, "failed to serialize export");
            error_response(&state, StatusCode::INTERNAL_SERVER_ERROR, "Could not export the collection.")
        },
    }
}

#[derive(Debug, Deserialize)]
pub struct ImportForm {
    username: String,
}

pub async fn import(State(state): State<Arc<AppState>>, Form(form): Form<ImportForm>) -> Response {
    let username = form.username.trim();
    if username.is_empty() {
        return error_response(&state, StatusCode::BAD_REQUEST, "username is required");
    }
    Html(templates::import_processing_page(&chrome(&state), username)).into_response()
}

pub async fn import_run(State(state): State<Arc<AppState>>, Query(q): Query<ImportForm>) -> Response {
    let username = q.username.trim().to_string();

    let result = async {
        if username.is_empty() {
            anyhow::bail!("username is required");
        }

        let items =
            crate::scraper::fetch_watched(&state.http, &username, state.config.import_delay_ms).await?;

        let collection = &state.collection;
        let http = &state.http;
        let summary = collection
            .import(items, Duration::from_millis(state.config.import_delay_ms), |item| {
                collection.resolve_import_item(http, item)
            })
            .await;

        Ok::<_, anyhow::Error>(templates::import_summary_fragment(&username, &summary))
    }
    .await;

    let body = match result {
        Ok(html) => html,
        Err(err) => {
            warn!(username = %username, error = %err, "import failed");
            templates::error_fragment(err.to_string())
        },
    };

    datastar_fragment(body, "#content")
}
