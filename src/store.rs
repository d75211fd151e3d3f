use async_trait::async_trait;
use jiff::Timestamp;
use sea_orm::{
    ActiveValue::{NotSet, Set},
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, FromQueryResult, QueryFilter, QueryOrder,
    QuerySelect, Select,
};
use tracing::{debug, warn};

use crate::{
    entities::film,
    models::{FilmPatch, FilmRecord, NewFilm, STORAGE_LOCATIONS},
};

/// Columns that deployed schemas are allowed to lack.
const OPTIONAL_COLUMNS: [&str; 1] = [STORAGE_LOCATIONS];

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("column `{column}` does not exist in the films table")]
    MissingColumn { column: &'static str },

    #[error("film {0} not found")]
    NotFound(i32),

    #[error("stored value for `{field}` is not valid JSON: {source}")]
    Decode {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Db(DbErr),
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        match missing_optional_column(&err) {
            Some(column) => StoreError::MissingColumn { column },
            None => StoreError::Db(err),
        }
    }
}

/// The drivers only report an undefined column through their message text, so
/// this is the single place that reads it.
fn missing_optional_column(err: &DbErr) -> Option<&'static str> {
    let message = err.to_string().to_ascii_lowercase();
    let undefined = message.contains("no such column")
        || message.contains("has no column")
        || message.contains("does not exist")
        || message.contains("could not find");
    if !undefined {
        return None;
    }
    OPTIONAL_COLUMNS.into_iter().find(|column| message.contains(column))
}

pub type StoreResult<T> = Result<T, StoreError>;

/// CRUD gateway over the `films` table.
#[async_trait]
pub trait FilmStore: Send + Sync {
    /// `false` for the stand-in used when persistence is not configured.
    fn is_configured(&self) -> bool {
        true
    }

    /// Every record, newest first.
    async fn list_all(&self) -> StoreResult<Vec<FilmRecord>>;

    async fn get(&self, id: i32) -> StoreResult<Option<FilmRecord>>;

    async fn insert(&self, film: NewFilm) -> StoreResult<i32>;

    async fn update(&self, id: i32, patch: &FilmPatch) -> StoreResult<()>;

    async fn delete(&self, id: i32) -> StoreResult<()>;

    async fn exists_by_external_id(&self, tmdb_id: i32) -> StoreResult<bool>;
}

#[derive(Clone)]
pub struct DbFilmStore {
    db: DatabaseConnection,
}

impl DbFilmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Reads records through `select`, falling back to a projection without
    /// `storage_locations` when the column is missing.
    async fn read(&self, select: Select<film::Entity>) -> StoreResult<Vec<FilmRecord>> {
        match select.clone().all(&self.db).await.map_err(StoreError::from) {
            Ok(rows) => rows.into_iter().map(FilmRecord::try_from).collect(),
            Err(StoreError::MissingColumn { column }) => {
                debug!(column, "reading films without optional column");
                let rows = select
                    .select_only()
                    .columns([
                        film::Column::Id,
                        film::Column::TmdbId,
                        film::Column::Title,
                        film::Column::PosterPath,
                        film::Column::BackdropPath,
                        film::Column::Overview,
                        film::Column::ReleaseDate,
                        film::Column::VoteAverage,
                        film::Column::Runtime,
                        film::Column::Genres,
                        film::Column::OriginCountry,
                        film::Column::TrailerKey,
                        film::Column::CreatedAt,
                    ])
                    .into_model::<LegacyRow>()
                    .all(&self.db)
                    .await?;
                rows.into_iter().map(FilmRecord::try_from).collect()
            },
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl FilmStore for DbFilmStore {
    async fn list_all(&self) -> StoreResult<Vec<FilmRecord>> {
        let select = film::Entity::find()
            .order_by_desc(film::Column::CreatedAt)
            .order_by_desc(film::Column::Id);
        let films = self.read(select).await?;
        debug!(count = films.len(), "loaded films");
        Ok(films)
    }

    async fn get(&self, id: i32) -> StoreResult<Option<FilmRecord>> {
        let select = film::Entity::find().filter(film::Column::Id.eq(id));
        Ok(self.read(select).await?.into_iter().next())
    }

    async fn insert(&self, new: NewFilm) -> StoreResult<i32> {
        let model = film::ActiveModel {
            id: NotSet,
            tmdb_id: Set(new.tmdb_id),
            title: Set(new.title),
            poster_path: Set(new.poster_path),
            backdrop_path: Set(new.backdrop_path),
            overview: Set(new.overview),
            release_date: Set(new.release_date),
            vote_average: Set(new.vote_average),
            runtime: Set(new.runtime),
            genres: Set(encode_list(&new.genres)),
            origin_country: Set(encode_list(&new.origin_country)),
            trailer_key: Set(new.trailer_key),
            created_at: Set(Timestamp::now().as_millisecond()),
            storage_locations: NotSet,
        };

        let res = film::Entity::insert(model).exec(&self.db).await?;
        debug!(id = res.last_insert_id, tmdb_id = new.tmdb_id, "inserted film");
        Ok(res.last_insert_id)
    }

    async fn update(&self, id: i32, patch: &FilmPatch) -> StoreResult<()> {
        if *patch == FilmPatch::default() {
            return match self.get(id).await? {
                Some(_) => Ok(()),
                None => Err(StoreError::NotFound(id)),
            };
        }

        let model = film::ActiveModel {
            id: NotSet,
            tmdb_id: set_opt(patch.tmdb_id),
            title: set_opt(patch.title.clone()),
            poster_path: set_opt(patch.poster_path.clone()),
            backdrop_path: set_opt(patch.backdrop_path.clone()),
            overview: set_opt(patch.overview.clone()),
            release_date: set_opt(patch.release_date.clone()),
            vote_average: set_opt(patch.vote_average),
            runtime: set_opt(patch.runtime),
            genres: set_opt(patch.genres.as_deref().map(encode_list)),
            origin_country: set_opt(patch.origin_country.as_deref().map(encode_list)),
            trailer_key: set_opt(patch.trailer_key.clone()),
            created_at: NotSet,
            storage_locations: match &patch.storage_locations {
                Some(locations) => Set(Some(encode_list(locations))),
                None => NotSet,
            },
        };

        let res = film::Entity::update_many()
            .set(model)
            .filter(film::Column::Id.eq(id))
            .exec(&self.db)
            .await?;

        if res.rows_affected == 0 {
            return Err(StoreError::NotFound(id));
        }
        debug!(id, "updated film");
        Ok(())
    }

    async fn delete(&self, id: i32) -> StoreResult<()> {
        let res = film::Entity::delete_by_id(id).exec(&self.db).await?;
        if res.rows_affected == 0 {
            return Err(StoreError::NotFound(id));
        }
        debug!(id, "deleted film");
        Ok(())
    }

    async fn exists_by_external_id(&self, tmdb_id: i32) -> StoreResult<bool> {
        let found: Option<i32> = film::Entity::find()
            .select_only()
            .column(film::Column::Id)
            .filter(film::Column::TmdbId.eq(tmdb_id))
            .into_tuple()
            .one(&self.db)
            .await?;
        Ok(found.is_some())
    }
}

/// Stand-in used when no database is configured: reads are empty and writes
/// succeed without doing anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullFilmStore;

#[async_trait]
impl FilmStore for NullFilmStore {
    fn is_configured(&self) -> bool {
        false
    }

    async fn list_all(&self) -> StoreResult<Vec<FilmRecord>> {
        Ok(Vec::new())
    }

    async fn get(&self, _id: i32) -> StoreResult<Option<FilmRecord>> {
        Ok(None)
    }

    async fn insert(&self, film: NewFilm) -> StoreResult<i32> {
        warn!(tmdb_id = film.tmdb_id, "persistence not configured, insert discarded");
        Ok(0)
    }

    async fn update(&self, id: i32, _patch: &FilmPatch) -> StoreResult<()> {
        warn!(id, "persistence not configured, update discarded");
        Ok(())
    }

    async fn delete(&self, id: i32) -> StoreResult<()> {
        warn!(id, "persistence not configured, delete discarded");
        Ok(())
    }

    async fn exists_by_external_id(&self, _tmdb_id: i32) -> StoreResult<bool> {
        Ok(false)
    }
}

#[derive(Debug, FromQueryResult)]
struct LegacyRow {
    id: i32,
    tmdb_id: i32,
    title: String,
    poster_path: String,
    backdrop_path: String,
    overview: String,
    release_date: String,
    vote_average: f64,
    runtime: i32,
    genres: String,
    origin_country: String,
    trailer_key: String,
    created_at: i64,
}

impl TryFrom<film::Model> for FilmRecord {
    type Error = StoreError;

    fn try_from(m: film::Model) -> StoreResult<Self> {
        let storage_locations = match m.storage_locations.as_deref() {
            Some(raw) => Some(decode_list(STORAGE_LOCATIONS, raw)?),
            None => Some(Vec::new()),
        };
        Ok(FilmRecord {
            id: m.id,
            tmdb_id: m.tmdb_id,
            title: m.title,
            poster_path: m.poster_path,
            backdrop_path: m.backdrop_path,
            overview: m.overview,
            release_date: m.release_date,
            vote_average: m.vote_average,
            runtime: m.runtime,
            genres: decode_list("genres", &m.genres)?,
            origin_country: decode_list("origin_country", &m.origin_country)?,
            trailer_key: m.trailer_key,
            created_at: timestamp(m.created_at),
            storage_locations,
        })
    }
}

impl TryFrom<LegacyRow> for FilmRecord {
    type Error = StoreError;

    fn try_from(r: LegacyRow) -> StoreResult<Self> {
        Ok(FilmRecord {
            id: r.id,
            tmdb_id: r.tmdb_id,
            title: r.title,
            poster_path: r.poster_path,
            backdrop_path: r.backdrop_path,
            overview: r.overview,
            release_date: r.release_date,
            vote_average: r.vote_average,
            runtime: r.runtime,
            genres: decode_list("genres", &r.genres)?,
            origin_country: decode_list("origin_country", &r.origin_country)?,
            trailer_key: r.trailer_key,
            created_at: timestamp(r.created_at),
            storage_locations: None,
        })
    }
}

fn set_opt<T: Into<sea_orm::Value>>(value: Option<T>) -> sea_orm::ActiveValue<T> {
    match value {
        Some(v) => Set(v),
        None => NotSet,
    }
}

fn encode_list(items: &[String]) -> String {
    serde_json::Value::from(items.to_vec()).to_string()
}

fn decode_list(field: &'static str, raw: &str) -> StoreResult<Vec<String>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw).map_err(|source| StoreError::Decode { field, source })
}

fn timestamp(millis: i64) -> Timestamp {
    Timestamp::from_millisecond(millis).unwrap_or(Timestamp::UNIX_EPOCH)
}
