use jiff::{Timestamp, civil::Date};
use serde::{Deserialize, Serialize};

/// A film in the collection, as persisted in the `films` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilmRecord {
    pub id: i32,
    pub tmdb_id: i32,
    pub title: String,
    pub poster_path: String,
    pub backdrop_path: String,
    pub overview: String,
    pub release_date: String,
    pub vote_average: f64,
    pub runtime: i32,
    pub genres: Vec<String>,
    pub origin_country: Vec<String>,
    pub trailer_key: String,
    pub created_at: Timestamp,
    /// `None` when the backing table has no `storage_locations` column.
    pub storage_locations: Option<Vec<String>>,
}

impl FilmRecord {
    pub fn year(&self) -> Option<i16> {
        parse_year(&self.release_date)
    }

    pub fn has_trailer(&self) -> bool {
        !self.trailer_key.trim().is_empty()
    }

    /// Case-insensitive membership test on `origin_country`.
    pub fn is_from(&self, country: &str) -> bool {
        self.origin_country.iter().any(|c| c.trim().eq_ignore_ascii_case(country.trim()))
    }
}

/// Extracts the year from an ISO date (`2010-07-16`, or a full timestamp).
pub fn parse_year(release_date: &str) -> Option<i16> {
    let s = release_date.trim();
    let date: Date = s.get(..10).unwrap_or(s).parse().ok()?;
    Some(date.year())
}

/// Insert payload: everything but the store-assigned `id` and `created_at`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewFilm {
    pub tmdb_id: i32,
    pub title: String,
    pub poster_path: String,
    pub backdrop_path: String,
    pub overview: String,
    pub release_date: String,
    pub vote_average: f64,
    pub runtime: i32,
    pub genres: Vec<String>,
    pub origin_country: Vec<String>,
    pub trailer_key: String,
}

/// Partial update. `None` leaves the column untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilmPatch {
    pub tmdb_id: Option<i32>,
    pub title: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub vote_average: Option<f64>,
    pub runtime: Option<i32>,
    pub genres: Option<Vec<String>>,
    pub origin_country: Option<Vec<String>>,
    pub trailer_key: Option<String>,
    pub storage_locations: Option<Vec<String>>,
}

impl FilmPatch {
    pub fn without(mut self, column: &str) -> Self {
        if column == STORAGE_LOCATIONS {
            self.storage_locations = None;
        }
        self
    }
}

pub const STORAGE_LOCATIONS: &str = "storage_locations";

/// One row of a metadata search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: i32,
    pub title: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
}

impl SearchHit {
    pub fn year(&self) -> Option<i16> {
        self.release_date.as_deref().and_then(parse_year)
    }
}

/// Full metadata for one film.
#[derive(Clone, Debug, PartialEq)]
pub struct MovieDetails {
    pub id: i32,
    pub title: String,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub overview: String,
    pub release_date: String,
    pub vote_average: f64,
    pub runtime: i32,
    pub genres: Vec<String>,
    pub origin_country: Vec<String>,
}

impl MovieDetails {
    pub fn into_new_film(self, trailer_key: String) -> NewFilm {
        NewFilm {
            tmdb_id: self.id,
            title: self.title,
            poster_path: self.poster_path.unwrap_or_default(),
            backdrop_path: self.backdrop_path.unwrap_or_default(),
            overview: self.overview,
            release_date: self.release_date,
            vote_average: self.vote_average,
            runtime: self.runtime.max(0),
            genres: self.genres,
            origin_country: self.origin_country,
            trailer_key,
        }
    }
}

/// A poster from the image manifest; `language` is `None` for untagged art.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageAsset {
    pub file_path: String,
    pub language: Option<String>,
}

/// Title/poster overrides resolved for a region.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LocalizedFields {
    pub title: Option<String>,
    pub poster_path: Option<String>,
}

/// What a card or detail page actually shows.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayFields {
    pub title: String,
    pub poster_path: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AddOutcome {
    Added { title: String },
    Duplicate,
}

#[derive(Clone, Debug, PartialEq)]
pub enum UpdateOutcome {
    Saved,
    /// Saved, but `column` does not exist in the backing table and was dropped.
    SavedWithout { column: &'static str },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// A film found in an external list, not yet resolved to a TMDB id.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportItem {
    pub slug: String,
    pub title: String,
    pub year: Option<i16>,
    pub tmdb_id: Option<i32>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Notice {
    Success(String),
    Warning(String),
    Error(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_year_from_date_and_timestamp() {
        assert_eq!(parse_year("1999-10-15"), Some(1999));
        assert_eq!(parse_year("2008-07-14T00:00:00.000Z"), Some(2008));
        assert_eq!(parse_year(""), None);
        assert_eq!(parse_year("soon"), None);
    }

    #[test]
    fn patch_without_storage_locations() {
        let patch = FilmPatch {
            title: Some("Heat".to_string()),
            storage_locations: Some(vec!["shelf".to_string()]),
            ..Default::default()
        };
        let stripped = patch.without(STORAGE_LOCATIONS);
        assert_eq!(stripped.storage_locations, None);
        assert_eq!(stripped.title.as_deref(), Some("Heat"));
    }
}
