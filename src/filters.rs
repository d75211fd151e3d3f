//! Facet derivation and the inclusion predicate for the collection view.
//!
//! Everything here is a pure function of its inputs: the collection is never
//! reordered or mutated, and facets always come from the full collection.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::models::FilmRecord;

/// Sentinel shown first in every facet list; selecting it disables the filter.
pub const ALL: &str = "All";

/// Active filter state. `None` means "All".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub genre: Option<String>,
    pub year: Option<String>,
    pub country: Option<String>,
    pub search_term: String,
}

impl FilterCriteria {
    /// "All", "All", "All", "".
    pub fn cleared() -> Self {
        Self::default()
    }

    pub fn is_cleared(&self) -> bool {
        self.genre.is_none()
            && self.year.is_none()
            && self.country.is_none()
            && self.search_term.trim().is_empty()
    }
}

/// Maps a selector value to a criterion: blank or the sentinel means "All".
pub fn selection(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    (!value.is_empty() && value != ALL).then(|| value.to_string())
}

/// Selector options, each starting with [`ALL`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Facets {
    pub genres: Vec<String>,
    pub years: Vec<String>,
    pub countries: Vec<String>,
}

impl Default for Facets {
    fn default() -> Self {
        derive_facets(&[])
    }
}

pub fn derive_facets(films: &[FilmRecord]) -> Facets {
    let mut genres: HashSet<&str> = HashSet::new();
    let mut years: BTreeSet<i16> = BTreeSet::new();
    let mut countries: BTreeSet<String> = BTreeSet::new();

    for film in films {
        genres.extend(film.genres.iter().map(|g| g.trim()).filter(|g| !g.is_empty()));
        years.extend(film.year());
        countries.extend(
            film.origin_country
                .iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .map(|c| c.to_ascii_uppercase()),
        );
    }

    let mut genres: Vec<&str> = genres.into_iter().collect();
    genres.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));

    Facets {
        genres: with_all(genres.into_iter().map(str::to_string)),
        years: with_all(years.into_iter().rev().map(|y| y.to_string())),
        countries: with_all(countries),
    }
}

fn with_all(values: impl IntoIterator<Item = String>) -> Vec<String> {
    std::iter::once(ALL.to_string()).chain(values).collect()
}

/// Stable filter of `films` by `criteria`.
pub fn apply_filters(films: &[FilmRecord], criteria: &FilterCriteria) -> Vec<FilmRecord> {
    let term = criteria.search_term.trim().to_lowercase();
    films.iter().filter(|film| matches(film, criteria, &term)).cloned().collect()
}

fn matches(film: &FilmRecord, criteria: &FilterCriteria, term: &str) -> bool {
    if let Some(genre) = &criteria.genre {
        if !film.genres.iter().any(|g| g.trim().eq_ignore_ascii_case(genre)) {
            return false;
        }
    }

    if let Some(year) = &criteria.year {
        match film.year() {
            Some(y) if y.to_string() == *year => {},
            _ => return false,
        }
    }

    if let Some(country) = &criteria.country {
        if !film.is_from(country) {
            return false;
        }
    }

    term.is_empty()
        || film.title.to_lowercase().contains(term)
        || film.genres.iter().any(|g| g.to_lowercase().contains(term))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::testing::film;

    fn criteria(genre: &str, year: &str, country: &str, term: &str) -> FilterCriteria {
        FilterCriteria {
            genre: selection(Some(genre)),
            year: selection(Some(year)),
            country: selection(Some(country)),
            search_term: term.to_string(),
        }
    }

    fn titles(films: &[FilmRecord]) -> Vec<&str> {
        films.iter().map(|f| f.title.as_str()).collect()
    }

    fn sample() -> Vec<FilmRecord> {
        vec![
            film(1, "Batman Begins", "2005-06-10", &["Action", "Crime"], &["US", "GB"]),
            film(2, "Superman", "1978-12-10", &["Action"], &["US"]),
            film(3, "The Raid", "2011-09-08", &["Action", "Thriller"], &["ID"]),
            film(4, "Lego Spinoff", "", &["Fantasy Batman Spinoff"], &[]),
            film(5, "Pengabdi Setan", "2017-09-28", &["horror"], &["id"]),
        ]
    }

    #[test]
    fn facets_start_with_all_and_are_sorted() {
        let facets = derive_facets(&sample());
        assert_eq!(
            facets.genres,
            vec!["All", "Action", "Crime", "Fantasy Batman Spinoff", "horror", "Thriller"]
        );
        assert_eq!(facets.years, vec!["All", "2017", "2011", "2005", "1978"]);
        assert_eq!(facets.countries, vec!["All", "GB", "ID", "US"]);
    }

    #[test]
    fn facets_of_empty_collection() {
        let facets = derive_facets(&[]);
        assert_eq!(facets.genres, vec![ALL]);
        assert_eq!(facets.years, vec![ALL]);
        assert_eq!(facets.countries, vec![ALL]);
    }

    #[test]
    fn cleared_criteria_is_identity() {
        let films = sample();
        assert_eq!(apply_filters(&films, &FilterCriteria::cleared()), films);
        assert!(FilterCriteria::cleared().is_cleared());
    }

    #[test]
    fn selection_maps_sentinel_to_none() {
        assert_eq!(selection(Some(ALL)), None);
        assert_eq!(selection(Some("  ")), None);
        assert_eq!(selection(None), None);
        assert_eq!(selection(Some("Drama")), Some("Drama".to_string()));
    }

    #[test]
    fn country_filter_is_case_insensitive() {
        let films = vec![film(1, "Heat", "1995-12-15", &["Crime"], &["US"])];
        assert!(apply_filters(&films, &criteria(ALL, ALL, "GB", "")).is_empty());
        assert_eq!(apply_filters(&films, &criteria(ALL, ALL, ALL, "")).len(), 1);
        assert_eq!(apply_filters(&films, &criteria(ALL, ALL, "US", "")).len(), 1);
        assert_eq!(apply_filters(&films, &criteria(ALL, ALL, "us", "")).len(), 1);
    }

    #[test]
    fn records_without_countries_fail_specific_country() {
        let got = apply_filters(&sample(), &criteria(ALL, ALL, "ID", ""));
        assert_eq!(titles(&got), vec!["The Raid", "Pengabdi Setan"]);
    }

    #[test]
    fn search_matches_title_or_genre_substring() {
        let got = apply_filters(&sample(), &criteria(ALL, ALL, ALL, "batman"));
        assert_eq!(titles(&got), vec!["Batman Begins", "Lego Spinoff"]);

        let got = apply_filters(&sample(), &criteria(ALL, ALL, ALL, "  BATMAN "));
        assert_eq!(titles(&got), vec!["Batman Begins", "Lego Spinoff"]);
    }

    #[test]
    fn unparseable_release_date_only_fails_specific_year() {
        let films = sample();
        let got = apply_filters(&films, &criteria(ALL, "2005", ALL, ""));
        assert_eq!(titles(&got), vec!["Batman Begins"]);
        assert!(titles(&apply_filters(&films, &criteria(ALL, ALL, ALL, ""))).contains(&"Lego Spinoff"));
    }

    #[test]
    fn genre_filter_is_exact_and_case_insensitive() {
        let got = apply_filters(&sample(), &criteria("HORROR", ALL, ALL, ""));
        assert_eq!(titles(&got), vec!["Pengabdi Setan"]);
        assert!(apply_filters(&sample(), &criteria("Batman", ALL, ALL, "")).is_empty());
    }

    #[test]
    fn criteria_combine_with_and() {
        let got = apply_filters(&sample(), &criteria("Action", ALL, "US", "super"));
        assert_eq!(titles(&got), vec!["Superman"]);
    }

    fn arb_film() -> impl Strategy<Value = FilmRecord> {
        (
            1..500i32,
            "[a-zA-Z ]{0,12}",
            prop::sample::select(vec!["", "1999-01-01", "2005-06-10", "2020-02-29", "garbage"]),
            prop::collection::vec(prop::sample::select(vec!["Action", "Drama", "horror", ""]), 0..3),
            prop::collection::vec(prop::sample::select(vec!["US", "gb", "ID"]), 0..2),
        )
            .prop_map(|(id, title, date, genres, countries)| {
                film(id, &title, date, &genres, &countries)
            })
    }

    fn arb_criteria() -> impl Strategy<Value = FilterCriteria> {
        (
            prop::sample::select(vec![ALL, "Action", "drama"]),
            prop::sample::select(vec![ALL, "1999", "2020"]),
            prop::sample::select(vec![ALL, "US", "GB", "id"]),
            "[a-z ]{0,3}",
        )
            .prop_map(|(g, y, c, t)| criteria(g, y, c, &t))
    }

    proptest! {
        #[test]
        fn filtered_view_is_an_ordered_subset(films in prop::collection::vec(arb_film(), 0..20), k in arb_criteria()) {
            let got = apply_filters(&films, &k);
            let mut rest = films.iter();
            for f in &got {
                prop_assert!(rest.any(|g| g == f), "not an order-preserving subset");
            }
        }

        #[test]
        fn filtering_is_idempotent(films in prop::collection::vec(arb_film(), 0..20), k in arb_criteria()) {
            let once = apply_filters(&films, &k);
            prop_assert_eq!(&once, &apply_filters(&films, &k));
            prop_assert_eq!(&once, &apply_filters(&once, &k));
        }

        #[test]
        fn facets_are_deduplicated(films in prop::collection::vec(arb_film(), 0..20)) {
            let facets = derive_facets(&films);
            for list in [&facets.genres, &facets.years, &facets.countries] {
                prop_assert_eq!(list[0].as_str(), ALL);
                let distinct: HashSet<&String> = list.iter().collect();
                prop_assert_eq!(distinct.len(), list.len());
            }
            let years: Vec<i16> = facets.years[1..].iter().map(|y| y.parse().unwrap()).collect();
            prop_assert!(years.windows(2).all(|w| w[0] > w[1]));
        }
    }
}
