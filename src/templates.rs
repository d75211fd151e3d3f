use maud::{DOCTYPE, Markup, PreEscaped, html};

use crate::{
    filters::FilterCriteria,
    models::{DisplayFields, FilmRecord, ImportSummary, Notice, SearchHit},
    tmdb::image_url,
    view::ViewSnapshot,
};

const TAILWIND_CDN: &str = "https://cdn.tailwindcss.com";
const DATASTAR_CDN: &str =
    "https://cdn.jsdelivr.net/npm/@sudodevnull/datastar@0.19.9/dist/datastar.js";

const INPUT: &str = "mt-1 w-full rounded-md border border-gray-300 px-3 py-2 focus:border-blue-500 focus:outline-none focus:ring-1 focus:ring-blue-500";
const BUTTON: &str = "rounded-md bg-blue-600 px-4 py-2 font-semibold text-white hover:bg-blue-700";

/// Shared page furniture: the header search box and the persistence banner.
#[derive(Clone, Debug, Default)]
pub struct Chrome {
    pub store_configured: bool,
    pub search_term: String,
}

impl Chrome {
    pub fn new(store_configured: bool, criteria: &FilterCriteria) -> Self {
        Self { store_configured, search_term: criteria.search_term.clone() }
    }
}

/// A film plus what it should display after localization.
pub struct Card<'a> {
    pub film: &'a FilmRecord,
    pub display: DisplayFields,
}

pub fn home_page(chrome: &Chrome, snapshot: &ViewSnapshot, cards: &[Card<'_>]) -> String {
    page(
        "My films",
        chrome,
        html! {
            div class="flex flex-wrap items-end justify-between gap-4" {
                div {
                    h1 class="text-3xl font-bold text-gray-900" { "My films" }
                    p class="mt-1 text-gray-600" { (cards.len()) " of " (snapshot.total) " films" }
                }
                (filter_bar(snapshot))
            }

            @if cards.is_empty() {
                div class="mt-10 bg-white shadow rounded-lg p-8" {
                    @if snapshot.total == 0 {
                        p class="text-gray-600" { "Your collection is empty. " a class="text-blue-600 hover:text-blue-800" href="/add" { "Add a film" } }
                    } @else {
                        p class="text-gray-600" { "No films match the current filters." }
                    }
                }
            } @else {
                div class="mt-8 grid gap-6 grid-cols-2 sm:grid-cols-3 lg:grid-cols-5" {
                    @for card in cards {
                        (film_card(card))
                    }
                }
            }
        },
    )
}

fn filter_bar(snapshot: &ViewSnapshot) -> Markup {
    let criteria = &snapshot.criteria;
    html! {
        div class="flex flex-wrap items-end gap-3" {
            form class="flex flex-wrap items-end gap-3" method="post" action="/filters" {
                (facet_select("genre", "Genre", &snapshot.facets.genres, criteria.genre.as_deref()))
                (facet_select("year", "Year", &snapshot.facets.years, criteria.year.as_deref()))
                (facet_select("country", "Country", &snapshot.facets.countries, criteria.country.as_deref()))
                noscript { button class=(BUTTON) type="submit" { "Apply" } }
            }
            @if !criteria.is_cleared() {
                form method="post" action="/filters/clear" {
                    button class="rounded-md border border-gray-300 bg-white px-4 py-2 text-sm text-gray-700 hover:bg-gray-50" type="submit" { "Clear filters" }
                }
            }
        }
    }
}

fn facet_select(name: &str, label: &str, options: &[String], current: Option<&str>) -> Markup {
    let current = current.unwrap_or(crate::filters::ALL);
    html! {
        label class="block text-sm font-medium text-gray-700" {
            (label)
            select class=(INPUT) name=(name) onchange="this.form.submit()" {
                @for option in options {
                    option value=(option) selected[option.eq_ignore_ascii_case(current)] { (option) }
                }
            }
        }
    }
}

fn film_card(card: &Card<'_>) -> Markup {
    let film = card.film;
    let (shown, extra) = genre_badges(&film.genres);
    html! {
        a class="block bg-white shadow rounded-lg overflow-hidden hover:shadow-lg" href=(format!("/films/{}", film.id)) {
            (poster(&card.display.poster_path, &card.display.title, "w342"))
            div class="p-3" {
                h2 class="font-semibold text-gray-900 truncate" { (card.display.title) }
                p class="text-sm text-gray-500" {
                    @if let Some(year) = film.year() { (year) }
                    @if film.vote_average > 0.0 { " · ★ " (format!("{:.1}", film.vote_average)) }
                }
                div class="mt-2 flex flex-wrap gap-1" {
                    @for genre in shown {
                        span class="rounded bg-gray-100 px-2 py-0.5 text-xs text-gray-700" { (genre) }
                    }
                    @if extra > 0 {
                        span class="rounded bg-gray-200 px-2 py-0.5 text-xs text-gray-700" { "+" (extra) }
                    }
                }
            }
        }
    }
}

/// The first two genres, and how many more there are.
pub fn genre_badges(genres: &[String]) -> (&[String], usize) {
    let shown = &genres[..genres.len().min(2)];
    (shown, genres.len() - shown.len())
}

/// `139` → `"2h 19m"`; unknown runtimes render as nothing.
pub fn format_runtime(minutes: i32) -> String {
    if minutes <= 0 {
        return String::new();
    }
    format!("{}h {}m", minutes / 60, minutes % 60)
}

fn poster(path: &str, alt: &str, size: &str) -> Markup {
    let url = image_url(path, size);
    html! {
        @if url.is_empty() {
            div class="aspect-[2/3] w-full bg-gray-200 flex items-center justify-center text-gray-400 text-sm" { "No poster" }
        } @else {
            img class="aspect-[2/3] w-full object-cover" src=(url) alt=(alt) loading="lazy";
        }
    }
}

pub fn film_page(chrome: &Chrome, film: &FilmRecord, display: &DisplayFields) -> String {
    let backdrop = image_url(&film.backdrop_path, "w1280");
    let runtime = format_runtime(film.runtime);

    page(
        &display.title,
        chrome,
        html! {
            @if !backdrop.is_empty() {
                img class="w-full max-h-80 object-cover rounded-lg shadow" src=(backdrop) alt="";
            }
            div class="mt-8 grid gap-8 md:grid-cols-3" {
                div { (poster(&display.poster_path, &display.title, "w500")) }
                div class="md:col-span-2" {
                    h1 class="text-3xl font-bold text-gray-900" {
                        (display.title)
                        @if let Some(year) = film.year() {
                            span class="ml-2 font-normal text-gray-500" { "(" (year) ")" }
                        }
                    }
                    @if display.title != film.title {
                        p class="mt-1 text-gray-500" { (film.title) }
                    }
                    dl class="mt-6 grid grid-cols-2 gap-4 text-sm" {
                        div { dt class="text-gray-500" { "Rating" } dd class="font-medium" { (format!("{:.1}", film.vote_average)) " / 10" } }
                        @if !runtime.is_empty() {
                            div { dt class="text-gray-500" { "Runtime" } dd class="font-medium" { (runtime) } }
                        }
                        div { dt class="text-gray-500" { "Countries" } dd class="font-medium" { (film.origin_country.join(", ")) } }
                        div { dt class="text-gray-500" { "Genres" } dd class="font-medium" { (film.genres.join(", ")) } }
                        @if let Some(locations) = film.storage_locations.as_ref().filter(|l| !l.is_empty()) {
                            div { dt class="text-gray-500" { "Stored at" } dd class="font-medium" { (locations.join(", ")) } }
                        }
                    }
                    @if !film.overview.is_empty() {
                        p class="mt-6 text-gray-700 leading-relaxed" { (film.overview) }
                    }
                    div class="mt-6 flex gap-4 text-sm" {
                        a class="text-blue-600 hover:text-blue-800" href=(format!("/manage/{}/edit", film.id)) { "Edit" }
                        a class="text-blue-600 hover:text-blue-800" href=(format!("https://www.themoviedb.org/movie/{}", film.tmdb_id)) target="_blank" rel="noopener noreferrer" { "TMDB" }
                    }
                }
            }
            @if film.has_trailer() {
                div class="mt-10" {
                    h2 class="text-xl font-semibold text-gray-900" { "Trailer" }
                    div class="mt-4 aspect-video" {
                        iframe class="w-full h-full rounded-lg" src=(format!("https://www.youtube.com/embed/{}", film.trailer_key.trim())) title="Trailer" allowfullscreen {}
                    }
                }
            }
        },
    )
}

pub fn add_page(chrome: &Chrome, notice: Option<&Notice>) -> String {
    page(
        "Add a film",
        chrome,
        html! {
            h1 class="text-3xl font-bold text-gray-900" { "Add a film" }
            @if let Some(notice) = notice { (notice_box(notice)) }
            div class="mt-6 bg-white shadow rounded-lg p-6" {
                label class="block text-sm font-medium text-gray-700" for="q" { "Search TMDB" }
                input class=(INPUT) id="q" name="q" type="search" autocomplete="off" placeholder="Title"
                    data-bind:q
                    data-on:input=(PreEscaped("@get('/add/search?q=' + encodeURIComponent($q))"));
            }
            div id="search-results" class="mt-6" {}
        },
    )
}

pub fn search_results_fragment(hits: &[SearchHit]) -> String {
    html! {
        div id="search-results" class="mt-6" {
            @if hits.is_empty() {
                p class="text-gray-500" { "No results." }
            } @else {
                ul class="space-y-3" {
                    @for hit in hits {
                        li class="flex items-center gap-4 bg-white shadow rounded-lg p-3" {
                            div class="w-12 shrink-0" { (poster(hit.poster_path.as_deref().unwrap_or_default(), &hit.title, "w92")) }
                            div class="flex-1" {
                                p class="font-medium text-gray-900" {
                                    (hit.title)
                                    @if let Some(year) = hit.year() {
                                        span class="ml-2 font-normal text-gray-500" { "(" (year) ")" }
                                    }
                                }
                            }
                            form method="post" action=(format!("/add/{}", hit.id)) {
                                button class=(BUTTON) type="submit" { "Add" }
                            }
                        }
                    }
                }
            }
        }
    }
    .into_string()
}

pub fn search_error_fragment() -> String {
    html! {
        div id="search-results" class="mt-6" {
            (notice_box(&Notice::Error("Search failed. Please try again.".to_string())))
        }
    }
    .into_string()
}

pub fn manage_page(chrome: &Chrome, films: &[FilmRecord], notice: Option<&Notice>) -> String {
    page(
        "Manage",
        chrome,
        html! {
            div class="flex items-center justify-between" {
                h1 class="text-3xl font-bold text-gray-900" { "Manage collection" }
                a class="text-sm text-blue-600 hover:text-blue-800" href="/export.json" { "Export JSON" }
            }
            @if let Some(notice) = notice { (notice_box(notice)) }

            div class="mt-6 bg-white shadow rounded-lg p-6" {
                h2 class="font-semibold text-gray-900" { "Import from Letterboxd" }
                form class="mt-3 flex gap-3" method="post" action="/import" {
                    input class=(INPUT) name="username" placeholder="Letterboxd username" required;
                    button class=(BUTTON) type="submit" { "Import" }
                }
            }

            table class="mt-6 w-full bg-white shadow rounded-lg text-sm" {
                thead {
                    tr class="text-left text-gray-500" {
                        th class="p-3" { "Title" }
                        th class="p-3" { "Year" }
                        th class="p-3" { "Added" }
                        th class="p-3" {}
                    }
                }
                tbody {
                    @for film in films {
                        tr class="border-t" {
                            td class="p-3" { a class="text-blue-600 hover:text-blue-800" href=(format!("/films/{}", film.id)) { (film.title) } }
                            td class="p-3" { @if let Some(year) = film.year() { (year) } }
                            td class="p-3 text-gray-500" { (film.created_at.strftime("%Y-%m-%d").to_string()) }
                            td class="p-3 text-right" {
                                a class="text-blue-600 hover:text-blue-800" href=(format!("/manage/{}/edit", film.id)) { "Edit" }
                            }
                        }
                    }
                }
            }
        },
    )
}

pub fn edit_page(chrome: &Chrome, film: &FilmRecord) -> String {
    let locations = film.storage_locations.as_deref().unwrap_or_default().join(", ");
    page(
        "Edit",
        chrome,
        html! {
            h1 class="text-3xl font-bold text-gray-900" { "Edit " (film.title) }
            form class="mt-6 bg-white shadow rounded-lg p-6 space-y-4" method="post" action=(format!("/manage/{}", film.id)) {
                (text_field("title", "Title", &film.title))
                (text_field("tmdb_id", "TMDB id", &film.tmdb_id.to_string()))
                (text_field("release_date", "Release date", &film.release_date))
                (text_field("vote_average", "Rating", &film.vote_average.to_string()))
                (text_field("runtime", "Runtime (minutes)", &film.runtime.to_string()))
                (text_field("genres", "Genres (comma separated)", &film.genres.join(", ")))
                (text_field("origin_country", "Countries (comma separated)", &film.origin_country.join(", ")))
                (text_field("storage_locations", "Storage locations (comma separated)", &locations))
                (text_field("poster_path", "Poster path", &film.poster_path))
                (text_field("backdrop_path", "Backdrop path", &film.backdrop_path))
                (text_field("trailer_key", "YouTube trailer key", &film.trailer_key))
                label class="block text-sm font-medium text-gray-700" {
                    "Overview"
                    textarea class=(INPUT) name="overview" rows="5" { (film.overview) }
                }
                button class=(BUTTON) type="submit" { "Save" }
            }

            form class="mt-6 bg-white shadow rounded-lg p-6 flex items-center gap-4" method="post" action=(format!("/manage/{}/delete", film.id)) {
                label class="flex items-center gap-2 text-sm text-gray-700" {
                    input type="checkbox" name="confirm" value="yes";
                    "I want to delete this film"
                }
                button class="rounded-md bg-red-600 px-4 py-2 font-semibold text-white hover:bg-red-700" type="submit" { "Delete" }
            }
        },
    )
}

fn text_field(name: &str, label: &str, value: &str) -> Markup {
    html! {
        label class="block text-sm font-medium text-gray-700" {
            (label)
            input class=(INPUT) name=(name) value=(value);
        }
    }
}

pub fn import_processing_page(chrome: &Chrome, username: &str) -> String {
    let url = format!("/import/run?username={}", urlencoding::encode(username));

    page(
        "Importing",
        chrome,
        html! {
            div id="content" class="max-w-xl mx-auto" data-indicator:fetching data-init=(PreEscaped(format!("@get('{}')", url))) {
                div class="bg-white shadow rounded-lg p-8 text-center" {
                    div class="mx-auto h-12 w-12 rounded-full border-4 border-blue-200 border-t-blue-600 animate-spin" {};
                    h1 class="mt-6 text-xl font-semibold text-gray-900" { "Importing" }
                    p class="mt-2 text-gray-600" { "Reading watched films for @" (username) "." }
                    p class="mt-2 text-sm text-gray-500" { "Films are added one at a time; this may take a while." }
                }
            }
        },
    )
}

pub fn import_summary_fragment(username: &str, summary: &ImportSummary) -> String {
    content_div(html! {
        div class="max-w-xl mx-auto bg-white shadow rounded-lg p-8" {
            h1 class="text-2xl font-bold text-gray-900" { "Import finished" }
            p class="mt-2 text-gray-600" { "@" (username) }
            dl class="mt-6 grid grid-cols-3 gap-4 text-center" {
                div { dd class="text-2xl font-semibold text-green-700" { (summary.imported) } dt class="text-sm text-gray-500" { "imported" } }
                div { dd class="text-2xl font-semibold text-gray-700" { (summary.skipped) } dt class="text-sm text-gray-500" { "skipped" } }
                div { dd class="text-2xl font-semibold text-red-700" { (summary.failed) } dt class="text-sm text-gray-500" { "failed" } }
            }
            a class="mt-6 inline-block text-blue-600 hover:text-blue-800" href="/" { "Back to collection" }
        }
    })
}

pub fn error_fragment(message: String) -> String {
    content_div(html! {
        div class="max-w-2xl mx-auto bg-white shadow rounded-lg p-8" {
            h1 class="text-2xl font-bold text-gray-900" { "Error" }
            p class="mt-4 text-gray-700" { (message) }
            a class="mt-6 inline-block text-blue-600 hover:text-blue-800" href="/" { "Back" }
        }
    })
}

pub fn error_page(chrome: &Chrome, message: String) -> String {
    page(
        "Error",
        chrome,
        html! {
            div class="max-w-xl mx-auto bg-white shadow rounded-lg p-8" {
                h1 class="text-2xl font-bold text-gray-900" { "Error" }
                p class="mt-4 text-gray-700" { (message) }
                a class="mt-6 inline-block text-blue-600 hover:text-blue-800" href="/" { "Back" }
            }
        },
    )
}

fn notice_box(notice: &Notice) -> Markup {
    let (class, text) = match notice {
        Notice::Success(t) => ("border-green-500 bg-green-50 text-green-800", t),
        Notice::Warning(t) => ("border-yellow-500 bg-yellow-50 text-yellow-800", t),
        Notice::Error(t) => ("border-red-500 bg-red-50 text-red-800", t),
    };
    html! {
        div class=(format!("mt-6 border-l-4 p-4 {class}")) role="status" { (text) }
    }
}

fn page(title: &str, chrome: &Chrome, body: Markup) -> String {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) " · Moviary" }
                script src=(TAILWIND_CDN) {}
                script type="module" src=(DATASTAR_CDN) {}
            }
            body class="min-h-screen bg-gray-50" {
                @if !chrome.store_configured {
                    div id="store-banner" class="bg-yellow-100 border-b border-yellow-300 px-6 py-3 text-sm text-yellow-900" {
                        "No database is configured. Changes will not be saved; set DATABASE_URL to enable persistence."
                    }
                }
                header class="bg-white shadow" {
                    nav class="max-w-6xl mx-auto px-6 py-4 flex flex-wrap items-center gap-6" {
                        a class="text-xl font-bold text-gray-900" href="/" { "Moviary" }
                        a class="text-gray-600 hover:text-gray-900" href="/add" { "Add" }
                        a class="text-gray-600 hover:text-gray-900" href="/manage" { "Manage" }
                        form class="ml-auto" method="post" action="/search" {
                            input class="rounded-md border border-gray-300 px-3 py-1.5 text-sm" type="search" name="q" placeholder="Search collection" value=(chrome.search_term);
                        }
                    }
                }
                main class="max-w-6xl mx-auto px-6 py-10" { (body) }
            }
        }
    }
    .into_string()
}

fn content_div(inner: Markup) -> String {
    html! { div id="content" { (inner) } }.into_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        testing::film,
        view::{CollectionView, ViewChange},
    };

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn runtime_format() {
        assert_eq!(format_runtime(139), "2h 19m");
        assert_eq!(format_runtime(45), "0h 45m");
        assert_eq!(format_runtime(120), "2h 0m");
        assert_eq!(format_runtime(0), "");
    }

    #[test]
    fn badges_show_two_genres_and_overflow() {
        let genres = strings(&["Action", "Crime", "Thriller", "Drama"]);
        let (shown, extra) = genre_badges(&genres);
        assert_eq!(shown, &genres[..2]);
        assert_eq!(extra, 2);

        let one = strings(&["Horror"]);
        assert_eq!(genre_badges(&one), (&one[..], 0));
        assert_eq!(genre_badges(&[]).1, 0);
    }

    #[test]
    fn banner_only_without_store() {
        let mut view = CollectionView::new(vec![film(1, "Heat", "1995-12-15", &["Crime"], &["US"])]);
        view.apply(ViewChange::Search("heat".into()));
        let snapshot = view.snapshot();

        let missing = home_page(&Chrome::new(false, &snapshot.criteria), &snapshot, &[]);
        assert!(missing.contains("store-banner"));
        assert!(missing.contains("No films match"));
        assert!(missing.contains("Clear filters"));

        let present = home_page(&Chrome::new(true, &snapshot.criteria), &snapshot, &[]);
        assert!(!present.contains("store-banner"));
    }

    #[test]
    fn card_uses_display_fields() {
        let heat = film(1, "Heat", "1995-12-15", &["Crime", "Drama", "Thriller"], &["US"]);
        let view = CollectionView::new(vec![heat.clone()]);
        let cards = [Card {
            film: &heat,
            display: DisplayFields { title: "Panas".into(), poster_path: "/panas.jpg".into() },
        }];
        let html = home_page(&Chrome::default(), &view.snapshot(), &cards);
        assert!(html.contains("Panas"));
        assert!(html.contains("https://image.tmdb.org/t/p/w342/panas.jpg"));
        assert!(html.contains("+1"));
        assert!(html.contains("1 of 1 films"));
    }

    #[test]
    fn trailer_embed_only_when_present() {
        let mut heat = film(1, "Heat", "1995-12-15", &["Crime"], &["US"]);
        let display = DisplayFields { title: heat.title.clone(), poster_path: heat.poster_path.clone() };
        assert!(!film_page(&Chrome::default(), &heat, &display).contains("youtube.com/embed"));

        heat.trailer_key = "abc123".into();
        heat.runtime = 170;
        let html = film_page(&Chrome::default(), &heat, &display);
        assert!(html.contains("https://www.youtube.com/embed/abc123"));
        assert!(html.contains("2h 50m"));
    }

    #[test]
    fn search_results_post_to_add() {
        let hits = vec![SearchHit {
            id: 550,
            title: "Fight Club".into(),
            poster_path: None,
            release_date: Some("1999-10-15".into()),
            vote_average: 8.4,
        }];
        let html = search_results_fragment(&hits);
        assert!(html.contains(r#"action="/add/550""#));
        assert!(html.contains("(1999)"));
        assert!(search_results_fragment(&[]).contains("No results."));
    }
}
