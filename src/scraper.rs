use std::{
    collections::HashSet,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use reqwest::header::REFERER;
use scraper::{Html, Selector};
use tracing::debug;

use crate::{error::AppResult, models::ImportItem};

const LETTERBOXD: &str = "https://letterboxd.com";

fn films_page_url(username: &str, page: u32) -> String {
    let username = urlencoding::encode(username);
    if page == 1 {
        format!("{LETTERBOXD}/{username}/films/")
    } else {
        format!("{LETTERBOXD}/{username}/films/page/{page}/")
    }
}

/// Every film a Letterboxd user has marked as watched, in page order.
pub async fn fetch_watched(
    client: &reqwest::Client,
    username: &str,
    delay_ms: u64,
) -> AppResult<Vec<ImportItem>> {
    debug!(username = %username, "fetching watched films");

    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut page = 1;

    loop {
        let url = films_page_url(username, page);

        debug!(page = page, "fetching films page");
        let html = client
            .get(&url)
            .header(REFERER, LETTERBOXD)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let films = parse_films_page(&html)?;
        debug!(page = page, films_found = films.len(), "parsed films page");

        if films.is_empty() {
            break;
        }

        for film in films {
            if seen.insert(film.slug.clone()) {
                out.push(film);
            }
        }

        page += 1;
        let delay = delay_ms + jitter_ms(150);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    debug!(username = %username, total_films = out.len(), "completed films fetch");
    Ok(out)
}

fn parse_films_page(html: &str) -> AppResult<Vec<ImportItem>> {
    let doc = Html::parse_document(html);
    let selector = selector("li.griditem div.react-component[data-item-slug]")?;

    let mut out = Vec::new();

    for el in doc.select(&selector) {
        let Some(slug) = el.value().attr("data-item-slug") else { continue };
        let Some(name) = el.value().attr("data-item-name") else { continue };

        let (title, year) = parse_title_and_year(name);
        out.push(ImportItem { slug: slug.to_string(), title: title.to_string(), year, tmdb_id: None });
    }

    Ok(out)
}

/// Reads the TMDB id off a Letterboxd film page, if it has one.
pub async fn fetch_tmdb_id(client: &reqwest::Client, slug: &str) -> AppResult<Option<i32>> {
    let url = format!("{LETTERBOXD}/film/{slug}/");
    debug!(slug = %slug, "fetching Letterboxd film page");
    let html = client
        .get(&url)
        .header(REFERER, LETTERBOXD)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    parse_tmdb_id(&html)
}

fn parse_tmdb_id(html: &str) -> AppResult<Option<i32>> {
    let doc = Html::parse_document(html);

    let body_selector = selector("body")?;
    let from_body = doc
        .select(&body_selector)
        .next()
        .and_then(|body| body.value().attr("data-tmdb-id"))
        .filter(|id| !id.is_empty())
        .and_then(|id| id.parse::<i32>().ok());
    if from_body.is_some() {
        return Ok(from_body);
    }

    let link_selector = selector("a[href*='themoviedb.org']")?;
    Ok(doc
        .select(&link_selector)
        .filter_map(|link| link.value().attr("href"))
        .find_map(extract_tmdb_id_from_url))
}

fn selector(css: &str) -> AppResult<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("invalid selector {css}: {e}").into())
}

fn jitter_ms(max: u64) -> u64 {
    if max == 0 {
        return 0;
    }
    let nanos =
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.subsec_nanos() as u64).unwrap_or(0);
    nanos % (max + 1)
}

fn extract_tmdb_id_from_url(url: &str) -> Option<i32> {
    let movie_pos = url.find("/movie/")?;
    url[movie_pos + 7..].split(['/', '-']).next().and_then(|id| id.parse().ok())
}

/// Splits `"Title (1999)"` into the title and the year.
fn parse_title_and_year(name: &str) -> (&str, Option<i16>) {
    let s = name.trim();
    let Some(inner) = s.strip_suffix(')') else { return (s, None) };
    let Some(open) = inner.rfind('(') else { return (s, None) };
    let year = &inner[open + 1..];
    if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
        return (s, None);
    }
    (inner[..open].trim_end(), year.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_trailing_year() {
        assert_eq!(parse_title_and_year("Fight Club (1999)"), ("Fight Club", Some(1999)));
        assert_eq!(parse_title_and_year("Heat"), ("Heat", None));
        assert_eq!(parse_title_and_year("Se7en (extended)"), ("Se7en (extended)", None));
        assert_eq!(parse_title_and_year("M (1931) (1931)"), ("M (1931)", Some(1931)));
    }

    #[test]
    fn username_is_encoded_in_page_urls() {
        assert_eq!(films_page_url("alice", 1), "https://letterboxd.com/alice/films/");
        assert_eq!(films_page_url("a b/c", 2), "https://letterboxd.com/a%20b%2Fc/films/page/2/");
    }

    #[test]
    fn parses_grid_items() {
        let html = r#"<ul>
            <li class="griditem"><div class="react-component" data-item-slug="fight-club" data-item-name="Fight Club (1999)"></div></li>
            <li class="griditem"><div class="react-component" data-item-slug="the-raid" data-item-name="The Raid (2011)"></div></li>
            <li class="griditem"><div class="react-component" data-item-name="No slug (2000)"></div></li>
        </ul>"#;
        let items = parse_films_page(html).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].slug, "fight-club");
        assert_eq!(items[1].title, "The Raid");
        assert_eq!(items[1].year, Some(2011));
        assert_eq!(items[1].tmdb_id, None);
    }

    #[test]
    fn tmdb_id_from_body_or_link() {
        let body = r#"<html><body data-tmdb-id="550"></body></html>"#;
        assert_eq!(parse_tmdb_id(body).unwrap(), Some(550));

        let link = r#"<html><body data-tmdb-id="">
            <a href="https://www.themoviedb.org/movie/94329-the-raid/">TMDB</a></body></html>"#;
        assert_eq!(parse_tmdb_id(link).unwrap(), Some(94329));

        assert_eq!(parse_tmdb_id("<html><body></body></html>").unwrap(), None);
    }
}
