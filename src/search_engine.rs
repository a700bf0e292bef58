use std::collections::HashSet;

use log::{info, warn};
use reqwest::blocking::Client;
use scraper::{Html, Selector};
use url::Url;

use crate::error::{Result, ScraperError};
use crate::scraper::fetch;

/// Placeholder replaced by the URL-encoded keyword.
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// Runs a keyword search and collects the listing links it returns.
pub struct SearchEngine {
    client: Client,
    search_url: String,
    link_selector: Selector,
}

impl SearchEngine {
    pub fn new(client: Client, search_url: &str) -> Self {
        SearchEngine {
            client,
            search_url: search_url.to_string(),
            link_selector: Selector::parse(r#"a[href*="/maps/place"]"#)
                .expect("listing link selector is valid"),
        }
    }

    pub fn search_url(&self, keyword: &str) -> String {
        let encoded = urlencoding::encode(keyword);
        self.search_url.replace(QUERY_PLACEHOLDER, &encoded)
    }

    /// Unique listing links in page order, at most `limit` of them.
    pub fn listing_links(&self, keyword: &str, limit: Option<usize>) -> Result<Vec<String>> {
        let search_url = self.search_url(keyword);
        info!("Searching for: '{}'", keyword);

        let html = fetch(&self.client, &search_url)?;
        let base = Url::parse(&search_url).map_err(|e| ScraperError::Extraction {
            reason: format!("invalid search URL {}: {}", search_url, e),
        })?;

        let links = self.parse_listing_links(&html, &base, limit);
        if links.is_empty() {
            warn!("No results found for: {}", keyword);
        }
        Ok(links)
    }

    fn parse_listing_links(&self, html: &str, base: &Url, limit: Option<usize>) -> Vec<String> {
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for element in document.select(&self.link_selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Ok(joined) = base.join(href) else {
                continue;
            };
            let link = joined.to_string();
            if seen.insert(link.clone()) {
                links.push(link);
            }
            if limit.map_or(false, |max| links.len() >= max) {
                break;
            }
        }
        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SearchEngine {
        SearchEngine::new(Client::new(), "https://maps.example/search/{query}")
    }

    #[test]
    fn encodes_keyword_into_template() {
        assert_eq!(
            engine().search_url("tea shop tirur"),
            "https://maps.example/search/tea%20shop%20tirur"
        );
    }

    #[test]
    fn collects_unique_links_in_order() {
        let html = r#"
            <a href="/maps/place/One">1</a>
            <a href="https://maps.example/maps/place/Two">2</a>
            <a href="/maps/place/One">1 again</a>
            <a href="/about">about</a>
            <a href="/maps/place/Three">3</a>
        "#;
        let base = Url::parse("https://maps.example/search/x").unwrap();
        let links = engine().parse_listing_links(html, &base, None);
        assert_eq!(
            links,
            vec![
                "https://maps.example/maps/place/One",
                "https://maps.example/maps/place/Two",
                "https://maps.example/maps/place/Three",
            ]
        );
        assert_eq!(engine().parse_listing_links(html, &base, Some(2)).len(), 2);
    }
}
