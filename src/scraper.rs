use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::Local;
use log::{debug, info, warn};
use rand::Rng;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, USER_AGENT};
use scraper::{Html, Selector};

use crate::delay_manager::DelayPolicy;
use crate::error::{Result, ScraperError};
use crate::extractor::Extractor;
use crate::record::RawPlace;
use crate::search_engine::SearchEngine;

/// Lazy, finite sequence of listings for one keyword. Not restartable;
/// call `search` again to start over.
pub type PlaceStream<'a> = Box<dyn Iterator<Item = Result<RawPlace>> + 'a>;

/// Anything that can turn a keyword into listings.
pub trait PlaceSource {
    /// `limit` is a hint; callers enforce their own cap.
    fn search<'a>(&'a mut self, keyword: &str, limit: Option<usize>) -> Result<PlaceStream<'a>>;
}

impl<T: PlaceSource + ?Sized> PlaceSource for Box<T> {
    fn search<'a>(&'a mut self, keyword: &str, limit: Option<usize>) -> Result<PlaceStream<'a>> {
        (**self).search(keyword, limit)
    }
}

impl<T: PlaceSource + ?Sized> PlaceSource for &mut T {
    fn search<'a>(&'a mut self, keyword: &str, limit: Option<usize>) -> Result<PlaceStream<'a>> {
        (**self).search(keyword, limit)
    }
}

const USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0",
];

fn random_user_agent() -> &'static str {
    USER_AGENTS[rand::thread_rng().gen_range(0..USER_AGENTS.len())]
}

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

    Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .cookie_store(true)
        .build()
        .map_err(|e| ScraperError::Extraction {
            reason: format!("failed to build HTTP client: {}", e),
        })
}

/// GETs `url` and returns the body. Timeouts and blocking responses get
/// their own error variants.
pub(crate) fn fetch(client: &Client, url: &str) -> Result<String> {
    let classify = |e: reqwest::Error| {
        if e.is_timeout() {
            ScraperError::ExtractionTimeout {
                context: url.to_string(),
            }
        } else {
            ScraperError::Extraction {
                reason: format!("{}: {}", url, e),
            }
        }
    };

    let resp = client
        .get(url)
        .header(USER_AGENT, random_user_agent())
        .send()
        .map_err(classify)?;

    let status = resp.status();
    if status.as_u16() == 403 || status.as_u16() == 429 {
        return Err(ScraperError::Blocked {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    if !status.is_success() {
        return Err(ScraperError::Extraction {
            reason: format!("{} returned {}", url, status),
        });
    }
    resp.text().map_err(classify)
}

fn selectors(patterns: &[&str]) -> Vec<Selector> {
    patterns.iter().filter_map(|p| Selector::parse(p).ok()).collect()
}

/// CSS fallbacks per field, tried in order.
struct PageSelectors {
    name: Vec<Selector>,
    address: Vec<Selector>,
    website: Vec<Selector>,
    phone: Vec<Selector>,
    reviews: Vec<Selector>,
    rating: Vec<Selector>,
    business_type: Vec<Selector>,
    introduction: Vec<Selector>,
    services: Vec<Selector>,
    hours: Vec<Selector>,
    price: Vec<Selector>,
    spans: Vec<Selector>,
    photos: Vec<Selector>,
}

impl PageSelectors {
    fn new() -> Self {
        PageSelectors {
            name: selectors(&["div.TIHn2 h1.DUwDvf", "h1.DUwDvf", "h1"]),
            address: selectors(&[
                r#"button[data-item-id="address"] .fontBodyMedium"#,
                r#"button[data-item-id*="address"]"#,
                "div.Io6YTe",
            ]),
            website: selectors(&[
                r#"a[data-item-id="authority"]"#,
                r#"a[data-item-id*="authority"]"#,
            ]),
            phone: selectors(&[
                r#"button[data-item-id^="phone:tel:"] .fontBodyMedium"#,
                r#"button[data-item-id^="phone"]"#,
            ]),
            reviews: selectors(&[r#"span[aria-label*="review"]"#, r#"span[aria-label*="Review"]"#]),
            rating: selectors(&[
                r#"div.F7nice span[aria-hidden="true"]"#,
                "div.fontDisplayLarge",
            ]),
            business_type: selectors(&["button.DkEaL", "div.LBgpqf button"]),
            introduction: selectors(&["div.PYvSYb", "div.WeS02d"]),
            services: selectors(&["div.LTs0Rc", "div.etWJQ"]),
            hours: selectors(&[
                r#"button[data-item-id*="oh"] .fontBodyMedium"#,
                "div.MkV9 span.ZDu9vd",
            ]),
            price: selectors(&[r#"span[aria-label*="Price"]"#, r#"span[aria-label*="price"]"#]),
            spans: selectors(&["span"]),
            photos: selectors(&[r#"button[aria-label*="photo"]"#, r#"button[aria-label*="Photo"]"#]),
        }
    }
}

fn first_text(document: &Html, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        document.select(selector).find_map(|element| {
            let text = element.text().collect::<Vec<_>>().join(" ");
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            (!text.is_empty()).then_some(text)
        })
    })
}

fn first_attr(document: &Html, selectors: &[Selector], attr: &str) -> Option<String> {
    selectors.iter().find_map(|selector| {
        document
            .select(selector)
            .filter_map(|element| element.value().attr(attr))
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(str::to_string)
    })
}

/// HTTP-backed listing source: one search page, then one detail page per
/// listing, fetched lazily.
pub struct MapsScraper {
    client: Client,
    search_engine: SearchEngine,
    extractor: Extractor,
    selectors: PageSelectors,
    delays: DelayPolicy,
}

impl MapsScraper {
    pub fn new(search_url: &str, timeout: Duration, delays: DelayPolicy) -> Result<Self> {
        let client = build_client(timeout)?;
        Ok(MapsScraper {
            search_engine: SearchEngine::new(client.clone(), search_url),
            client,
            extractor: Extractor::new(),
            selectors: PageSelectors::new(),
            delays,
        })
    }

    fn fetch_place(&self, url: &str) -> Result<RawPlace> {
        let html = fetch(&self.client, url)?;
        let mut place = self.parse_place_page(&html, url);
        place.scraped_at = Some(Local::now().format("%Y-%m-%d %H:%M:%S").to_string());
        Ok(place)
    }

    /// Reads every field it can find. Unparseable fields stay empty.
    pub fn parse_place_page(&self, html: &str, page_url: &str) -> RawPlace {
        let document = Html::parse_document(html);
        let s = &self.selectors;

        let rating = first_text(&document, &s.rating).and_then(|raw| {
            self.extractor
                .parse_rating(&raw)
                .map_err(|e| debug!("{}", e))
                .ok()
        });
        let review_count = first_attr(&document, &s.reviews, "aria-label")
            .or_else(|| first_text(&document, &s.reviews))
            .and_then(|raw| {
                self.extractor
                    .parse_review_count(&raw)
                    .map_err(|e| debug!("{}", e))
                    .ok()
            });

        let mut features = BTreeSet::new();
        let mut services = BTreeSet::new();
        for selector in &s.services {
            for element in document.select(selector).take(10) {
                let text = element.text().collect::<Vec<_>>().join("\n");
                features.extend(self.extractor.detect_features(&text));
                services.extend(self.extractor.service_text(&text));
            }
        }
        let services_offered = (!services.is_empty())
            .then(|| services.into_iter().collect::<Vec<_>>().join("; "));

        let price_range = first_text(&document, &s.price).or_else(|| {
            s.spans.iter().find_map(|selector| {
                document
                    .select(selector)
                    .map(|element| element.text().collect::<String>().trim().to_string())
                    .find(|text| text.starts_with('₹'))
            })
        });

        let photos_count = s.photos.iter().find_map(|selector| {
            document
                .select(selector)
                .filter_map(|element| element.value().attr("aria-label"))
                .find_map(|label| {
                    self.extractor
                        .parse_photos_count(label)
                        .map_err(|e| debug!("{}", e))
                        .ok()
                })
        });
        let hours = first_text(&document, &s.hours);

        RawPlace {
            name: first_text(&document, &s.name),
            address: first_text(&document, &s.address),
            website: first_attr(&document, &s.website, "href")
                .or_else(|| first_text(&document, &s.website)),
            phone: first_text(&document, &s.phone),
            rating,
            review_count,
            price_range,
            business_type: first_text(&document, &s.business_type),
            introduction: first_text(&document, &s.introduction),
            features,
            services_offered,
            photos_count,
            maps_url: Some(page_url.to_string()),
            place_id: self.extractor.place_id_from_url(page_url),
            coordinates: self.extractor.coordinates_from_url(page_url),
            opens_at: hours.as_deref().map(|raw| self.extractor.clean_hours(raw)),
            full_hours: hours.as_deref().map(|raw| self.extractor.full_hours(raw)),
            scraped_at: None,
        }
    }
}

impl PlaceSource for MapsScraper {
    fn search<'a>(&'a mut self, keyword: &str, limit: Option<usize>) -> Result<PlaceStream<'a>> {
        let links = self.search_engine.listing_links(keyword, limit)?;
        info!("[{}] Total unique listings: {}", keyword, links.len());

        let this: &'a MapsScraper = self;
        let keyword = keyword.to_string();
        Ok(Box::new(links.into_iter().enumerate().filter_map(
            move |(idx, link)| {
                if idx > 0 {
                    this.delays.page_delay();
                }
                match this.fetch_place(&link) {
                    Ok(place) => Some(Ok(place)),
                    Err(e @ ScraperError::ExtractionTimeout { .. })
                    | Err(e @ ScraperError::Blocked { .. }) => Some(Err(e)),
                    Err(e) => {
                        warn!("[{}] Failed listing {}: {}", keyword, idx + 1, e);
                        None
                    }
                }
            },
        )))
    }
}

/// Replays listings recorded as `{"keyword": [RawPlace, ...]}` JSON.
#[derive(Debug, Default, Clone)]
pub struct FixtureSource {
    places: HashMap<String, Vec<RawPlace>>,
}

impl FixtureSource {
    pub fn new(places: HashMap<String, Vec<RawPlace>>) -> Self {
        FixtureSource { places }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| ScraperError::Input {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let places: HashMap<String, Vec<RawPlace>> = serde_json::from_str(&content)?;
        info!("Loaded replay data for {} keywords from {:?}", places.len(), path);
        Ok(FixtureSource { places })
    }
}

impl PlaceSource for FixtureSource {
    fn search<'a>(&'a mut self, keyword: &str, _limit: Option<usize>) -> Result<PlaceStream<'a>> {
        let places = self.places.get(keyword).cloned().unwrap_or_default();
        if places.is_empty() {
            warn!("[{}] No replay data", keyword);
        }
        Ok(Box::new(places.into_iter().map(Ok)))
    }
}
