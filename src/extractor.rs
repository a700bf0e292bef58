use std::collections::BTreeSet;

use regex::Regex;

use crate::error::{Result, ScraperError};
use crate::record::Feature;

/// Text parsers for the loosely structured fields of a listing page.
pub struct Extractor {
    count_regex: Regex,
    rating_regex: Regex,
    coordinates_regex: Regex,
    place_id_regex: Regex,
    place_id_fallback_regex: Regex,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    pub fn new() -> Self {
        Extractor {
            count_regex: Regex::new(r"\d[\d,\x{A0}]*").unwrap(),
            rating_regex: Regex::new(r"(\d+[.,]\d+)").unwrap(),
            coordinates_regex: Regex::new(r"@(-?\d+\.\d+),(-?\d+\.\d+)").unwrap(),
            place_id_regex: Regex::new(r"place/[^/]+/data=.*?!3m1!4b1!4m\d+!3m\d+!1s([^!]+)").unwrap(),
            place_id_fallback_regex: Regex::new(r"data=.*?1s([^!]+)").unwrap(),
        }
    }

    /// "1,234 reviews" -> 1234
    pub fn parse_review_count(&self, text: &str) -> Result<u32> {
        self.parse_count(text, "review_count")
    }

    fn parse_count(&self, text: &str, field: &'static str) -> Result<u32> {
        let failure = || ScraperError::ExtractionParseFailure {
            field,
            raw: text.to_string(),
        };
        let found = self.count_regex.find(text).ok_or_else(failure)?;
        let digits: String = found.as_str().chars().filter(|c| c.is_ascii_digit()).collect();
        digits.parse().map_err(|_| failure())
    }

    /// "4,6 stars" -> 4.6
    pub fn parse_rating(&self, text: &str) -> Result<f64> {
        let failure = || ScraperError::ExtractionParseFailure {
            field: "rating",
            raw: text.to_string(),
        };
        let caps = self.rating_regex.captures(text).ok_or_else(failure)?;
        caps[1].replace(',', ".").parse().map_err(|_| failure())
    }

    /// Detects service options from text such as "Dine-in · Takeaway · Delivery".
    /// Only the part after the first "·" is considered.
    pub fn detect_features(&self, text: &str) -> BTreeSet<Feature> {
        let mut features = BTreeSet::new();
        let Some(check) = self.service_text(text) else {
            return features;
        };

        if ["shop", "shopping", "store"].iter().any(|w| check.contains(w)) {
            features.insert(Feature::InStore);
        }
        if ["pickup", "pick-up", "takeaway"].iter().any(|w| check.contains(w)) {
            features.insert(Feature::Pickup);
            features.insert(Feature::Takeaway);
        }
        if ["delivery", "deliver"].iter().any(|w| check.contains(w)) {
            features.insert(Feature::Delivery);
        }
        if ["dine-in", "dine in", "dining"].iter().any(|w| check.contains(w)) {
            features.insert(Feature::DineIn);
        }
        if ["reservation", "booking"].iter().any(|w| check.contains(w)) {
            features.insert(Feature::Reservations);
        }
        features
    }

    /// Lower-cased service text after the first "·", newlines removed.
    pub fn service_text(&self, text: &str) -> Option<String> {
        let (_, rest) = text.split_once('·')?;
        let check = rest.replace('\n', "").trim().to_lowercase();
        (!check.is_empty()).then_some(check)
    }

    /// "See photos (1,024)" or "120 Photos" -> the first number found.
    pub fn parse_photos_count(&self, text: &str) -> Result<u32> {
        if !text.to_lowercase().contains("photo") {
            return Err(ScraperError::ExtractionParseFailure {
                field: "photos_count",
                raw: text.to_string(),
            });
        }
        self.parse_count(text, "photos_count")
    }

    /// "https://.../@11.05,76.07,17z/..." -> "11.05, 76.07"
    pub fn coordinates_from_url(&self, url: &str) -> Option<String> {
        self.coordinates_regex
            .captures(url)
            .map(|caps| format!("{}, {}", &caps[1], &caps[2]))
    }

    pub fn place_id_from_url(&self, url: &str) -> Option<String> {
        self.place_id_regex
            .captures(url)
            .or_else(|| self.place_id_fallback_regex.captures(url))
            .map(|caps| caps[1].to_string())
    }

    /// Keeps the part after "⋅" of an opening-hours line and strips narrow
    /// no-break spaces.
    pub fn clean_hours(&self, text: &str) -> String {
        let text = self.full_hours(text);
        match text.split_once('⋅') {
            Some((_, after)) => after.trim().to_string(),
            None => text,
        }
    }

    /// The whole opening-hours line, narrow no-break spaces removed.
    pub fn full_hours(&self, text: &str) -> String {
        text.replace('\u{202f}', "").trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_review_counts() {
        let extractor = Extractor::new();
        assert_eq!(extractor.parse_review_count("1,234 reviews").unwrap(), 1234);
        assert_eq!(extractor.parse_review_count("(87)").unwrap(), 87);
        assert!(matches!(
            extractor.parse_review_count("no reviews"),
            Err(ScraperError::ExtractionParseFailure { field: "review_count", .. })
        ));
    }

    #[test]
    fn parses_ratings_with_either_decimal_mark() {
        let extractor = Extractor::new();
        assert_eq!(extractor.parse_rating("4.5").unwrap(), 4.5);
        assert_eq!(extractor.parse_rating("Rated 3,9 stars").unwrap(), 3.9);
        assert!(extractor.parse_rating("5 stars").is_err());
    }

    #[test]
    fn detects_features_after_separator() {
        let extractor = Extractor::new();
        let features = extractor.detect_features("Bakery · In-store shopping\nDelivery");
        assert!(features.contains(&Feature::InStore));
        assert!(features.contains(&Feature::Delivery));
        assert!(!features.contains(&Feature::Pickup));
        assert!(extractor.detect_features("Delivery only").is_empty());
    }

    #[test]
    fn reads_coordinates_and_place_id_from_url() {
        let extractor = Extractor::new();
        let url = "https://www.google.com/maps/place/Paragon/@11.0510,76.0711,17z/data=!3m1!4b1!4m6!3m5!1s0x3ba64:0x9f2!8m2";
        assert_eq!(
            extractor.coordinates_from_url(url).as_deref(),
            Some("11.0510, 76.0711")
        );
        assert_eq!(extractor.place_id_from_url(url).as_deref(), Some("0x3ba64:0x9f2"));
        assert_eq!(extractor.coordinates_from_url("https://example.com"), None);
    }

    #[test]
    fn cleans_opening_hours() {
        let extractor = Extractor::new();
        assert_eq!(extractor.clean_hours("Open ⋅ Closes 10\u{202f}pm"), "Closes 10pm");
        assert_eq!(extractor.clean_hours(" Open 24 hours "), "Open 24 hours");
        assert_eq!(
            extractor.full_hours(" Open ⋅ Closes 10\u{202f}pm "),
            "Open ⋅ Closes 10pm"
        );
    }

    #[test]
    fn detects_dining_options() {
        let extractor = Extractor::new();
        let features = extractor.detect_features("Restaurant · Dine-in · Takeaway · Reservations");
        assert!(features.contains(&Feature::DineIn));
        assert!(features.contains(&Feature::Takeaway));
        assert!(features.contains(&Feature::Pickup));
        assert!(features.contains(&Feature::Reservations));
        assert!(!features.contains(&Feature::Delivery));
        assert_eq!(
            extractor.service_text("Cafe ·\nDine-in").as_deref(),
            Some("dine-in")
        );
        assert_eq!(extractor.service_text("no separator"), None);
    }

    #[test]
    fn parses_photo_counts_only_from_photo_labels() {
        let extractor = Extractor::new();
        assert_eq!(extractor.parse_photos_count("See photos (1,024)").unwrap(), 1024);
        assert_eq!(extractor.parse_photos_count("120 Photos").unwrap(), 120);
        assert!(matches!(
            extractor.parse_photos_count("1,208 reviews"),
            Err(ScraperError::ExtractionParseFailure { field: "photos_count", .. })
        ));
    }
}
