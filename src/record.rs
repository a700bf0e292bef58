use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Service options a listing can advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    InStore,
    Pickup,
    Delivery,
    DineIn,
    Takeaway,
    Reservations,
}

/// A listing as handed over by a `PlaceSource`. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawPlace {
    pub name: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
    pub price_range: Option<String>,
    pub business_type: Option<String>,
    pub introduction: Option<String>,
    pub features: BTreeSet<Feature>,
    pub services_offered: Option<String>,
    pub photos_count: Option<u32>,
    pub maps_url: Option<String>,
    pub place_id: Option<String>,
    pub coordinates: Option<String>,
    pub opens_at: Option<String>,
    pub full_hours: Option<String>,
    pub scraped_at: Option<String>,
}

impl RawPlace {
    /// Entries without a name, an address or a phone number carry nothing
    /// worth keeping.
    pub fn has_useful_data(&self) -> bool {
        [&self.name, &self.address, &self.phone]
            .iter()
            .any(|field| field.as_deref().map_or(false, |v| !v.trim().is_empty()))
    }

    pub fn into_place(self, source_keyword: &str, category: &str) -> Place {
        Place {
            name: self.name.map(|s| s.trim().to_string()).unwrap_or_default(),
            address: self.address.map(|s| s.trim().to_string()).unwrap_or_default(),
            website: non_empty(self.website),
            phone: non_empty(self.phone),
            rating: self.rating,
            review_count: self.review_count,
            price_range: non_empty(self.price_range),
            business_type: non_empty(self.business_type),
            introduction: non_empty(self.introduction),
            features: self.features,
            services_offered: non_empty(self.services_offered),
            photos_count: self.photos_count,
            maps_url: non_empty(self.maps_url),
            place_id: non_empty(self.place_id),
            coordinates: non_empty(self.coordinates),
            opens_at: non_empty(self.opens_at),
            full_hours: non_empty(self.full_hours),
            source_keyword: source_keyword.to_string(),
            category: category.to_string(),
            scraped_at: non_empty(self.scraped_at),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// An accepted business entry. Never mutated after acceptance.
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub name: String,
    pub address: String,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
    pub price_range: Option<String>,
    pub business_type: Option<String>,
    pub introduction: Option<String>,
    pub features: BTreeSet<Feature>,
    pub services_offered: Option<String>,
    pub photos_count: Option<u32>,
    pub maps_url: Option<String>,
    pub place_id: Option<String>,
    pub coordinates: Option<String>,
    pub opens_at: Option<String>,
    pub full_hours: Option<String>,
    pub source_keyword: String,
    pub category: String,
    pub scraped_at: Option<String>,
}

impl Place {
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey::new(&self.name, &self.address)
    }
}

/// Normalized `(name, address)` pair identifying a business.
///
/// Both parts are case-folded, punctuation is treated as whitespace and runs
/// of whitespace collapse to a single space. An empty address is a valid
/// value of its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    name: String,
    address: String,
}

impl IdentityKey {
    pub fn new(name: &str, address: &str) -> Self {
        IdentityKey {
            name: normalize(name),
            address: normalize(address),
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.name, self.address)
    }
}

fn normalize(value: &str) -> String {
    let folded: String = value
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Flat CSV shape of a `Place`. Features become Yes/No columns.
#[derive(Debug, Serialize, Deserialize)]
pub struct PlaceRow {
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub business_type: Option<String>,
    pub category: String,
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
    pub price_range: Option<String>,
    pub in_store: String,
    pub pickup: String,
    pub delivery: String,
    pub dine_in: String,
    pub takeaway: String,
    pub reservations: String,
    pub opens_at: Option<String>,
    pub full_hours: Option<String>,
    pub introduction: Option<String>,
    pub services_offered: Option<String>,
    pub photos_count: Option<u32>,
    pub maps_url: Option<String>,
    pub place_id: Option<String>,
    pub coordinates: Option<String>,
    pub source_keyword: String,
    pub scraped_at: Option<String>,
}

fn yes_no(features: &BTreeSet<Feature>, feature: Feature) -> String {
    if features.contains(&feature) { "Yes" } else { "No" }.to_string()
}

impl From<&Place> for PlaceRow {
    fn from(place: &Place) -> Self {
        let flag = |feature| yes_no(&place.features, feature);
        PlaceRow {
            name: place.name.clone(),
            address: place.address.clone(),
            phone: place.phone.clone(),
            website: place.website.clone(),
            business_type: place.business_type.clone(),
            category: place.category.clone(),
            rating: place.rating,
            review_count: place.review_count,
            price_range: place.price_range.clone(),
            in_store: flag(Feature::InStore),
            pickup: flag(Feature::Pickup),
            delivery: flag(Feature::Delivery),
            dine_in: flag(Feature::DineIn),
            takeaway: flag(Feature::Takeaway),
            reservations: flag(Feature::Reservations),
            opens_at: place.opens_at.clone(),
            full_hours: place.full_hours.clone(),
            introduction: place.introduction.clone(),
            services_offered: place.services_offered.clone(),
            photos_count: place.photos_count,
            maps_url: place.maps_url.clone(),
            place_id: place.place_id.clone(),
            coordinates: place.coordinates.clone(),
            source_keyword: place.source_keyword.clone(),
            scraped_at: place.scraped_at.clone(),
        }
    }
}

impl From<PlaceRow> for Place {
    fn from(row: PlaceRow) -> Self {
        let features = [
            (&row.in_store, Feature::InStore),
            (&row.pickup, Feature::Pickup),
            (&row.delivery, Feature::Delivery),
            (&row.dine_in, Feature::DineIn),
            (&row.takeaway, Feature::Takeaway),
            (&row.reservations, Feature::Reservations),
        ]
        .into_iter()
        .filter(|(flag, _)| flag.eq_ignore_ascii_case("yes"))
        .map(|(_, feature)| feature)
        .collect();
        Place {
            name: row.name,
            address: row.address,
            website: row.website,
            phone: row.phone,
            rating: row.rating,
            review_count: row.review_count,
            price_range: row.price_range,
            business_type: row.business_type,
            introduction: row.introduction,
            features,
            services_offered: row.services_offered,
            photos_count: row.photos_count,
            maps_url: row.maps_url,
            place_id: row.place_id,
            coordinates: row.coordinates,
            opens_at: row.opens_at,
            full_hours: row.full_hours,
            source_keyword: row.source_keyword,
            category: row.category,
            scraped_at: row.scraped_at,
        }
    }
}
