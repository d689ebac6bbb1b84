//! Restaurant records and the record store contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A saved restaurant.
///
/// Free-form fields (hours, menu, reservations, ...) are stored as the text
/// the search provider returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unclaimed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening_hours: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub people_also_search_for: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservations: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_food: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Restaurant {
    pub fn new(
        title: impl Into<String>,
        kind: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            title: title.into(),
            kind: kind.into(),
            category: category.into(),
            website: None,
            description: None,
            address: None,
            phone: None,
            rating: None,
            reviews: None,
            unclaimed: None,
            hours: None,
            opening_hours: None,
            people_also_search_for: None,
            menu: None,
            reservations: None,
            order: None,
            order_food: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_rating(mut self, rating: f64, reviews: i64) -> Self {
        self.rating = Some(rating);
        self.reviews = Some(reviews);
        self
    }
}

/// Filter criteria for record lookups. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RestaurantFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Case-insensitive substring of the address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_reviews: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unclaimed: Option<bool>,
}

impl RestaurantFilter {
    /// Reference semantics shared by every backend.
    ///
    /// Records missing a compared numeric field never satisfy a bound on it.
    pub fn matches(&self, r: &Restaurant) -> bool {
        if self.title.as_ref().is_some_and(|t| *t != r.title) {
            return false;
        }
        if self.kind.as_ref().is_some_and(|k| *k != r.kind) {
            return false;
        }
        if self.category.as_ref().is_some_and(|c| *c != r.category) {
            return false;
        }
        if let Some(needle) = &self.address {
            let needle = needle.to_lowercase();
            match &r.address {
                Some(addr) if addr.to_lowercase().contains(&needle) => {}
                _ => return false,
            }
        }
        if let Some(min) = self.min_rating {
            if !r.rating.is_some_and(|v| v >= min) {
                return false;
            }
        }
        if let Some(max) = self.max_reviews {
            if !r.reviews.is_some_and(|v| v <= max) {
                return false;
            }
        }
        if let Some(unclaimed) = self.unclaimed {
            if r.unclaimed != Some(unclaimed) {
                return false;
            }
        }
        true
    }
}

/// Domain record store: plain create/filter access.
#[async_trait]
pub trait RestaurantStore: Send + Sync {
    /// Persist a record, returning it with its assigned id and timestamps.
    async fn create(&self, restaurant: Restaurant) -> Result<Restaurant, StoreError>;

    async fn filter(&self, criteria: &RestaurantFilter) -> Result<Vec<Restaurant>, StoreError>;
}
