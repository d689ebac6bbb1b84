//! In-memory restaurant record store.

use async_trait::async_trait;
use chrono::Utc;
use concierge_core::error::StoreError;
use concierge_core::records::{Restaurant, RestaurantFilter, RestaurantStore};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryRestaurantStore {
    rows: RwLock<Vec<Restaurant>>,
}

impl InMemoryRestaurantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }
}

#[async_trait]
impl RestaurantStore for InMemoryRestaurantStore {
    async fn create(&self, mut restaurant: Restaurant) -> Result<Restaurant, StoreError> {
        let mut rows = self.rows.write().await;
        let now = Utc::now();
        restaurant.id = Some(rows.len() as i64 + 1);
        restaurant.created_at = Some(now);
        restaurant.updated_at = Some(now);
        rows.push(restaurant.clone());
        Ok(restaurant)
    }

    async fn filter(&self, criteria: &RestaurantFilter) -> Result<Vec<Restaurant>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows.iter().filter(|r| criteria.matches(r)).cloned().collect())
    }
}
