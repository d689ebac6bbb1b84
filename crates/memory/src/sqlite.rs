//! SQLite restaurant record store.
//!
//! A single `restaurants` table mirroring [`Restaurant`]. Filters are built
//! with `sqlx::QueryBuilder` so every criterion is a bound parameter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use concierge_core::error::StoreError;
use concierge_core::records::{Restaurant, RestaurantFilter, RestaurantStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

const COLUMNS: &str = "id, title, type, category, website, description, address, phone, \
rating, reviews, unclaimed, hours, opening_hours, people_also_search_for, menu, \
reservations, \"order\", order_food, created_at, updated_at";

pub struct SqliteRestaurantStore {
    pool: SqlitePool,
}

impl SqliteRestaurantStore {
    /// Open (creating if needed) the database at `url`, e.g.
    /// `sqlite://concierge.db` or `sqlite::memory:`.
    pub async fn new(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite URL: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        // Every connection to `:memory:` is a separate database.
        let max_connections = if url.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite restaurant store initialized at {url}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS restaurants (
                id                      INTEGER PRIMARY KEY AUTOINCREMENT,
                title                   TEXT NOT NULL,
                type                    TEXT NOT NULL,
                category                TEXT NOT NULL,
                website                 TEXT,
                description             TEXT,
                address                 TEXT,
                phone                   TEXT,
                rating                  REAL,
                reviews                 INTEGER,
                unclaimed               INTEGER,
                hours                   TEXT,
                opening_hours           TEXT,
                people_also_search_for  TEXT,
                menu                    TEXT,
                reservations            TEXT,
                "order"                 TEXT,
                order_food              TEXT,
                created_at              TEXT NOT NULL,
                updated_at              TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("restaurants table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_restaurants_category ON restaurants(category)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("category index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_restaurant(row: &SqliteRow) -> Result<Restaurant, StoreError> {
        fn col<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StoreError>
        where
            T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
        {
            row.try_get(name)
                .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
        }

        let parse_ts = |s: String| -> Result<DateTime<Utc>, StoreError> {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| StoreError::QueryFailed(format!("timestamp '{s}': {e}")))
        };

        Ok(Restaurant {
            id: Some(col(row, "id")?),
            title: col(row, "title")?,
            kind: col(row, "type")?,
            category: col(row, "category")?,
            website: col(row, "website")?,
            description: col(row, "description")?,
            address: col(row, "address")?,
            phone: col(row, "phone")?,
            rating: col(row, "rating")?,
            reviews: col(row, "reviews")?,
            unclaimed: col(row, "unclaimed")?,
            hours: col(row, "hours")?,
            opening_hours: col(row, "opening_hours")?,
            people_also_search_for: col(row, "people_also_search_for")?,
            menu: col(row, "menu")?,
            reservations: col(row, "reservations")?,
            order: col(row, "order")?,
            order_food: col(row, "order_food")?,
            created_at: Some(parse_ts(col(row, "created_at")?)?),
            updated_at: Some(parse_ts(col(row, "updated_at")?)?),
        })
    }
}

/// Escape LIKE wildcards so the needle matches literally.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[async_trait]
impl RestaurantStore for SqliteRestaurantStore {
    async fn create(&self, mut restaurant: Restaurant) -> Result<Restaurant, StoreError> {
        let now = Utc::now();
        let ts = now.to_rfc3339();

        let result = sqlx::query(
            r#"
            INSERT INTO restaurants (
                title, type, category, website, description, address, phone,
                rating, reviews, unclaimed, hours, opening_hours, people_also_search_for,
                menu, reservations, "order", order_food, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&restaurant.title)
        .bind(&restaurant.kind)
        .bind(&restaurant.category)
        .bind(&restaurant.website)
        .bind(&restaurant.description)
        .bind(&restaurant.address)
        .bind(&restaurant.phone)
        .bind(restaurant.rating)
        .bind(restaurant.reviews)
        .bind(restaurant.unclaimed)
        .bind(&restaurant.hours)
        .bind(&restaurant.opening_hours)
        .bind(&restaurant.people_also_search_for)
        .bind(&restaurant.menu)
        .bind(&restaurant.reservations)
        .bind(&restaurant.order)
        .bind(&restaurant.order_food)
        .bind(&ts)
        .bind(&ts)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("insert restaurant: {e}")))?;

        restaurant.id = Some(result.last_insert_rowid());
        restaurant.created_at = Some(now);
        restaurant.updated_at = Some(now);
        debug!(id = result.last_insert_rowid(), title = %restaurant.title, "Restaurant saved");
        Ok(restaurant)
    }

    async fn filter(&self, criteria: &RestaurantFilter) -> Result<Vec<Restaurant>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM restaurants WHERE 1 = 1"));

        if let Some(title) = &criteria.title {
            qb.push(" AND title = ").push_bind(title.clone());
        }
        if let Some(kind) = &criteria.kind {
            qb.push(" AND type = ").push_bind(kind.clone());
        }
        if let Some(category) = &criteria.category {
            qb.push(" AND category = ").push_bind(category.clone());
        }
        if let Some(address) = &criteria.address {
            qb.push(" AND address LIKE ")
                .push_bind(like_pattern(address))
                .push(" ESCAPE '\\'");
        }
        if let Some(min) = criteria.min_rating {
            qb.push(" AND rating >= ").push_bind(min);
        }
        if let Some(max) = criteria.max_reviews {
            qb.push(" AND reviews <= ").push_bind(max);
        }
        if let Some(unclaimed) = criteria.unclaimed {
            qb.push(" AND unclaimed = ").push_bind(unclaimed);
        }
        qb.push(" ORDER BY id");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("filter restaurants: {e}")))?;

        rows.iter().map(Self::row_to_restaurant).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> SqliteRestaurantStore {
        let store = SqliteRestaurantStore::new("sqlite::memory:").await.unwrap();
        let mut juliet = Restaurant::new("Juliet Italian Kitchen", "restaurant", "Italian")
            .with_address("1500 Barton Springs Rd, Austin, TX")
            .with_rating(4.4, 2100);
        juliet.unclaimed = Some(false);
        juliet.menu = Some("https://juliet-austin.com/menu".into());
        store.create(juliet).await.unwrap();

        store
            .create(
                Restaurant::new("L'Oca d'Oro", "restaurant", "Italian")
                    .with_address("1900 Simond Ave, Austin, TX")
                    .with_rating(4.6, 640),
            )
            .await
            .unwrap();
        store
            .create(Restaurant::new("Tiny 100% Taqueria", "food truck", "Mexican"))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn create_round_trips_fields() {
        let store = seeded().await;
        let all = store.filter(&RestaurantFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, Some(1));
        assert_eq!(all[0].unclaimed, Some(false));
        assert_eq!(all[0].menu.as_deref(), Some("https://juliet-austin.com/menu"));
        assert!(all[2].rating.is_none());
    }

    #[tokio::test]
    async fn filter_semantics_match_reference() {
        let store = seeded().await;
        let all = store.filter(&RestaurantFilter::default()).await.unwrap();

        let cases = vec![
            RestaurantFilter { category: Some("Italian".into()), ..Default::default() },
            RestaurantFilter { address: Some("simond".into()), ..Default::default() },
            RestaurantFilter { min_rating: Some(4.5), ..Default::default() },
            RestaurantFilter { max_reviews: Some(1000), ..Default::default() },
            RestaurantFilter { unclaimed: Some(false), ..Default::default() },
            RestaurantFilter { kind: Some("food truck".into()), ..Default::default() },
        ];
        for f in cases {
            let sql: Vec<_> = store.filter(&f).await.unwrap().into_iter().map(|r| r.id).collect();
            let reference: Vec<_> = all.iter().filter(|r| f.matches(r)).map(|r| r.id).collect();
            assert_eq!(sql, reference, "filter {f:?}");
        }
    }

    #[tokio::test]
    async fn like_wildcards_are_literal() {
        let store = seeded().await;
        store
            .create(Restaurant::new("Percent", "bar", "Bar").with_address("100% Main St"))
            .await
            .unwrap();
        store
            .create(Restaurant::new("Other", "bar", "Bar").with_address("1000 Main St"))
            .await
            .unwrap();

        let hits = store
            .filter(&RestaurantFilter { address: Some("0%".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Percent");
    }
}
