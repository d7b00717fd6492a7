use std::sync::Arc;

use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

use crate::db;
use crate::models::{
    ComparableSale, MarketMetrics, NewComparableSale, NewMarketMetrics, Property,
    PropertySearch, PropertyWithDetails,
};
use crate::rentcast::{EnrichedProperty, PropertyDataSource};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database connection failed: {0}")]
    Connection(#[from] diesel::ConnectionError),
    #[error("database query failed: {0}")]
    Query(#[from] DieselError),
}

/// Repository port. Route handlers only see this trait; tests swap in an
/// in-memory implementation.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Exact, case-sensitive address lookup; a miss creates the property.
    async fn search_property(
        &self,
        search: &PropertySearch,
    ) -> Result<Option<PropertyWithDetails>, StorageError>;

    async fn get_property_by_id(
        &self,
        id: i32,
    ) -> Result<Option<PropertyWithDetails>, StorageError>;

    async fn get_all_properties(&self) -> Result<Vec<PropertyWithDetails>, StorageError>;

    async fn create_property(
        &self,
        search: &PropertySearch,
    ) -> Result<PropertyWithDetails, StorageError>;
}

pub struct PgStorage {
    database_url: String,
    source: Arc<dyn PropertyDataSource>,
}

impl PgStorage {
    pub fn new(database_url: String, source: Arc<dyn PropertyDataSource>) -> Self {
        Self {
            database_url,
            source,
        }
    }

    fn find_by_address(
        conn: &mut PgConnection,
        address: &str,
    ) -> Result<Option<Property>, StorageError> {
        use crate::schema::properties;
        Ok(properties::table
            .filter(properties::address.eq(address))
            .first::<Property>(conn)
            .optional()?)
    }

    fn hydrate(
        conn: &mut PgConnection,
        property: Property,
    ) -> Result<PropertyWithDetails, StorageError> {
        use crate::schema::{comparable_sales, market_metrics};

        let comparables = comparable_sales::table
            .filter(comparable_sales::property_id.eq(property.id))
            .load::<ComparableSale>(conn)?;
        let metrics = market_metrics::table
            .filter(market_metrics::property_id.eq(property.id))
            .first::<MarketMetrics>(conn)
            .optional()?;

        Ok(PropertyWithDetails {
            property,
            comparables,
            market_metrics: metrics,
        })
    }

    /// Inserts the property and its child rows as one unit of work. Either
    /// all three record sets commit or none do.
    fn insert_enriched(
        conn: &mut PgConnection,
        enriched: &EnrichedProperty,
    ) -> Result<Property, DieselError> {
        use crate::schema::{comparable_sales, market_metrics, properties};

        conn.transaction(|conn| {
            let property: Property = diesel::insert_into(properties::table)
                .values(&enriched.details)
                .get_result(conn)?;

            if !enriched.comparables.is_empty() {
                let rows: Vec<NewComparableSale> = enriched
                    .comparables
                    .iter()
                    .map(|comp| NewComparableSale {
                        property_id: property.id,
                        address: comp.address.clone(),
                        sale_price: comp.sale_price.clone(),
                        beds: comp.beds,
                        baths: comp.baths.clone(),
                        sqft: comp.sqft,
                        price_per_sqft: comp.price_per_sqft.clone(),
                        sale_date: comp.sale_date.clone(),
                    })
                    .collect();
                diesel::insert_into(comparable_sales::table)
                    .values(&rows)
                    .execute(conn)?;
            }

            if let Some(market) = &enriched.market {
                diesel::insert_into(market_metrics::table)
                    .values(&NewMarketMetrics {
                        property_id: property.id,
                        avg_days_on_market: market.avg_days_on_market,
                        median_sale_price: market.median_sale_price.clone(),
                        avg_price_per_sqft: market.avg_price_per_sqft.clone(),
                        price_appreciation: market.price_appreciation.clone(),
                    })
                    .execute(conn)?;
            }

            Ok(property)
        })
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn search_property(
        &self,
        search: &PropertySearch,
    ) -> Result<Option<PropertyWithDetails>, StorageError> {
        let mut conn = db::establish_connection(&self.database_url)?;
        if let Some(existing) = Self::find_by_address(&mut conn, &search.address)? {
            log::info!("Found existing property {} for {}", existing.id, search.address);
            return Ok(Some(Self::hydrate(&mut conn, existing)?));
        }
        drop(conn);

        Ok(Some(self.create_property(search).await?))
    }

    async fn get_property_by_id(
        &self,
        id: i32,
    ) -> Result<Option<PropertyWithDetails>, StorageError> {
        use crate::schema::properties;

        let mut conn = db::establish_connection(&self.database_url)?;
        let property = properties::table
            .find(id)
            .first::<Property>(&mut conn)
            .optional()?;
        match property {
            Some(p) => Ok(Some(Self::hydrate(&mut conn, p)?)),
            None => Ok(None),
        }
    }

    async fn get_all_properties(&self) -> Result<Vec<PropertyWithDetails>, StorageError> {
        use crate::schema::properties;

        let mut conn = db::establish_connection(&self.database_url)?;
        let rows = properties::table
            .order_by(properties::id.asc())
            .load::<Property>(&mut conn)?;
        rows.into_iter()
            .map(|p| Self::hydrate(&mut conn, p))
            .collect()
    }

    async fn create_property(
        &self,
        search: &PropertySearch,
    ) -> Result<PropertyWithDetails, StorageError> {
        let enriched = self.source.fetch(search).await;

        let mut conn = db::establish_connection(&self.database_url)?;
        match Self::insert_enriched(&mut conn, &enriched) {
            Ok(property) => {
                log::info!("Created property {} for {}", property.id, search.address);
                Self::hydrate(&mut conn, property)
            }
            // Lost a concurrent first-time search for the same address; the
            // unique index rolled us back, so return the winner row.
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                log::info!(
                    "Concurrent creation detected for {}, returning existing row",
                    search.address
                );
                let winner = Self::find_by_address(&mut conn, &search.address)?
                    .ok_or(DieselError::NotFound)?;
                Self::hydrate(&mut conn, winner)
            }
            Err(e) => {
                log::error!("Failed to create property for {}: {}", search.address, e);
                Err(e.into())
            }
        }
    }
}
