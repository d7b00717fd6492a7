use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::{comparable_sales, market_metrics, properties};

/// One persisted address record. Money columns are stored as text the way
/// the dashboard formats them, `baths` included ("3.5").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: i32,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub beds: Option<i32>,
    pub baths: Option<String>,
    pub sqft: Option<i32>,
    pub year_built: Option<i32>,
    pub property_type: Option<String>,
    pub lot_size: Option<String>,
    pub parking: Option<String>,
    pub has_pool: Option<bool>,
    pub hoa_fees: Option<String>,
    pub list_price: Option<String>,
    pub listing_status: Option<String>,
    pub days_on_market: Option<i32>,
    pub price_per_sqft: Option<String>,
    pub last_sale_price: Option<String>,
    pub last_sale_date: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = properties)]
pub struct NewProperty {
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub beds: Option<i32>,
    pub baths: Option<String>,
    pub sqft: Option<i32>,
    pub year_built: Option<i32>,
    pub property_type: Option<String>,
    pub lot_size: Option<String>,
    pub parking: Option<String>,
    pub has_pool: Option<bool>,
    pub hoa_fees: Option<String>,
    pub list_price: Option<String>,
    pub listing_status: Option<String>,
    pub days_on_market: Option<i32>,
    pub price_per_sqft: Option<String>,
    pub last_sale_price: Option<String>,
    pub last_sale_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable)]
#[serde(rename_all = "camelCase")]
pub struct ComparableSale {
    pub id: i32,
    pub property_id: i32,
    pub address: String,
    pub sale_price: String,
    pub beds: Option<i32>,
    pub baths: Option<String>,
    pub sqft: Option<i32>,
    pub price_per_sqft: Option<String>,
    /// Display-formatted ("Oct 2023"), not a date column.
    pub sale_date: String,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = comparable_sales)]
pub struct NewComparableSale {
    pub property_id: i32,
    pub address: String,
    pub sale_price: String,
    pub beds: Option<i32>,
    pub baths: Option<String>,
    pub sqft: Option<i32>,
    pub price_per_sqft: Option<String>,
    pub sale_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable)]
#[serde(rename_all = "camelCase")]
pub struct MarketMetrics {
    pub id: i32,
    pub property_id: i32,
    pub avg_days_on_market: Option<i32>,
    pub median_sale_price: Option<String>,
    pub avg_price_per_sqft: Option<String>,
    pub price_appreciation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = market_metrics)]
pub struct NewMarketMetrics {
    pub property_id: i32,
    pub avg_days_on_market: Option<i32>,
    pub median_sale_price: Option<String>,
    pub avg_price_per_sqft: Option<String>,
    pub price_appreciation: Option<String>,
}

/// A property hydrated with its child rows, the shape every endpoint returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyWithDetails {
    #[serde(flatten)]
    pub property: Property,
    pub comparables: Vec<ComparableSale>,
    pub market_metrics: Option<MarketMetrics>,
}

/// Incoming search payload. Validated before any database or network work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySearch {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: &str) -> Self {
        Self {
            field,
            message: message.to_string(),
        }
    }
}

impl PropertySearch {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if self.address.trim().is_empty() {
            errors.push(FieldError::new("address", "Address is required"));
        }
        if self.city.trim().is_empty() {
            errors.push(FieldError::new("city", "City is required"));
        }
        let state = self.state.trim();
        if state.is_empty() {
            errors.push(FieldError::new("state", "State is required"));
        } else if state.len() != 2 || !state.chars().all(|c| c.is_ascii_alphabetic()) {
            errors.push(FieldError::new(
                "state",
                "State must be a two-letter abbreviation",
            ));
        }
        if self.zip_code.trim().is_empty() {
            errors.push(FieldError::new("zipCode", "Zip code is required"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search() -> PropertySearch {
        PropertySearch {
            address: "123 Oak St".to_string(),
            city: "Los Angeles".to_string(),
            state: "CA".to_string(),
            zip_code: "90012".to_string(),
        }
    }

    #[test]
    fn complete_search_passes_validation() {
        assert!(search().validate().is_ok());
    }

    #[test]
    fn each_missing_field_is_reported() {
        let empty = PropertySearch {
            address: String::new(),
            city: String::new(),
            state: String::new(),
            zip_code: String::new(),
        };
        let errors = empty.validate().unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["address", "city", "state", "zipCode"]);
    }

    #[test]
    fn whitespace_only_address_is_rejected() {
        let mut s = search();
        s.address = "   ".to_string();
        let errors = s.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "address");
    }

    #[test]
    fn state_must_be_two_letters() {
        for bad in ["C", "CAL", "C9", "9A"] {
            let mut s = search();
            s.state = bad.to_string();
            let errors = s.validate().unwrap_err();
            assert_eq!(errors[0].field, "state", "state {:?} should fail", bad);
        }
    }

    #[test]
    fn missing_payload_fields_deserialize_as_empty() {
        let s: PropertySearch = serde_json::from_str(r#"{"address":"1 Main St"}"#).unwrap();
        assert_eq!(s.address, "1 Main St");
        assert!(s.city.is_empty());
        assert!(s.validate().is_err());
    }

    #[test]
    fn hydrated_property_serializes_flat_with_camel_case() {
        let property = Property {
            id: 7,
            address: "1847 Ocean Drive".to_string(),
            city: "Los Angeles".to_string(),
            state: "CA".to_string(),
            zip_code: "90210".to_string(),
            beds: Some(4),
            baths: Some("3.5".to_string()),
            sqft: Some(2850),
            year_built: Some(1998),
            property_type: Some("Single Family".to_string()),
            lot_size: Some("0.25 acres".to_string()),
            parking: Some("2-car garage".to_string()),
            has_pool: Some(true),
            hoa_fees: Some("125.00".to_string()),
            list_price: Some("1250000".to_string()),
            listing_status: Some("For Sale".to_string()),
            days_on_market: Some(34),
            price_per_sqft: Some("438".to_string()),
            last_sale_price: Some("985000".to_string()),
            last_sale_date: Some("2019-08-15".to_string()),
            created_at: None,
        };
        let with_details = PropertyWithDetails {
            property,
            comparables: vec![],
            market_metrics: None,
        };
        let value = serde_json::to_value(&with_details).unwrap();
        assert_eq!(value["zipCode"], "90210");
        assert_eq!(value["listingStatus"], "For Sale");
        assert_eq!(value["comparables"], serde_json::json!([]));
        assert!(value["marketMetrics"].is_null());
    }
}
