use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::models::{NewProperty, PropertySearch};

const RENTCAST_BASE_URL: &str = "https://api.rentcast.io/v1";
const SQFT_PER_ACRE: f64 = 43560.0;

#[derive(Debug, Error)]
pub enum RentcastError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Port for the valuation/comparables/market lookups. Implementations never
/// fail: every remote problem degrades into placeholder or fallback data.
#[async_trait]
pub trait PropertyDataSource: Send + Sync {
    async fn fetch(&self, search: &PropertySearch) -> EnrichedProperty;
}

/// Normalized enrichment output, ready for the persistence layer.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedProperty {
    pub details: NewProperty,
    pub comparables: Vec<ComparableRecord>,
    pub market: Option<MarketSnapshot>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparableRecord {
    pub address: String,
    pub sale_price: String,
    pub beds: Option<i32>,
    pub baths: Option<String>,
    pub sqft: Option<i32>,
    pub price_per_sqft: Option<String>,
    pub sale_date: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub avg_days_on_market: Option<i32>,
    pub median_sale_price: Option<String>,
    pub avg_price_per_sqft: Option<String>,
    pub price_appreciation: Option<String>,
}

impl MarketSnapshot {
    /// Used when the credential is present but the market call failed.
    fn fallback(price_per_sqft: &str) -> Self {
        Self {
            avg_days_on_market: Some(30),
            median_sale_price: Some("0".to_string()),
            avg_price_per_sqft: Some(price_per_sqft.to_string()),
            price_appreciation: Some("0.0".to_string()),
        }
    }
}

impl EnrichedProperty {
    /// Placeholder record persisted when no Rentcast credential is configured.
    /// The parent row must still exist, so every field gets a sentinel.
    pub fn unavailable(search: &PropertySearch) -> Self {
        Self {
            details: NewProperty {
                address: search.address.clone(),
                city: search.city.clone(),
                state: search.state.clone(),
                zip_code: search.zip_code.clone(),
                beds: Some(0),
                baths: Some("0.0".to_string()),
                sqft: Some(0),
                year_built: Some(0),
                property_type: Some("Unknown".to_string()),
                lot_size: Some("N/A".to_string()),
                parking: Some("N/A".to_string()),
                has_pool: Some(false),
                hoa_fees: Some("0.00".to_string()),
                list_price: Some("0".to_string()),
                listing_status: Some("Data Unavailable".to_string()),
                days_on_market: Some(0),
                price_per_sqft: Some("0".to_string()),
                last_sale_price: Some("0".to_string()),
                last_sale_date: Some("N/A".to_string()),
            },
            comparables: Vec::new(),
            market: None,
        }
    }
}

// Raw Rentcast wire shapes. Every field is optional because the API omits
// whatever it does not know.

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RentcastPropertyRecord {
    bedrooms: Option<f64>,
    bathrooms: Option<f64>,
    square_footage: Option<i32>,
    year_built: Option<i32>,
    property_type: Option<String>,
    lot_size_acres: Option<f64>,
    lot_size_square_feet: Option<f64>,
    avm: Option<f64>,
    value: Option<f64>,
    last_sale_price: Option<f64>,
    last_sale_date: Option<String>,
    hoa_fees: Option<f64>,
    pool: Option<bool>,
    garage: Option<bool>,
    days_on_market: Option<i32>,
    listing_status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RentcastComparable {
    formatted_address: Option<String>,
    bedrooms: Option<i32>,
    bathrooms: Option<f64>,
    square_footage: Option<i32>,
    price: Option<f64>,
    removed_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RentcastMarketData {
    median_sale_price: Option<f64>,
    average_days_on_market: Option<i32>,
    price_appreciation: Option<f64>,
}

pub struct RentcastClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl RentcastClient {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key,
            base_url: RENTCAST_BASE_URL.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        key: &str,
        params: &[(&str, String)],
    ) -> Result<T, RentcastError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .header("X-Api-Key", key)
            .header("User-Agent", "PropAnalyzed/1.0")
            .query(params)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn property_details(&self, key: &str, full_address: &str) -> Option<RentcastPropertyRecord> {
        let params = [("address", full_address.to_string())];
        match self.get_json("/avm/value", key, &params).await {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!(
                    "Property details call failed ({}), attempting rent estimate endpoint",
                    e
                );
                match self.get_json("/avm/rent/long-term", key, &params).await {
                    Ok(record) => Some(record),
                    Err(e) => {
                        log::warn!(
                            "Both property endpoints failed for {}: {}",
                            full_address,
                            e
                        );
                        None
                    }
                }
            }
        }
    }

    async fn comparables(&self, key: &str, full_address: &str) -> Vec<RentcastComparable> {
        let params = [
            ("address", full_address.to_string()),
            ("compCount", "10".to_string()),
        ];
        match self
            .get_json::<Vec<RentcastComparable>>("/avm/value/comparables", key, &params)
            .await
        {
            Ok(comps) => comps,
            Err(e) => {
                log::warn!("Comparables call failed, returning empty list: {}", e);
                Vec::new()
            }
        }
    }

    async fn market_data(&self, key: &str, search: &PropertySearch) -> Option<RentcastMarketData> {
        let mut params = vec![
            ("city", search.city.clone()),
            ("state", search.state.clone()),
        ];
        if !search.zip_code.is_empty() {
            params.push(("zipCode", search.zip_code.clone()));
        }
        match self.get_json("/markets/rent", key, &params).await {
            Ok(market) => Some(market),
            Err(e) => {
                log::warn!("Market data call failed, using fallback snapshot: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl PropertyDataSource for RentcastClient {
    async fn fetch(&self, search: &PropertySearch) -> EnrichedProperty {
        let Some(key) = self.api_key.as_deref() else {
            log::warn!(
                "Rentcast API key not configured, persisting placeholder data for {}",
                search.address
            );
            return EnrichedProperty::unavailable(search);
        };

        let full_address = format_address_for_api(search);
        log::info!("Requesting Rentcast data for {}", full_address);

        let (details, comparables, market) = tokio::join!(
            self.property_details(key, &full_address),
            self.comparables(key, &full_address),
            self.market_data(key, search),
        );

        normalize(search, details, comparables, market)
    }
}

/// Expands street-type abbreviations and joins the components the way the
/// valuation API expects ("123 Oak Street, Los Angeles, CA 90012").
fn format_address_for_api(search: &PropertySearch) -> String {
    let mut full = expand_street_abbreviations(search.address.trim());
    let city = search.city.trim();
    let state = search.state.trim();
    let zip = search.zip_code.trim();
    if !city.is_empty() {
        full.push_str(", ");
        full.push_str(city);
    }
    if !state.is_empty() {
        full.push_str(", ");
        full.push_str(state);
    }
    if !zip.is_empty() {
        full.push(' ');
        full.push_str(zip);
    }
    full
}

fn expand_street_abbreviations(address: &str) -> String {
    address
        .split_whitespace()
        .map(|word| {
            let trimmed = word.trim_end_matches(['.', ',']);
            let suffix = &word[trimmed.len()..];
            let expanded = match trimmed.to_ascii_lowercase().as_str() {
                "ct" => "Court",
                "st" => "Street",
                "ave" => "Avenue",
                "dr" => "Drive",
                "rd" => "Road",
                "blvd" => "Boulevard",
                "ln" => "Lane",
                "pl" => "Place",
                _ => return word.to_string(),
            };
            format!("{}{}", expanded, suffix)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Coerces the raw Rentcast shapes into the internal model. The searched
/// address stays the stored identity; the remote formatting is query-only.
fn normalize(
    search: &PropertySearch,
    details: Option<RentcastPropertyRecord>,
    comparables: Vec<RentcastComparable>,
    market: Option<RentcastMarketData>,
) -> EnrichedProperty {
    let record = details.unwrap_or_default();

    let list_price = record.avm.or(record.value).unwrap_or(0.0);
    let sqft = record.square_footage.unwrap_or(0);
    let beds = record.bedrooms.map(|b| b as i32).unwrap_or(0);
    let baths = record.bathrooms.unwrap_or(0.0);

    let price_per_sqft = if sqft > 0 && list_price > 0.0 {
        format!("{:.0}", list_price / sqft as f64)
    } else {
        "0".to_string()
    };

    let lot_size = if let Some(acres) = record.lot_size_acres {
        format!("{:.2} acres", acres)
    } else if let Some(lot_sqft) = record.lot_size_square_feet {
        format!("{:.2} acres", lot_sqft / SQFT_PER_ACRE)
    } else {
        "N/A".to_string()
    };

    let listing_status = match record.listing_status {
        Some(s) if !s.is_empty() => s,
        _ if list_price > 0.0 => "Property Valued".to_string(),
        _ => "Data Available".to_string(),
    };

    let market_avg_dom = market.as_ref().and_then(|m| m.average_days_on_market);

    let details = NewProperty {
        address: search.address.clone(),
        city: search.city.clone(),
        state: search.state.clone(),
        zip_code: search.zip_code.clone(),
        beds: Some(beds),
        baths: Some(if baths > 0.0 {
            format!("{}", baths)
        } else {
            "0.0".to_string()
        }),
        sqft: Some(sqft),
        year_built: Some(record.year_built.unwrap_or(0)),
        property_type: Some(
            record
                .property_type
                .unwrap_or_else(|| "Single Family".to_string()),
        ),
        lot_size: Some(lot_size),
        parking: Some(if record.garage.unwrap_or(false) {
            "2-car garage".to_string()
        } else {
            "N/A".to_string()
        }),
        has_pool: Some(record.pool.unwrap_or(false)),
        hoa_fees: Some(
            record
                .hoa_fees
                .map(fmt_number)
                .unwrap_or_else(|| "0.00".to_string()),
        ),
        list_price: Some(if list_price > 0.0 {
            fmt_number(list_price)
        } else {
            "0".to_string()
        }),
        listing_status: Some(listing_status),
        days_on_market: Some(record.days_on_market.or(market_avg_dom).unwrap_or(0)),
        price_per_sqft: Some(price_per_sqft.clone()),
        last_sale_price: Some(fmt_number(record.last_sale_price.unwrap_or(0.0))),
        last_sale_date: Some(record.last_sale_date.unwrap_or_else(|| "N/A".to_string())),
    };

    let comparables = comparables
        .into_iter()
        .map(|comp| {
            let sale_price = comp.price.unwrap_or(0.0);
            let comp_sqft = comp.square_footage.unwrap_or(0);
            let ppsf = if comp_sqft > 0 && sale_price > 0.0 {
                format!("{:.0}", sale_price / comp_sqft as f64)
            } else {
                "0".to_string()
            };
            ComparableRecord {
                address: comp
                    .formatted_address
                    .unwrap_or_else(|| "Address Not Available".to_string()),
                sale_price: fmt_number(sale_price),
                beds: Some(comp.bedrooms.unwrap_or(0)),
                baths: Some(
                    comp.bathrooms
                        .map(|b| format!("{}", b))
                        .unwrap_or_else(|| "0".to_string()),
                ),
                sqft: Some(comp_sqft),
                price_per_sqft: Some(ppsf),
                sale_date: comp
                    .removed_date
                    .as_deref()
                    .and_then(sale_month)
                    .unwrap_or_else(|| "Recent".to_string()),
            }
        })
        .collect();

    let market = Some(match market {
        Some(m) => MarketSnapshot {
            avg_days_on_market: Some(m.average_days_on_market.unwrap_or(30)),
            median_sale_price: Some(fmt_number(m.median_sale_price.unwrap_or(0.0))),
            avg_price_per_sqft: Some(match (m.median_sale_price, sqft > 0) {
                (Some(median), true) => format!("{:.0}", median / sqft as f64),
                _ => price_per_sqft.clone(),
            }),
            price_appreciation: Some(format!("{:.1}", m.price_appreciation.unwrap_or(0.0))),
        },
        None => MarketSnapshot::fallback(&price_per_sqft),
    });

    EnrichedProperty {
        details,
        comparables,
        market,
    }
}

fn fmt_number(value: f64) -> String {
    if value == value.trunc() {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// "2023-10-15T00:00:00.000Z" -> "Oct 2023".
fn sale_month(raw: &str) -> Option<String> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.format("%b %Y").to_string());
    }
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.format("%b %Y").to_string())
}
