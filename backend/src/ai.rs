use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::PropertyWithDetails;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

const SYSTEM_PROMPT: &str = "You are an expert real estate wholesaler and investor with 20+ years \
of experience. Provide detailed, actionable analysis for property investment decisions. Always \
respond with valid JSON format.";

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("OpenAI API key not configured")]
    MissingCredential,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("completion had no content")]
    EmptyResponse,
    #[error("invalid json in completion: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C-")]
    CMinus,
    #[serde(rename = "D+")]
    DPlus,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "D-")]
    DMinus,
    #[serde(rename = "F")]
    F,
}

impl Grade {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "A+" => Some(Self::APlus),
            "A" => Some(Self::A),
            "A-" => Some(Self::AMinus),
            "B+" => Some(Self::BPlus),
            "B" => Some(Self::B),
            "B-" => Some(Self::BMinus),
            "C+" => Some(Self::CPlus),
            "C" => Some(Self::C),
            "C-" => Some(Self::CMinus),
            "D+" => Some(Self::DPlus),
            "D" => Some(Self::D),
            "D-" => Some(Self::DMinus),
            "F" => Some(Self::F),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarketPosition {
    Excellent,
    Good,
    Average,
    #[serde(rename = "Below Average")]
    BelowAverage,
    Poor,
}

impl MarketPosition {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Excellent" => Some(Self::Excellent),
            "Good" => Some(Self::Good),
            "Average" => Some(Self::Average),
            "Below Average" => Some(Self::BelowAverage),
            "Poor" => Some(Self::Poor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Urgency {
    #[serde(rename = "Buy ASAP")]
    BuyAsap,
    #[serde(rename = "Strong Consider")]
    StrongConsider,
    #[serde(rename = "Evaluate Further")]
    EvaluateFurther,
    #[serde(rename = "Proceed with Caution")]
    ProceedWithCaution,
    Avoid,
}

impl Urgency {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Buy ASAP" => Some(Self::BuyAsap),
            "Strong Consider" => Some(Self::StrongConsider),
            "Evaluate Further" => Some(Self::EvaluateFurther),
            "Proceed with Caution" => Some(Self::ProceedWithCaution),
            "Avoid" => Some(Self::Avoid),
            _ => None,
        }
    }
}

/// Transient grading result. Computed per request, never persisted; the
/// model may grade the same property differently across calls.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyAnalysis {
    pub grade: Grade,
    pub score: f64,
    pub summary: String,
    pub key_strengths: Vec<String>,
    pub risk_factors: Vec<String>,
    pub recommendation: String,
    pub estimated_profit: f64,
    pub confidence_level: f64,
    pub market_position: MarketPosition,
    pub urgency: Urgency,
}

/// Port for the grading step so route handlers and tests can swap the
/// hosted model for a fake.
#[async_trait]
pub trait PropertyAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        property: &PropertyWithDetails,
    ) -> Result<PropertyAnalysis, AnalysisError>;
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(
        api_key: Option<String>,
        model: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key,
            model,
            base_url: OPENAI_BASE_URL.to_string(),
        })
    }
}

#[async_trait]
impl PropertyAnalyzer for OpenAiClient {
    async fn analyze(
        &self,
        property: &PropertyWithDetails,
    ) -> Result<PropertyAnalysis, AnalysisError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(AnalysisError::MissingCredential)?;

        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": build_prompt(property) },
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0.3,
        });

        let completion: ChatCompletion = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(AnalysisError::EmptyResponse)?;

        let raw: Value = serde_json::from_str(&content)?;
        Ok(coerce_analysis(&raw))
    }
}

/// Deterministic prompt embedding every known attribute, "N/A" for the rest.
fn build_prompt(property: &PropertyWithDetails) -> String {
    let p = &property.property;
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "As an expert real estate wholesaler and investor, analyze this property for investment potential and provide a comprehensive grading.\n"
    );
    let _ = writeln!(prompt, "PROPERTY DATA:");
    let _ = writeln!(
        prompt,
        "Address: {}, {}, {} {}",
        p.address, p.city, p.state, p.zip_code
    );
    let _ = writeln!(
        prompt,
        "Beds/Baths: {}/{}",
        opt_count(p.beds),
        opt_text(&p.baths)
    );
    let _ = writeln!(prompt, "Square Footage: {}", opt_count(p.sqft));
    let _ = writeln!(prompt, "Lot Size: {}", opt_text(&p.lot_size));
    let _ = writeln!(prompt, "Year Built: {}", opt_count(p.year_built));
    let _ = writeln!(prompt, "Property Type: {}", opt_text(&p.property_type));
    let _ = writeln!(prompt, "List Price: ${}", opt_text(&p.list_price));
    let _ = writeln!(prompt, "Last Sale Price: ${}", opt_text(&p.last_sale_price));
    let _ = writeln!(prompt, "Last Sale Date: {}", opt_text(&p.last_sale_date));
    let _ = writeln!(prompt, "Days on Market: {}", opt_count(p.days_on_market));
    let _ = writeln!(prompt, "Price per Sq Ft: ${}", opt_text(&p.price_per_sqft));
    let _ = writeln!(prompt, "HOA Fees: ${}", opt_text(&p.hoa_fees));
    let _ = writeln!(
        prompt,
        "Has Pool: {}",
        if p.has_pool.unwrap_or(false) { "Yes" } else { "No" }
    );
    let _ = writeln!(prompt, "Parking: {}", opt_text(&p.parking));
    let _ = writeln!(prompt, "Listing Status: {}", opt_text(&p.listing_status));

    let _ = writeln!(prompt, "\nCOMPARABLE SALES:");
    for comp in &property.comparables {
        let _ = writeln!(
            prompt,
            "- {}: ${} ({} sq ft, sold {})",
            comp.address,
            comp.sale_price,
            opt_count(comp.sqft),
            comp.sale_date
        );
    }

    let _ = writeln!(prompt, "\nMARKET METRICS:");
    let m = property.market_metrics.as_ref();
    let _ = writeln!(
        prompt,
        "Median Sale Price: ${}",
        opt_text(&m.and_then(|m| m.median_sale_price.clone()))
    );
    let _ = writeln!(
        prompt,
        "Average Days on Market: {}",
        opt_count(m.and_then(|m| m.avg_days_on_market))
    );
    let _ = writeln!(
        prompt,
        "Average Price per Sq Ft: ${}",
        opt_text(&m.and_then(|m| m.avg_price_per_sqft.clone()))
    );
    let _ = writeln!(
        prompt,
        "Price Appreciation: {}%",
        opt_text(&m.and_then(|m| m.price_appreciation.clone()))
    );

    prompt.push_str(
        r#"
Analyze this property for wholesaling/investment potential and provide a JSON response with:
{
  "grade": "Letter grade from F to A+",
  "score": "Numerical score 0-100",
  "summary": "3-sentence executive summary",
  "keyStrengths": ["Array of 3-5 key strengths"],
  "riskFactors": ["Array of 3-5 risk factors"],
  "recommendation": "Detailed investment recommendation",
  "estimatedProfit": "Estimated profit potential in dollars",
  "confidenceLevel": "Confidence in analysis 0-100",
  "marketPosition": "Excellent|Good|Average|Below Average|Poor",
  "urgency": "Buy ASAP|Strong Consider|Evaluate Further|Proceed with Caution|Avoid"
}

Consider factors like:
- Market value vs listing price (deal potential)
- Rental income potential vs purchase price
- Days on market (motivation level)
- Comparable sales analysis
- Location quality (schools, crime, walkability)
- Property condition indicators
- Market trends and inventory
- Profit margins for wholesaling
- Cash flow potential for buy-and-hold
"#,
    );

    prompt
}

fn opt_text(value: &Option<String>) -> &str {
    match value {
        Some(s) if !s.is_empty() => s,
        _ => "N/A",
    }
}

fn opt_count(value: Option<i32>) -> String {
    match value {
        Some(n) if n != 0 => n.to_string(),
        _ => "N/A".to_string(),
    }
}

/// Defensively coerces whatever the model returned into a well-formed
/// analysis: clamped ranges, enumerated fields, generic fallbacks. A
/// malformed grade is worse than a conservative one.
fn coerce_analysis(raw: &Value) -> PropertyAnalysis {
    PropertyAnalysis {
        grade: raw["grade"]
            .as_str()
            .and_then(Grade::parse)
            .unwrap_or(Grade::C),
        score: numeric(&raw["score"]).unwrap_or(50.0).clamp(0.0, 100.0),
        summary: text_or(&raw["summary"], "Analysis completed with limited data."),
        key_strengths: string_list(&raw["keyStrengths"])
            .unwrap_or_else(|| vec!["Property analysis available".to_string()]),
        risk_factors: string_list(&raw["riskFactors"])
            .unwrap_or_else(|| vec!["Standard market risks apply".to_string()]),
        recommendation: text_or(&raw["recommendation"], "Further evaluation recommended."),
        estimated_profit: numeric(&raw["estimatedProfit"]).unwrap_or(0.0).max(0.0),
        confidence_level: numeric(&raw["confidenceLevel"])
            .unwrap_or(70.0)
            .clamp(0.0, 100.0),
        market_position: raw["marketPosition"]
            .as_str()
            .and_then(MarketPosition::parse)
            .unwrap_or(MarketPosition::Average),
        urgency: raw["urgency"]
            .as_str()
            .and_then(Urgency::parse)
            .unwrap_or(Urgency::EvaluateFurther),
    }
}

// The model occasionally quotes numbers; accept both forms.
fn numeric(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    let items = value.as_array()?;
    let strings: Vec<String> = items
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    if strings.is_empty() {
        None
    } else {
        Some(strings)
    }
}

fn text_or(value: &Value, fallback: &str) -> String {
    match value.as_str() {
        Some(s) if !s.trim().is_empty() => s.to_string(),
        _ => fallback.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ComparableSale, MarketMetrics, Property};

    fn property() -> PropertyWithDetails {
        PropertyWithDetails {
            property: Property {
                id: 1,
                address: "1847 Ocean Drive".to_string(),
                city: "Los Angeles".to_string(),
                state: "CA".to_string(),
                zip_code: "90210".to_string(),
                beds: Some(4),
                baths: Some("3.5".to_string()),
                sqft: Some(2850),
                year_built: None,
                property_type: Some("Single Family".to_string()),
                lot_size: None,
                parking: None,
                has_pool: Some(true),
                hoa_fees: Some("125.00".to_string()),
                list_price: Some("1250000".to_string()),
                listing_status: Some("For Sale".to_string()),
                days_on_market: Some(34),
                price_per_sqft: Some("438".to_string()),
                last_sale_price: None,
                last_sale_date: None,
                created_at: None,
            },
            comparables: vec![ComparableSale {
                id: 1,
                property_id: 1,
                address: "1823 Ocean Drive".to_string(),
                sale_price: "1185000".to_string(),
                beds: Some(4),
                baths: Some("3.0".to_string()),
                sqft: Some(2650),
                price_per_sqft: Some("447".to_string()),
                sale_date: "Oct 2023".to_string(),
            }],
            market_metrics: Some(MarketMetrics {
                id: 1,
                property_id: 1,
                avg_days_on_market: Some(42),
                median_sale_price: Some("1200000".to_string()),
                avg_price_per_sqft: Some("445".to_string()),
                price_appreciation: Some("8.5".to_string()),
            }),
        }
    }

    #[test]
    fn prompt_embeds_attributes_and_placeholders() {
        let prompt = build_prompt(&property());
        assert!(prompt.contains("Address: 1847 Ocean Drive, Los Angeles, CA 90210"));
        assert!(prompt.contains("Beds/Baths: 4/3.5"));
        assert!(prompt.contains("Year Built: N/A"));
        assert!(prompt.contains("Last Sale Price: $N/A"));
        assert!(prompt.contains("Has Pool: Yes"));
        assert!(prompt.contains("- 1823 Ocean Drive: $1185000 (2650 sq ft, sold Oct 2023)"));
        assert!(prompt.contains("Median Sale Price: $1200000"));
        assert!(prompt.contains("\"urgency\""));
    }

    #[test]
    fn prompt_handles_missing_market_metrics() {
        let mut p = property();
        p.market_metrics = None;
        let prompt = build_prompt(&p);
        assert!(prompt.contains("Median Sale Price: $N/A"));
        assert!(prompt.contains("Average Days on Market: N/A"));
    }

    #[test]
    fn well_formed_response_passes_through() {
        let raw = serde_json::json!({
            "grade": "B+",
            "score": 82,
            "summary": "Solid deal.",
            "keyStrengths": ["Under market", "Good comps"],
            "riskFactors": ["HOA"],
            "recommendation": "Make an offer.",
            "estimatedProfit": 45000,
            "confidenceLevel": 88,
            "marketPosition": "Good",
            "urgency": "Strong Consider"
        });
        let analysis = coerce_analysis(&raw);
        assert_eq!(analysis.grade, Grade::BPlus);
        assert_eq!(analysis.score, 82.0);
        assert_eq!(analysis.estimated_profit, 45000.0);
        assert_eq!(analysis.market_position, MarketPosition::Good);
        assert_eq!(analysis.urgency, Urgency::StrongConsider);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let raw = serde_json::json!({
            "score": 140,
            "estimatedProfit": -20000,
            "confidenceLevel": -5
        });
        let analysis = coerce_analysis(&raw);
        assert_eq!(analysis.score, 100.0);
        assert_eq!(analysis.estimated_profit, 0.0);
        assert_eq!(analysis.confidence_level, 0.0);
    }

    #[test]
    fn malformed_fields_fall_back_to_defaults() {
        let raw = serde_json::json!({
            "grade": "Z-",
            "score": "not a number",
            "summary": "",
            "keyStrengths": "not an array",
            "riskFactors": [],
            "marketPosition": "Stellar",
            "urgency": 12
        });
        let analysis = coerce_analysis(&raw);
        assert_eq!(analysis.grade, Grade::C);
        assert_eq!(analysis.score, 50.0);
        assert_eq!(analysis.summary, "Analysis completed with limited data.");
        assert_eq!(analysis.key_strengths, vec!["Property analysis available"]);
        assert_eq!(analysis.risk_factors, vec!["Standard market risks apply"]);
        assert_eq!(analysis.recommendation, "Further evaluation recommended.");
        assert_eq!(analysis.market_position, MarketPosition::Average);
        assert_eq!(analysis.urgency, Urgency::EvaluateFurther);
    }

    #[test]
    fn quoted_numbers_are_accepted() {
        let raw = serde_json::json!({ "score": "85", "estimatedProfit": "32000" });
        let analysis = coerce_analysis(&raw);
        assert_eq!(analysis.score, 85.0);
        assert_eq!(analysis.estimated_profit, 32000.0);
    }

    #[test]
    fn empty_completion_shape_is_all_defaults_in_range() {
        let analysis = coerce_analysis(&serde_json::json!({}));
        assert!(analysis.score >= 0.0 && analysis.score <= 100.0);
        assert!(analysis.confidence_level >= 0.0 && analysis.confidence_level <= 100.0);
        assert!(analysis.estimated_profit >= 0.0);
        assert_eq!(analysis.grade, Grade::C);
        assert_eq!(serde_json::to_value(&analysis).unwrap()["urgency"], "Evaluate Further");
    }
}
