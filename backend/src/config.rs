use dotenv::dotenv;
use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    /// Rentcast credential. Absent means enrichment is skipped entirely and
    /// searches persist placeholder records.
    pub rentcast_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub http_timeout_secs: u64,
}

impl AppConfig {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        dotenv().ok(); // Load .env file if present
        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            port: env::var("PORT").unwrap_or_else(|_| "5000".to_string()).parse()?,
            jwt_secret: env::var("JWT_SECRET")?,
            rentcast_api_key: env::var("RENTCAST_API_KEY").ok().filter(|k| !k.is_empty()),
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
        })
    }
}
