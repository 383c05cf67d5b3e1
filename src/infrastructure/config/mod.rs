use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub aws_region: String,
    pub environment: Environment,
    pub log_format: LogFormat,
    // Audio storage
    pub s3_bucket: String,
    pub s3_cache_seconds: u32,
    pub aws_call_timeout_seconds: u64,
    // Playback URL signing
    pub signed_url_ttl_seconds: u64,
    pub signed_url_cache_enabled: bool,
    pub cloudfront_domain: Option<String>,
    pub cloudfront_key_pair_id: Option<String>,
    pub cloudfront_private_key: Option<String>,
    // Generation retry
    pub generation_retry_base_seconds: u64,
    // Expiry sweep
    pub expiry_sweep_interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let config = Config {
            database_url: env::var("DATABASE_URL")?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()?,
            jwt_secret: env::var("JWT_SECRET")?,
            jwt_expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                .unwrap_or_else(|_| "1".to_string())
                .parse()?,
            aws_region: env::var("AWS_REGION").unwrap_or_else(|_| "eu-west-1".to_string()),
            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string())
                .parse::<String>()
                .map(|s| match s.as_str() {
                    "production" => Environment::Production,
                    _ => Environment::Development,
                })?,
            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .parse::<String>()
                .map(|s| match s.as_str() {
                    "json" => LogFormat::Json,
                    _ => LogFormat::Pretty,
                })?,
            s3_bucket: env::var("S3_AUDIO_BUCKET")?,
            s3_cache_seconds: env::var("S3_CACHE_SECONDS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()?,
            aws_call_timeout_seconds: env::var("AWS_CALL_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            signed_url_ttl_seconds: env::var("SIGNED_URL_TTL_SECONDS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()?,
            signed_url_cache_enabled: env::var("SIGNED_URL_CACHE_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse::<String>()
                .map(|s| s.to_lowercase() == "true")
                .unwrap_or(true),
            cloudfront_domain: env::var("CLOUDFRONT_DOMAIN").ok().filter(|v| !v.is_empty()),
            cloudfront_key_pair_id: env::var("CLOUDFRONT_KEY_PAIR_ID")
                .ok()
                .filter(|v| !v.is_empty()),
            cloudfront_private_key: env::var("CLOUDFRONT_PRIVATE_KEY")
                .ok()
                .filter(|v| !v.is_empty()),
            generation_retry_base_seconds: env::var("GENERATION_RETRY_BASE_SECONDS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            expiry_sweep_interval_seconds: env::var("EXPIRY_SWEEP_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()?,
        };

        Ok(config)
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}
