//! Environment-derived configuration.
//!
//! Everything is read once at startup. A `.env` file is honored when
//! present (loaded by the binary before this runs).

use anyhow::Context;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address for the HTTP server.
    pub host: String,
    pub port: u16,
    /// API key for the Gemini generator backend.
    pub gemini_api_key: String,
    /// Gemini model id used for all three stages.
    pub gemini_model: String,
    /// CORS origins; `["*"]` means permissive.
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// - `GEMINI_API_KEY` (required)
    /// - `GEMINI_MODEL` (default `gemini-2.5-flash-lite`)
    /// - `HOST` (default `0.0.0.0`), `PORT` (default `8000`)
    /// - `ALLOWED_ORIGINS` (comma-separated; default wildcard)
    pub fn from_env() -> anyhow::Result<Self> {
        let gemini_api_key = std::env::var("GEMINI_API_KEY")
            .context("GEMINI_API_KEY must be set in the environment")?;

        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("invalid PORT value '{}'", raw))?,
            Err(_) => 8000,
        };

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port,
            gemini_api_key,
            gemini_model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash-lite".to_string()),
            allowed_origins: parse_origins(std::env::var("ALLOWED_ORIGINS").ok()),
        })
    }
}

/// Parse the comma-separated origin list, falling back to wildcard.
fn parse_origins(raw: Option<String>) -> Vec<String> {
    let origins: Vec<String> = raw
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();

    if origins.is_empty() {
        vec!["*".to_string()]
    } else {
        origins
    }
}
