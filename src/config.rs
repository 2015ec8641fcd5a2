//! Process configuration read from the environment (and `.env` via dotenv)

use crate::backend::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::error::ChatError;
use crate::Result;
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 8000;

/// Values shipped in sample `.env` files that mean "no key yet"
const PLACEHOLDER_KEYS: [&str; 3] = [
    "your-gemini-api-key-here",
    "your_gemini_api_key_here",
    "mock_key",
];

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` selects the canned-reply backend
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let gemini_api_key = non_empty("GEMINI_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !PLACEHOLDER_KEYS.contains(&k.as_str()));

        let port = match non_empty("PORT").or_else(|| non_empty("API_PORT")) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| {
                ChatError::Config(format!("invalid port {:?}: {}", raw, e))
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            gemini_api_key,
            gemini_model: non_empty("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            gemini_base_url: non_empty("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            host: non_empty("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            static_dir: non_empty("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("dist")),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
