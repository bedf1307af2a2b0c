use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_SESSION_DIR: &str = ".cartelera";

/// Runtime settings for the dashboard client.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the REST backend.
    pub api_url: String,
    /// Prefix for flyer paths stored relative to the backend.
    pub image_base_url: String,
    /// Where the persisted session lives.
    pub session_dir: PathBuf,
    pub page_size: u64,
    /// Quiet period before a filter edit is applied.
    pub debounce: Duration,
}

impl Config {
    /// Read settings from the environment.
    ///
    /// Each key is looked up at runtime first (a `.env` file is honoured),
    /// then in the environment the crate was built with, then falls back to
    /// a local default:
    /// - CARTELERA_API_URL (default http://localhost:3000)
    /// - CARTELERA_IMG_BASE_URL (default `{api_url}/`)
    /// - CARTELERA_SESSION_DIR (default .cartelera)
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let api_url = lookup("CARTELERA_API_URL", option_env!("CARTELERA_API_URL"))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let image_base_url = lookup(
            "CARTELERA_IMG_BASE_URL",
            option_env!("CARTELERA_IMG_BASE_URL"),
        )
        .unwrap_or_else(|| format!("{api_url}/"));
        let session_dir = lookup(
            "CARTELERA_SESSION_DIR",
            option_env!("CARTELERA_SESSION_DIR"),
        )
        .unwrap_or_else(|| DEFAULT_SESSION_DIR.to_string());

        Self {
            api_url,
            image_base_url,
            session_dir: PathBuf::from(session_dir),
            ..Self::with_api_url(DEFAULT_API_URL)
        }
    }

    /// Settings pointing at a specific backend, everything else default.
    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        let api_url = api_url.into();
        Self {
            image_base_url: format!("{api_url}/"),
            api_url,
            session_dir: PathBuf::from(DEFAULT_SESSION_DIR),
            page_size: 20,
            debounce: Duration::from_millis(300),
        }
    }

    /// Resolve a stored flyer path for display. Absolute URLs pass through.
    pub fn image_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.image_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn lookup(key: &str, built_with: Option<&'static str>) -> Option<String> {
    std::env::var(key)
        .ok()
        .or_else(|| built_with.map(str::to_string))
        .filter(|value| !value.trim().is_empty())
}
