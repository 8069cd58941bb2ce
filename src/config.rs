use clap::Parser;
use std::time::Duration;

// CLI argument structure, every flag also readable from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "chartie-gateway")]
#[command(about = "Caching proxy between the Chartie frontend and Gemini")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 10000)]
    pub port: u16,

    // Gemini API key; without it every cache miss fails
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    // Gemini model, with or without the "models/" prefix
    #[arg(long, env = "GEMINI_MODEL", default_value = "gemini-2.0-flash")]
    pub gemini_model: String,

    #[arg(
        long,
        env = "GEMINI_BASE_URL",
        default_value = "https://generativelanguage.googleapis.com/v1beta"
    )]
    pub gemini_base_url: String,

    // Upstream request timeout in seconds
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECONDS", default_value_t = 30)]
    pub upstream_timeout: u64,

    // Cache TTL in seconds
    #[arg(short, long, env = "CACHE_TTL_SECONDS", default_value_t = 1200)]
    pub cache_ttl: u64,

    // Max live cache entries
    #[arg(long, env = "CACHE_MAX_ENTRIES", default_value_t = 1000)]
    pub cache_max_entries: usize,

    // How often expired entries are swept, in seconds
    #[arg(long, env = "CACHE_SWEEP_INTERVAL_SECONDS", default_value_t = 120)]
    pub cache_sweep_interval: u64,

    // Rate limit max requests per window
    #[arg(long, env = "RATE_LIMIT_MAX_REQUESTS", default_value_t = 30)]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, env = "RATE_LIMIT_WINDOW_SECONDS", default_value_t = 60)]
    pub rate_window: u64,

    // Comma-separated CORS origins, empty allows any origin
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = "")]
    pub allowed_origins: String,

    // Include internal error details in responses
    #[arg(long, env = "CHARTIE_DEV", default_value_t = false)]
    pub dev: bool,
}

impl Args {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_interval.max(1))
    }

    // Parse "http://a.com, http://b.com" into a clean list
    pub fn origins(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }

    // Blank keys count as missing
    pub fn api_key(&self) -> Option<String> {
        self.gemini_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["chartie-gateway"]).unwrap();
        assert_eq!(args.cache_ttl(), Duration::from_secs(1200));
        assert_eq!(args.rate_limit, 30);
        assert!(!args.dev);
    }

    #[test]
    fn test_origins_are_split_and_trimmed() {
        let args = Args::try_parse_from([
            "chartie-gateway",
            "--allowed-origins",
            "http://localhost:3000, https://chartie.app ,",
        ])
        .unwrap();
        assert_eq!(
            args.origins(),
            vec!["http://localhost:3000", "https://chartie.app"]
        );
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let args =
            Args::try_parse_from(["chartie-gateway", "--gemini-api-key", "   "]).unwrap();
        assert_eq!(args.api_key(), None);
    }
}
