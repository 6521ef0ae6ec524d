use clap::Parser;

pub const DEFAULT_WINDOW_SECS: u64 = 60;
pub const DEFAULT_RATE_LIMIT: u32 = 30;
pub const DEFAULT_AI_RATE_LIMIT: u32 = 10;

const DEFAULT_SYSTEM_INSTRUCTION: &str = "Du bist ein hilfreicher Assistent. Antworte auf Deutsch.";

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "site-gateway")]
#[command(about = "Rate-limited proxy gateway for the site's API endpoints")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    // Rate limit window in seconds
    #[arg(long, env = "RATE_WINDOW", default_value_t = DEFAULT_WINDOW_SECS)]
    pub rate_window: u64,

    // Max requests per window for standard endpoints
    #[arg(long, env = "RATE_LIMIT", default_value_t = DEFAULT_RATE_LIMIT,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub rate_limit: u32,

    // Max requests per window for AI endpoints
    #[arg(long, env = "AI_RATE_LIMIT", default_value_t = DEFAULT_AI_RATE_LIMIT,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub ai_rate_limit: u32,

    // Shared counter store; in-process counters are used when unset
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    // Longest a Redis check may take before in-process counters answer
    #[arg(long, env = "STORE_TIMEOUT_MS", default_value_t = 500)]
    pub store_timeout_ms: u64,

    // AI chat upstream (full URL of the chat endpoint)
    #[arg(long, env = "AI_UPSTREAM_URL")]
    pub ai_upstream: Option<String>,

    #[arg(long, env = "AI_SYSTEM_INSTRUCTION", default_value = DEFAULT_SYSTEM_INSTRUCTION)]
    pub system_instruction: String,

    // Retrieval index the AI upstream searches
    #[arg(long, env = "RAG_ID", default_value = "suche")]
    pub rag_id: String,

    #[arg(long, env = "AI_GATEWAY_ID", default_value = "default")]
    pub ai_gateway_id: String,

    // Result cap for AI retrieval and site search
    #[arg(long, env = "MAX_SEARCH_RESULTS", default_value_t = 10,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub max_search_results: u32,

    // AI Search endpoint (full URL) backing /api/search
    #[arg(long, env = "AI_SEARCH_URL")]
    pub ai_search_url: Option<String>,

    #[arg(long, env = "AI_SEARCH_TOKEN", hide_env_values = true)]
    pub ai_search_token: Option<String>,

    #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
    pub youtube_api_key: Option<String>,

    #[arg(long, env = "YOUTUBE_API_BASE", default_value = "https://www.googleapis.com/youtube/v3")]
    pub youtube_api_base: String,

    // YouTube response cache TTL in seconds
    #[arg(short, long, env = "CACHE_TTL", default_value_t = 300)]
    pub cache_ttl: u64,

    #[arg(long, env = "CF_API_TOKEN", hide_env_values = true)]
    pub cf_api_token: Option<String>,

    #[arg(long, env = "CF_ZONE_ID")]
    pub cf_zone_id: Option<String>,

    // Required in the x-proxy-secret header when set
    #[arg(long, env = "CF_PROXY_SECRET", hide_env_values = true)]
    pub cf_proxy_secret: Option<String>,

    #[arg(long, env = "CF_API_BASE", default_value = "https://api.cloudflare.com/client/v4")]
    pub cf_api_base: String,

    // Comma-separated CORS origins
    // Example: "https://example.com,https://www.example.com"
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = "")]
    pub allowed_origins: String,

    // Preview deployments live under this domain (e.g. "site.pages.dev")
    #[arg(long, env = "PREVIEW_DOMAIN")]
    pub preview_domain: Option<String>,

    // Upstream request timeout in seconds
    #[arg(long, env = "UPSTREAM_TIMEOUT", default_value_t = 15)]
    pub upstream_timeout: u64,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Splits `allowed_origins` into trimmed, non-empty entries.
    pub fn origin_list(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}
