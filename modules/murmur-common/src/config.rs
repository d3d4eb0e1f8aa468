use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Neo4j
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,

    // External platform API
    pub twitter_bearer_token: String,

    // Ingestion
    /// Max reply-chain depth to resolve per ingested post (-1 = unbounded).
    pub max_nested_level: i32,

    // Operations
    pub ops_max_concurrency: usize,
    pub ops_retry_minutes: i64,
    pub max_target_actors: usize,
    pub max_followers: u32,
    pub max_friends: u32,
    pub max_timeline_posts: u32,
    pub fill_freshness_days: i64,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            neo4j_uri: required_env("NEO4J_URI"),
            neo4j_user: required_env("NEO4J_USER"),
            neo4j_password: required_env("NEO4J_PASSWORD"),
            twitter_bearer_token: required_env("TWITTER_BEARER_TOKEN"),
            max_nested_level: parsed_env("MAX_NESTED_LEVEL", 0),
            ops_max_concurrency: parsed_env("OPS_MAX_CONCURRENCY", 4),
            ops_retry_minutes: parsed_env("OPS_RETRY_MINUTES", 15),
            max_target_actors: parsed_env("MAX_TARGET_ACTORS", 990),
            max_followers: parsed_env("MAX_FOLLOWERS", 15_000),
            max_friends: parsed_env("MAX_FRIENDS", 15_000),
            max_timeline_posts: parsed_env("MAX_TIMELINE_POSTS", 1_000),
            fill_freshness_days: parsed_env("FILL_FRESHNESS_DAYS", 30),
        }
    }

    pub fn log_redacted(&self) {
        tracing::info!(
            neo4j_uri = %self.neo4j_uri,
            max_nested_level = self.max_nested_level,
            ops_max_concurrency = self.ops_max_concurrency,
            "Config loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(v) => v
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a number")),
        Err(_) => default,
    }
}
