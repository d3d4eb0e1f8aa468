use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use murmur_common::{Config, Rule};
use murmur_store::{GraphClient, GraphStore};
use murmur_tracker::session::{SessionConfig, SessionManager, TrackSession};
use twitter_client::TwitterClient;

#[derive(Parser, Debug)]
#[command(name = "murmur-tracker", about = "Stream session worker")]
struct Args {
    /// Session id this worker owns.
    #[arg(long, default_value_t = 1)]
    session_id: i64,

    /// Campaign slug to link matched posts and actors to.
    #[arg(long)]
    campaign: Option<String>,

    /// Tracking rules as slug:kind:content, e.g. `tag1:hashtag:protest`.
    /// Repeatable.
    #[arg(long = "rule", value_name = "SLUG:KIND:CONTENT")]
    rules: Vec<String>,

    /// Auto-terminate after this many minutes.
    #[arg(long)]
    expires_minutes: Option<i64>,
}

fn parse_rule(raw: &str) -> Result<Rule> {
    let mut parts = raw.splitn(3, ':');
    let (slug, kind, content) = match (parts.next(), parts.next(), parts.next()) {
        (Some(s), Some(k), Some(c)) => (s, k, c),
        _ => anyhow::bail!("rule must be slug:kind:content, got '{raw}'"),
    };
    Ok(Rule::parse(slug, slug, kind, content)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("murmur=info".parse()?))
        .init();

    let args = Args::parse();
    info!(session = args.session_id, "Murmur tracker starting...");

    let config = Config::from_env();
    config.log_redacted();

    let rules = args
        .rules
        .iter()
        .map(|r| parse_rule(r))
        .collect::<Result<Vec<Rule>>>()?;

    let client =
        GraphClient::connect(&config.neo4j_uri, &config.neo4j_user, &config.neo4j_password)
            .await?;
    let store = Arc::new(GraphStore::new(client));
    let api = Arc::new(TwitterClient::new(config.twitter_bearer_token.clone()));

    let session_config = SessionConfig {
        id: args.session_id,
        campaign: args.campaign,
        rules,
        expires_at: args.expires_minutes.map(|m| Utc::now() + Duration::minutes(m)),
        max_nested_level: config.max_nested_level,
    };
    let session = TrackSession::new(session_config, store, api);

    let manager = SessionManager::new();
    let handle = session.handle();
    manager.register(handle.clone());

    tokio::select! {
        result = session.run() => {
            manager.deregister(args.session_id);
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!(session = args.session_id, "Interrupt received, stopping session");
            handle.request_stop();
            manager.deregister(args.session_id);
        }
    }

    info!(
        session = args.session_id,
        posts = handle.post_count(),
        "Tracker exiting"
    );
    Ok(())
}
