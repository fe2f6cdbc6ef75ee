use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use reqwest::Url;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "llm-esm")]
#[command(about = "Generates ES modules from function descriptions, cached by fingerprint")]
pub struct Config {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// SQLite database path, `sqlite://path` or `:memory:`
    #[arg(long, env = "DATABASE_URL", default_value = "module_cache.db")]
    pub database_url: String,

    /// Skip the primary provider and call the fallback directly
    #[arg(
        long,
        env = "FORCE_FALLBACK",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub force_fallback: bool,

    #[arg(
        long,
        env = "PRIMARY_PROVIDER_URL",
        default_value = "https://text.pollinations.ai",
        value_parser = parse_base_url
    )]
    pub primary_url: Url,

    /// Fallback upstream. Defaults to the primary host, so override it in
    /// deployments that want the fallback hop to reach a second upstream.
    #[arg(
        long,
        env = "FALLBACK_PROVIDER_URL",
        default_value = "https://text.pollinations.ai",
        value_parser = parse_base_url
    )]
    pub fallback_url: Url,

    /// Time budget for one upstream call, in seconds
    #[arg(long, env = "PROVIDER_TIMEOUT_SECS", default_value_t = 60)]
    pub provider_timeout_secs: u64,
}

impl Config {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// True when the fallback hop would reach the same upstream as the primary.
    pub fn fallback_shares_primary(&self) -> bool {
        self.primary_url.origin() == self.fallback_url.origin()
            && self.primary_url.path() == self.fallback_url.path()
    }
}

/// Provider base URLs must be http(s) and able to take the prompt as a path segment.
fn parse_base_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme `{}`", url.scheme()));
    }
    if url.cannot_be_a_base() {
        return Err(format!("{raw} cannot carry a path"));
    }
    Ok(url)
}
