use clap::Parser;
use url::Url;

use crate::engine::devig::DevigMethod;

/// Value-betting bot: bridges reference-source odds onto a bookmaker's
/// markets, de-vigs the prices and stakes positive-edge bets.
#[derive(Parser, Debug, Clone)]
#[command(name = "valuebet-bot", version, about)]
pub struct Config {
    /// Run in dry-run mode (no real bets submitted)
    #[arg(long, env = "DRY_RUN", default_value = "false")]
    pub dry_run: bool,

    /// Initial simulated bankroll for dry-run mode
    #[arg(long, env = "INITIAL_BALANCE", default_value = "100.0")]
    pub initial_balance: f64,

    /// Status surface listen address
    #[arg(long, env = "STATUS_ADDR", default_value = "0.0.0.0:8080")]
    pub status_addr: String,

    /// SQLite store path (session state, bankroll snapshot, bet log)
    #[arg(long, env = "STORE_PATH", default_value = "valuebet.db")]
    pub store_path: String,

    /// Bookmaker API base URL
    #[arg(
        long,
        env = "BOOKMAKER_URL",
        default_value = "https://bookmaker.example.com"
    )]
    pub bookmaker_url: String,

    /// Bookmaker account username (required for live betting)
    #[arg(long, env = "BOOKMAKER_USERNAME")]
    pub bookmaker_username: Option<String>,

    /// Bookmaker account password
    #[arg(long, env = "BOOKMAKER_PASSWORD")]
    pub bookmaker_password: Option<String>,

    /// Reference price feed base URL
    #[arg(
        long,
        env = "REFERENCE_URL",
        default_value = "https://feed.example.com"
    )]
    pub reference_url: String,

    /// Reference feed API key
    #[arg(long, env = "REFERENCE_API_KEY")]
    pub reference_api_key: Option<String>,

    /// Reference feed polling interval in seconds
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "5")]
    pub poll_interval_secs: u64,

    /// Fractional Kelly multiplier (0.0–1.0)
    #[arg(long, env = "STAKE_FRACTION", default_value = "0.1")]
    pub stake_fraction: f64,

    /// Bypass Kelly sizing and stake a fixed amount
    #[arg(long, env = "FIXED_STAKE", default_value = "false")]
    pub fixed_stake: bool,

    /// Fixed stake amount (used when --fixed-stake is set)
    #[arg(long, env = "FIXED_STAKE_AMOUNT", default_value = "0.0")]
    pub fixed_stake_amount: f64,

    /// Minimum edge in percent required to stake a bet (e.g. 5.5 = 5.5%)
    #[arg(long, env = "MIN_EDGE_PERCENT", default_value = "5.5")]
    pub min_edge_percent: f64,

    /// Lower bound of the stakeable odds band
    #[arg(long, env = "MIN_ODDS", default_value = "1.45")]
    pub min_odds: f64,

    /// Upper bound of the stakeable odds band
    #[arg(long, env = "MAX_ODDS", default_value = "3.5")]
    pub max_odds: f64,

    /// Delay between processed queue items in seconds (bookmaker backpressure)
    #[arg(long, env = "INTER_ITEM_DELAY_SECS", default_value = "4")]
    pub inter_item_delay_secs: u64,

    /// De-vig method used to recover fair probabilities
    #[arg(long, env = "DEVIG_METHOD", value_enum, default_value = "power")]
    pub devig_method: DevigMethod,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.dry_run {
            if self.bookmaker_username.is_none() {
                anyhow::bail!(
                    "BOOKMAKER_USERNAME is required in live mode. Use --dry-run for simulation."
                );
            }
            if self.bookmaker_password.is_none() {
                anyhow::bail!(
                    "BOOKMAKER_PASSWORD is required in live mode. Use --dry-run for simulation."
                );
            }
        }
        Url::parse(&self.bookmaker_url)
            .map_err(|e| anyhow::anyhow!("bookmaker_url is not a valid URL: {}", e))?;
        Url::parse(&self.reference_url)
            .map_err(|e| anyhow::anyhow!("reference_url is not a valid URL: {}", e))?;
        if !(0.0..=1.0).contains(&self.stake_fraction) {
            anyhow::bail!("stake_fraction must be between 0.0 and 1.0");
        }
        if self.fixed_stake && self.fixed_stake_amount <= 0.0 {
            anyhow::bail!("fixed_stake_amount must be positive when --fixed-stake is set");
        }
        if self.min_odds < 1.0 {
            anyhow::bail!("min_odds must be at least 1.0");
        }
        if self.max_odds < self.min_odds {
            anyhow::bail!("max_odds must not be below min_odds");
        }
        if self.initial_balance <= 0.0 {
            anyhow::bail!("initial_balance must be positive");
        }
        Ok(())
    }
}
