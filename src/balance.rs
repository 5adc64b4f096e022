use crate::models::BalanceReading;
use anyhow::Result;
use async_trait::async_trait;
use rand::{seq::SliceRandom, Rng};
use regex::Regex;
use std::time::Duration;
use tracing::debug;

pub const SIMULATED_DELAY: Duration = Duration::from_millis(1500);
pub const SIMULATED_EXPIRY_POOL: [&str; 3] = ["2024-06-15", "2024-07-01", "2024-12-30"];

/// Looks up the remaining quota of one subscriber line.
///
/// Implementations return the reading and leave all bookkeeping to the caller.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn fetch_balance(&self, username: &str) -> Result<BalanceReading>;

    fn name(&self) -> &str;
}

/// Stand-in for the provider: waits, then reports a random balance in 1..=20 GB.
#[derive(Debug, Clone)]
pub struct SimulatedBalanceSource {
    delay: Duration,
}

impl SimulatedBalanceSource {
    pub fn new() -> Self {
        Self {
            delay: SIMULATED_DELAY,
        }
    }
}

impl Default for SimulatedBalanceSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BalanceSource for SimulatedBalanceSource {
    async fn fetch_balance(&self, username: &str) -> Result<BalanceReading> {
        tokio::time::sleep(self.delay).await;
        let (balance, expiry) = {
            let mut rng = rand::thread_rng();
            let balance: u32 = rng.gen_range(1..=20);
            let expiry = SIMULATED_EXPIRY_POOL
                .choose(&mut rng)
                .copied()
                .unwrap_or(SIMULATED_EXPIRY_POOL[0]);
            (balance, expiry)
        };
        debug!(username, balance, expiry, "simulated balance lookup");
        Ok(BalanceReading::new(f64::from(balance), expiry))
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

/// Pulls a GB figure and a date out of a provider account page.
///
/// Returns `None` unless both are present; callers fall back to the
/// generative parser in that case.
pub fn extract_reading_from_html(html: &str) -> Option<BalanceReading> {
    let balance_regex = Regex::new(
        r"(?i)(?:remaining|balance|الرصيد|المتبقي)\D{0,40}?([0-9]+(?:[.,][0-9]+)?)\s*(?:GB|G\.B|جيجا)",
    )
    .ok()?;
    let loose_balance_regex = Regex::new(r"(?i)([0-9]+(?:[.,][0-9]+)?)\s*(?:GB|جيجا)").ok()?;
    let date_regex =
        Regex::new(r"([0-9]{4}-[0-9]{2}-[0-9]{2}|[0-9]{1,2}/[0-9]{1,2}/[0-9]{4})").ok()?;

    let text = strip_tags(html);
    let balance_capture = balance_regex
        .captures(&text)
        .or_else(|| loose_balance_regex.captures(&text))?;
    let balance = balance_capture
        .get(1)?
        .as_str()
        .replace(',', ".")
        .parse::<f64>()
        .ok()?;
    let expiry = date_regex.captures(&text)?.get(1)?.as_str().to_string();
    Some(BalanceReading::new(balance, expiry))
}

fn strip_tags(html: &str) -> String {
    match Regex::new(r"<[^>]*>") {
        Ok(regex) => regex.replace_all(html, " ").into_owned(),
        Err(_) => html.to_string(),
    }
}
