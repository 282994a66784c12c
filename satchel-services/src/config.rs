//! Service endpoints and the environment-driven constructor.

use crate::retry::RetryPolicy;
use crate::ServiceError;
use std::env;
use std::str::FromStr;

/// Which chain the services talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chain {
    Main,
    Test,
}

impl Chain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Main => "main",
            Chain::Test => "test",
        }
    }
}

impl FromStr for Chain {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" => Ok(Chain::Main),
            "test" => Ok(Chain::Test),
            other => Err(ServiceError::Config(format!(
                "WALLET_CHAIN must be \"main\" or \"test\", got {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub chain: Chain,
    /// ARC broadcaster base url.
    pub arc_url: String,
    pub arc_api_key: Option<String>,
    /// Block-headers service base url.
    pub bhs_url: String,
    /// Transaction/script lookup API base url.
    pub tx_api_url: String,
    pub retry: RetryPolicy,
}

impl ServiceConfig {
    /// Public default endpoints for a chain.
    pub fn default_for(chain: Chain) -> Self {
        let (arc_url, tx_api_url) = match chain {
            Chain::Main => (
                "https://arc.taal.com",
                "https://api.whatsonchain.com/v1/bsv/main",
            ),
            Chain::Test => (
                "https://arc-test.taal.com",
                "https://api.whatsonchain.com/v1/bsv/test",
            ),
        };
        Self {
            chain,
            arc_url: arc_url.into(),
            arc_api_key: None,
            bhs_url: "http://localhost:8480".into(),
            tx_api_url: tx_api_url.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Configuration from `WALLET_CHAIN`, `WALLET_ARC_URL`,
    /// `WALLET_ARC_API_KEY` and `WALLET_BHS_URL`, with defaults for
    /// anything unset except the chain.
    pub fn from_env() -> Result<Self, ServiceError> {
        let chain: Chain = env::var("WALLET_CHAIN")
            .map_err(|_| ServiceError::Config("WALLET_CHAIN is not set".into()))?
            .parse()?;
        let mut config = Self::default_for(chain);
        if let Ok(url) = env::var("WALLET_ARC_URL") {
            config.arc_url = url;
        }
        if let Ok(key) = env::var("WALLET_ARC_API_KEY") {
            config.arc_api_key = Some(key);
        }
        if let Ok(url) = env::var("WALLET_BHS_URL") {
            config.bhs_url = url;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_parsing() {
        assert_eq!("main".parse::<Chain>().unwrap(), Chain::Main);
        assert_eq!("test".parse::<Chain>().unwrap(), Chain::Test);
        assert!("regtest".parse::<Chain>().is_err());
    }

    #[test]
    fn defaults_differ_per_chain() {
        let main = ServiceConfig::default_for(Chain::Main);
        let test = ServiceConfig::default_for(Chain::Test);
        assert_ne!(main.arc_url, test.arc_url);
        assert_ne!(main.tx_api_url, test.tx_api_url);
    }
}
