use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, ParseError};

pub const DEFAULT_TORII_URL: &str = "http://localhost:8080";
pub const DEFAULT_SUBSCRIPTION_BUFFER_SIZE: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Endpoint of the indexer.
    pub url: Url,
    /// Number of pending updates buffered per subscription before the
    /// subscriber is considered too slow and dropped.
    pub subscription_buffer_size: usize,
}

impl ClientConfig {
    pub fn new(url: &str) -> Result<Self, Error> {
        let url = Url::parse(url).map_err(ParseError::from)?;
        Ok(Self {
            url,
            ..Default::default()
        })
    }

    pub fn with_subscription_buffer_size(mut self, size: usize) -> Self {
        self.subscription_buffer_size = size;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: Url::parse(DEFAULT_TORII_URL).expect("valid default url"),
            subscription_buffer_size: DEFAULT_SUBSCRIPTION_BUFFER_SIZE,
        }
    }
}
