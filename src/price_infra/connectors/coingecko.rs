use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;
use crate::config::UpstreamConfig;
use crate::error::{Error, Result};
use crate::price_infra::connectors::{PriceSource, TransportError, UpstreamResponse};

/// CoinGecko `simple/price` endpoint.
pub struct CoinGeckoSource {
    source_id: String,
    client: Client,
    price_url: Url,
    vs_currency: String,
}

impl CoinGeckoSource {
    pub fn new(base_url: &str, vs_currency: &str, timeout: Duration) -> Result<Self> {
        let price_url = Url::parse(&format!("{}/simple/price", base_url.trim_end_matches('/')))
            .map_err(|e| Error::ConfigError(format!("invalid upstream base_url {}: {}", base_url, e)))?;

        // The fetcher enforces the overall deadline; this bounds the handshake
        let client = Client::builder()
            .connect_timeout(timeout)
            .user_agent(concat!("market-pipeline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::HttpClient(e.to_string()))?;

        Ok(CoinGeckoSource {
            source_id: "coingecko".to_string(),
            client,
            price_url,
            vs_currency: vs_currency.to_ascii_lowercase(),
        })
    }

    pub fn from_config(config: &UpstreamConfig) -> Result<Self> {
        Self::new(&config.base_url, &config.vs_currency, config.request_timeout())
    }

    fn url_for(&self, upstream_id: &str) -> Url {
        let mut url = self.price_url.clone();
        url.query_pairs_mut()
            .append_pair("ids", upstream_id)
            .append_pair("vs_currencies", &self.vs_currency);
        url
    }
}

fn transport_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else {
        TransportError::Network(e.to_string())
    }
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
    async fn request(&self, upstream_id: &str) -> std::result::Result<UpstreamResponse, TransportError> {
        let resp = self.client
            .get(self.url_for(upstream_id))
            .header("accept", "application/json")
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(transport_error)?;

        Ok(UpstreamResponse {
            status,
            body: body.to_vec(),
        })
    }

    fn vs_currency(&self) -> &str {
        &self.vs_currency
    }

    fn source_id(&self) -> &str {
        &self.source_id
    }
}
