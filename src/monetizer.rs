//! # Monetizer Module
//!
//! Scambia il link pubblico con un redirect monetizzato (ShrinkEarn).
//!
//! ## Contratto esterno:
//! - `GET <endpoint>?api=<key>&url=<link>&alias=&format=json`
//! - Risposta: `{"status": "success", "shortenedUrl": "..."}`
//!
//! ## Hardening:
//! - Timeout esplicito per richiesta (default 30s)
//! - Un solo retry, e solo su errori di rete transitori (connessione, timeout)
//! - Un rifiuto del servizio (`status` diverso da `"success"`) non viene mai ritentato

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::artifact::{MonetizedLink, PublishedLink};
use crate::config::Config;
use crate::error::MonetizeError;

/// Sentinel status of a successful shortening
const STATUS_SUCCESS: &str = "success";

/// Extra attempts after a transient network failure
const TRANSIENT_RETRIES: usize = 1;

/// Wraps a published link behind a monetized redirect
#[async_trait]
pub trait Monetizer: Send + Sync {
    async fn shorten(&self, link: &PublishedLink) -> Result<MonetizedLink, MonetizeError>;
}

#[derive(Debug, Deserialize)]
struct ShortenResponse {
    status: String,
    #[serde(rename = "shortenedUrl", default)]
    shortened_url: Option<String>,
    #[serde(default)]
    message: Option<serde_json::Value>,
}

/// ShrinkEarn API client
#[derive(Debug, Clone)]
pub struct ShrinkEarnMonetizer {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl ShrinkEarnMonetizer {
    pub fn new(config: &Config) -> Result<Self, MonetizeError> {
        let client = Client::builder()
            .timeout(config.shorten_timeout())
            .build()
            .map_err(MonetizeError::Request)?;

        Ok(Self {
            client,
            endpoint: config.shortener_endpoint.clone(),
            api_key: config.monetizer_api_key.clone(),
        })
    }

    async fn request(&self, link: &PublishedLink) -> Result<reqwest::Response, reqwest::Error> {
        self.client
            .get(&self.endpoint)
            .query(&[
                ("api", self.api_key.as_str()),
                ("url", link.as_str()),
                ("alias", ""),
                ("format", "json"),
            ])
            .send()
            .await
    }

    async fn send_with_retry(&self, link: &PublishedLink) -> Result<reqwest::Response, MonetizeError> {
        let mut attempt = 0;
        loop {
            match self.request(link).await {
                Ok(response) => return Ok(response),
                Err(e) if is_transient(&e) && attempt < TRANSIENT_RETRIES => {
                    attempt += 1;
                    warn!("Shortener request failed ({}), retrying once", e);
                }
                Err(e) => return Err(MonetizeError::Request(e)),
            }
        }
    }
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

#[async_trait]
impl Monetizer for ShrinkEarnMonetizer {
    async fn shorten(&self, link: &PublishedLink) -> Result<MonetizedLink, MonetizeError> {
        let response = self.send_with_retry(link).await?;

        let status = response.status();
        if !status.is_success() {
            error!("Shortener answered HTTP {}", status);
            return Err(MonetizeError::Http(status.as_u16()));
        }

        let body = response.text().await.map_err(MonetizeError::Request)?;
        let parsed: ShortenResponse = serde_json::from_str(&body)
            .map_err(|e| MonetizeError::InvalidResponse(e.to_string()))?;

        if parsed.status != STATUS_SUCCESS {
            error!("Shortener failed: {}", body);
            let message = match parsed.message {
                Some(serde_json::Value::String(s)) => s,
                Some(other) => other.to_string(),
                None => String::new(),
            };
            return Err(MonetizeError::Rejected {
                status: parsed.status,
                message,
            });
        }

        let url = parsed
            .shortened_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| MonetizeError::InvalidResponse("missing shortenedUrl".to_string()))?;

        info!("💰 Monetized {} -> {}", link, url);
        Ok(MonetizedLink::new(url, link.clone()))
    }
}
