//! HTTP adapter for the inventory service.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use domain::Sku;

use super::inventory::{InventoryClient, InventoryError, StockAvailability};

/// Calls `GET {base_url}/inventory?sku=A&sku=B` and decodes a JSON array of
/// `{ sku, inStock }` entries.
#[derive(Debug, Clone)]
pub struct HttpInventoryClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpInventoryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Uses an existing client, sharing its connection pool.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_send_error(err: reqwest::Error) -> InventoryError {
        if err.is_timeout() {
            InventoryError::Timeout
        } else {
            InventoryError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl InventoryClient for HttpInventoryClient {
    #[tracing::instrument(skip(self), fields(base_url = %self.base_url))]
    async fn check_stock(
        &self,
        skus: &BTreeSet<Sku>,
        deadline: Duration,
    ) -> Result<Vec<StockAvailability>, InventoryError> {
        let query: Vec<(&str, &str)> = skus.iter().map(|sku| ("sku", sku.as_str())).collect();

        let response = self
            .client
            .get(format!("{}/inventory", self.base_url))
            .query(&query)
            .timeout(deadline)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(InventoryError::Transport(format!(
                "inventory returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(InventoryError::Rejected(status.as_u16()));
        }

        response
            .json::<Vec<StockAvailability>>()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    InventoryError::Timeout
                } else {
                    InventoryError::Decode(err.to_string())
                }
            })
    }
}
