//! Reqwest-backed implementation of the carrier REST API.

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use crate::types::CarrierShipmentId;

use super::client::{CarrierApi, QueryWindow};
use super::error::CarrierApiError;
use super::payload::{CarrierPayload, ShipmentPage};
use super::retry::{RetryConfig, retry_with_backoff};

/// Page size requested from the carrier's listing endpoint.
const PAGE_SIZE: u32 = 100;

/// HTTP client for the carrier REST API.
pub struct HttpCarrierClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    retry: RetryConfig,
}

impl HttpCarrierClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        HttpCarrierClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
            retry: RetryConfig::DEFAULT,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, CarrierApiError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .header("authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(CarrierApiError::from_reqwest)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CarrierApiError::from_status(status.as_u16(), body));
        }

        let parsed = response
            .json::<T>()
            .await
            .map_err(CarrierApiError::from_reqwest)?;
        Ok(Some(parsed))
    }
}

#[async_trait]
impl CarrierApi for HttpCarrierClient {
    async fn list_shipments(
        &self,
        window: QueryWindow,
        page: u32,
    ) -> Result<ShipmentPage, CarrierApiError> {
        let url = format!("{}/shipments", self.base_url);
        let query = [
            ("modifyDateStart", window.start.to_rfc3339()),
            ("modifyDateEnd", window.end.to_rfc3339()),
            ("page", page.to_string()),
            ("pageSize", PAGE_SIZE.to_string()),
        ];

        debug!(page, start = %window.start, end = %window.end, "listing carrier shipments");

        retry_with_backoff(self.retry, || async {
            self.get_json::<ShipmentPage>(&url, &query)
                .await?
                .ok_or_else(|| CarrierApiError::permanent("shipment listing endpoint returned 404"))
        })
        .await
    }

    async fn get_shipment(
        &self,
        id: &CarrierShipmentId,
    ) -> Result<Option<CarrierPayload>, CarrierApiError> {
        let url = format!("{}/shipments/{}", self.base_url, id.as_str());

        debug!(carrier_shipment_id = %id, "fetching carrier shipment");

        retry_with_backoff(self.retry, || async {
            self.get_json::<CarrierPayload>(&url, &[]).await
        })
        .await
    }
}
