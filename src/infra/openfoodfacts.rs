//! HTTP client for the Open Food Facts product API.
//!
//! Example request: `GET https://world.openfoodfacts.org/api/v0/product/737628064502.json`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::{debug, info};

use crate::application::ports::{LookupError, ProductLookup};
use crate::domain::barcode::BarCode;
use crate::domain::product::ProductRecord;

use super::error::InfraError;

#[derive(Clone, Debug)]
pub struct OpenFoodFactsClient {
    client: Client,
    base: Url,
}

impl OpenFoodFactsClient {
    /// Build a client for `base_url`; `timeout` bounds connecting, each read
    /// and the request as a whole.
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self, InfraError> {
        info!(url = %base_url, timeout_ms = timeout.as_millis() as u64, "Creating Open Food Facts client");
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        let base = base_url
            .join("/")
            .map_err(|err| InfraError::configuration(format!("invalid base url: {err}")))?;
        Ok(Self { client, base })
    }

    pub fn user_agent() -> &'static str {
        concat!("caloriecounter/", env!("CARGO_PKG_VERSION"))
    }

    pub fn product_url(&self, bar_code: &BarCode) -> Result<Url, LookupError> {
        self.base
            .join(&format!("api/v0/product/{bar_code}.json"))
            .map_err(|err| LookupError::Transport(format!("invalid product url: {err}")))
    }
}

#[async_trait]
impl ProductLookup for OpenFoodFactsClient {
    async fn fetch(&self, bar_code: &BarCode) -> Result<ProductRecord, LookupError> {
        let url = self.product_url(bar_code)?;
        debug!(url = %url, "Requesting product");

        let resp = self.client.get(url).send().await.map_err(classify)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(LookupError::Status {
                status: status.as_u16(),
            });
        }

        let bytes = resp.bytes().await.map_err(classify)?;
        serde_json::from_slice(&bytes).map_err(|err| LookupError::Body(err.to_string()))
    }
}

fn classify(err: reqwest::Error) -> LookupError {
    if err.is_timeout() {
        LookupError::Timeout
    } else if err.is_connect() {
        LookupError::Connect(err.to_string())
    } else if err.is_decode() || err.is_body() {
        LookupError::Body(err.to_string())
    } else {
        LookupError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_url_keeps_bar_code_verbatim() {
        let base = Url::parse("https://world.openfoodfacts.org").expect("url");
        let client = OpenFoodFactsClient::new(&base, Duration::from_millis(3000)).expect("client");
        let url = client
            .product_url(&BarCode::parse("0737628064502").expect("bar code"))
            .expect("product url");
        assert_eq!(
            url.as_str(),
            "https://world.openfoodfacts.org/api/v0/product/0737628064502.json"
        );
    }

    #[test]
    fn base_path_is_discarded() {
        let base = Url::parse("http://127.0.0.1:8080/some/prefix").expect("url");
        let client = OpenFoodFactsClient::new(&base, Duration::from_millis(50)).expect("client");
        let url = client
            .product_url(&BarCode::parse("12345678").expect("bar code"))
            .expect("product url");
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/api/v0/product/12345678.json");
    }
}
