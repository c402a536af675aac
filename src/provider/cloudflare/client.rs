use super::requests::{Request, RequestBody};
use crate::errors::BoxError;
use reqwest::{Client as ReqwestClient, RequestBuilder, Response};
use std::time::Duration;

pub(crate) static BASE_URL: &str = "https://speed.cloudflare.com";

#[derive(Debug, Clone)]
pub struct Client {
    client: ReqwestClient,
    base_url: String,
}

impl Client {
    /// Build a client whose every request is bounded by `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, BoxError> {
        let client = ReqwestClient::builder().timeout(timeout).build()?;

        Ok(Client { client, base_url: BASE_URL.to_string() })
    }

    /// Decode the response body as JSON.
    pub async fn send<R: Request>(
        &self,
        request: R,
    ) -> Result<R::Response, BoxError> {
        let response = self.execute(&request).await?;

        let text = response.text().await?;

        Ok(serde_json::from_str::<R::Response>(&text)?)
    }

    /// Run a transfer and drain the body, returning the number of body
    /// bytes received.
    pub async fn transfer<R: Request>(&self, request: R) -> Result<u64, BoxError> {
        let mut response = self.execute(&request).await?;
        let mut received = 0u64;

        while let Some(chunk) = response.chunk().await? {
            received += chunk.len() as u64;
        }

        Ok(received)
    }

    async fn execute<R: Request>(&self, request: &R) -> Result<Response, BoxError> {
        let endpoint = request.endpoint();
        let endpoint = endpoint.trim_matches('/');
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = self
            .client
            .request(R::METHOD, &url)
            .headers(request.headers())
            .speedtest_body(request.body())
            .send()
            .await?
            .error_for_status()?;

        Ok(response)
    }
}

trait RequestBuilderExt: Sized {
    fn speedtest_body(self, body: RequestBody) -> Self;
}

impl RequestBuilderExt for RequestBuilder {
    fn speedtest_body(self, body: RequestBody) -> Self {
        match body {
            RequestBody::None => self,
            RequestBody::Bytes(value) => self.body(value),
        }
    }
}
