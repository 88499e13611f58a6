//! Typed HTTP client for routes generated by [`crud_routes`](crate::routes::crud_routes).
//!
//! ```rust,ignore
//! let users = CrudClient::<User>::new("http://localhost:3000/users")?.page_size(20);
//! let page = users.page(1, 0, &[("name", "te")]).await?;
//! let saved = users.save(&user).await?;
//! ```

use crate::coder::Code;
use crate::config::DEFAULT_PAGE_SIZE;
use crate::error::ClientError;
use crate::pipeline::Saved;
use crate::record::{Record, RecordId};
use crate::response::Envelope;
use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;

pub struct CrudClient<T> {
    http: reqwest::Client,
    base_url: String,
    page_size: u64,
    ok_statuses: Vec<StatusCode>,
    ok_code: Code,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for CrudClient<T> {
    fn clone(&self) -> Self {
        CrudClient {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            page_size: self.page_size,
            ok_statuses: self.ok_statuses.clone(),
            ok_code: self.ok_code.clone(),
            _record: PhantomData,
        }
    }
}

impl<T: Record> CrudClient<T> {
    /// Client for the routes mounted at `base_url`, e.g. `http://host/users`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ClientError::BaseUrlRequired);
        }
        Ok(CrudClient {
            http: reqwest::Client::new(),
            base_url,
            page_size: DEFAULT_PAGE_SIZE,
            ok_statuses: vec![StatusCode::OK],
            ok_code: Code::new("0"),
            _record: PhantomData,
        })
    }

    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Size used when [`page`](Self::page) is called with size 0. Zero keeps the default.
    pub fn page_size(mut self, size: u64) -> Self {
        if size > 0 {
            self.page_size = size;
        }
        self
    }

    /// Transport statuses accepted as carrying an envelope.
    pub fn ok_statuses(mut self, statuses: impl IntoIterator<Item = StatusCode>) -> Self {
        self.ok_statuses = statuses.into_iter().collect();
        self
    }

    /// Envelope code that marks success; match the server's coder.
    pub fn ok_code(mut self, code: impl Into<String>) -> Self {
        self.ok_code = Code::new(code);
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<R: DeserializeOwned>(&self, request: RequestBuilder) -> Result<R, ClientError> {
        let response = request.header(ACCEPT, "application/json").send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if !self.ok_statuses.contains(&status) {
            let message = serde_json::from_slice::<Envelope<Value>>(&bytes)
                .map(|e| e.message)
                .unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }
        let envelope: Envelope<Value> = serde_json::from_slice(&bytes)?;
        if envelope.code != self.ok_code {
            return Err(ClientError::Api {
                code: envelope.code.0,
                message: envelope.message,
            });
        }
        Ok(serde_json::from_value(envelope.data)?)
    }

    fn get(&self, path: &str, params: &[(&str, &str)]) -> RequestBuilder {
        self.http.request(Method::GET, self.url(path)).query(params)
    }

    /// Page `number` (0 means 1) of `size` records (0 means the client's page size).
    pub async fn page(&self, number: u64, size: u64, params: &[(&str, &str)]) -> Result<Vec<T>, ClientError> {
        let number = number.max(1);
        let size = if size == 0 { self.page_size } else { size };
        self.send(self.get(&format!("/page/{}/{}", number, size), params)).await
    }

    pub async fn all(&self, params: &[(&str, &str)]) -> Result<Vec<T>, ClientError> {
        self.send(self.get("/all", params)).await
    }

    pub async fn count(&self, params: &[(&str, &str)]) -> Result<u64, ClientError> {
        self.send(self.get("/count", params)).await
    }

    pub async fn one(&self, id: RecordId) -> Result<T, ClientError> {
        self.send(self.get(&format!("/one/{}", id), &[])).await
    }

    /// Inserts, or updates when the record carries a non-zero id.
    pub async fn save(&self, record: &T) -> Result<Saved<T>, ClientError> {
        self.send(self.http.request(Method::PUT, self.url("")).json(record)).await
    }

    pub async fn delete(&self, id: RecordId) -> Result<bool, ClientError> {
        self.send(self.http.request(Method::DELETE, self.url(&format!("/{}", id))))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Base;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, Serialize, Deserialize)]
    struct Tag {
        #[serde(flatten)]
        base: Base,
        label: String,
    }

    impl Record for Tag {
        const TABLE: &'static str = "tags";
        fn id(&self) -> RecordId {
            self.base.id
        }
    }

    #[test]
    fn base_url_is_required() {
        assert!(matches!(CrudClient::<Tag>::new(""), Err(ClientError::BaseUrlRequired)));
        assert!(matches!(CrudClient::<Tag>::new("/"), Err(ClientError::BaseUrlRequired)));
    }

    #[test]
    fn trailing_slash_is_dropped() {
        let client = CrudClient::<Tag>::new("http://localhost:3000/tags/").unwrap().page_size(0);
        assert_eq!(client.url("/count"), "http://localhost:3000/tags/count");
        assert_eq!(client.page_size, DEFAULT_PAGE_SIZE);
    }
}
