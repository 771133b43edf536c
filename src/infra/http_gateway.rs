use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::domain::gateway::BookGateway;
use crate::domain::model::book::{Book, BookDraft};
use crate::domain::model::id::BookId;
use crate::domain::model::metadata::{MetadataCandidate, MetadataParams, MetadataSearchResponse};

#[derive(Debug, thiserror::Error)]
pub enum HttpGatewayError {
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// HTTPゲートウェイの接続設定
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub library_base_url: String,
    pub metadata_search_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

/// reqwestによるBookGateway実装。
/// ライブラリバックエンドと外部メタデータ検索で1つのClientを共有する。
#[derive(Debug, Clone)]
pub struct HttpBookGateway {
    client: Client,
    library_base: Url,
    metadata_search: Url,
}

impl HttpBookGateway {
    pub fn new(settings: &GatewaySettings) -> Result<Self, HttpGatewayError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.clone())
            .build()?;

        tracing::info!(
            library = %settings.library_base_url,
            metadata = %settings.metadata_search_url,
            "creating HTTP gateway"
        );

        Ok(Self {
            client,
            library_base: parse_url(&settings.library_base_url)?,
            metadata_search: parse_url(&settings.metadata_search_url)?,
        })
    }

    /// `<base>/books/<segments...>[/]` を組み立てる。セグメントはパーセントエンコードされる。
    fn books_url(&self, segments: &[&str], trailing_slash: bool) -> Result<Url, HttpGatewayError> {
        let mut url = self.library_base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| HttpGatewayError::InvalidUrl {
                    url: self.library_base.to_string(),
                    reason: "cannot be a base".to_string(),
                })?;
            path.pop_if_empty().push("books").extend(segments);
            if trailing_slash {
                path.push("");
            }
        }
        Ok(url)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, HttpGatewayError> {
        let response = self.send(operation, request).await?;
        Ok(response.json::<T>().await?)
    }

    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, HttpGatewayError> {
        let response = request.send().await.inspect_err(|e| {
            tracing::warn!(operation, error = %e, "transport failure");
        })?;

        let status = response.status();
        tracing::debug!(operation, url = %response.url(), %status, "response received");
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        tracing::warn!(operation, %status, body = %body, "request rejected");
        Err(HttpGatewayError::Status { status, body })
    }
}

#[async_trait]
impl BookGateway for HttpBookGateway {
    type Error = HttpGatewayError;

    async fn list_or_search(&self, query: &str) -> Result<Vec<Book>, Self::Error> {
        let request = if query.is_empty() {
            self.client.get(self.books_url(&[], true)?)
        } else {
            self.client
                .get(self.books_url(&["search"], false)?)
                .query(&[("query", query)])
        };
        self.send_json("list_or_search", request).await
    }

    async fn lookup_metadata(
        &self,
        params: &MetadataParams,
    ) -> Result<Vec<MetadataCandidate>, Self::Error> {
        let request = self
            .client
            .get(self.metadata_search.clone())
            .query(&[params.as_pair()]);
        let response: MetadataSearchResponse = self.send_json("lookup_metadata", request).await?;
        Ok(response.docs)
    }

    async fn create(&self, draft: &BookDraft) -> Result<Book, Self::Error> {
        let request = self.client.post(self.books_url(&[], true)?).json(draft);
        self.send_json("create", request).await
    }

    async fn update(&self, book: &Book) -> Result<Book, Self::Error> {
        let request = self
            .client
            .put(self.books_url(&[book.id.as_str()], true)?)
            .json(book);
        self.send_json("update", request).await
    }

    async fn remove(&self, id: &BookId) -> Result<(), Self::Error> {
        let request = self.client.delete(self.books_url(&[id.as_str()], true)?);
        self.send("remove", request).await?;
        Ok(())
    }
}

fn parse_url(raw: &str) -> Result<Url, HttpGatewayError> {
    Url::parse(raw).map_err(|e| HttpGatewayError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}
