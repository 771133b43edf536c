use async_trait::async_trait;

use super::model::book::{Book, BookDraft};
use super::model::id::BookId;
use super::model::metadata::{MetadataCandidate, MetadataParams};

/// ライブラリバックエンドと外部メタデータ検索への出口。Infra層が実装する。
///
/// 各操作はHTTP呼び出し1回に対応する。リトライはしない。
#[async_trait]
pub trait BookGateway: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// 空クエリなら全件、そうでなければサーバ側検索。
    async fn list_or_search(&self, query: &str) -> Result<Vec<Book>, Self::Error>;

    async fn lookup_metadata(
        &self,
        params: &MetadataParams,
    ) -> Result<Vec<MetadataCandidate>, Self::Error>;

    async fn create(&self, draft: &BookDraft) -> Result<Book, Self::Error>;

    async fn update(&self, book: &Book) -> Result<Book, Self::Error>;

    async fn remove(&self, id: &BookId) -> Result<(), Self::Error>;
}
