use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::domain::gateway::BookGateway;
use crate::domain::model::book::{Book, BookDraft};
use crate::domain::model::id::BookId;

use super::cache::BookCache;
use super::error::{AppError, Operation};
use super::form::{AddBookForm, EditBookForm};

/// 書き込み系のユースケース。
/// write → (成功時のみ) invalidate → refetch のパターンで操作する。
///
/// 楽観的更新はしない。キャッシュに反映されるのは再フェッチ完了後。
pub struct LibraryService<G: BookGateway> {
    gateway: Arc<G>,
    cache: Arc<BookCache<G>>,
}

impl<G: BookGateway> LibraryService<G> {
    pub fn new(gateway: Arc<G>, cache: Arc<BookCache<G>>) -> Self {
        Self { gateway, cache }
    }

    pub fn cache(&self) -> &Arc<BookCache<G>> {
        &self.cache
    }

    /// Bookを新規作成する。id/created_atはサーバが採番する。
    pub async fn create(&self, draft: BookDraft) -> Result<Book, AppError> {
        draft.validate()?;
        let draft = draft.normalized();
        let book = self
            .gateway
            .create(&draft)
            .await
            .map_err(AppError::request_failed(Operation::Create))?;
        tracing::info!(id = %book.id, title = %book.title, "book created");
        self.refresh(Operation::Create).await;
        Ok(book)
    }

    /// Book全体を送って更新する。
    pub async fn update(&self, book: Book) -> Result<Book, AppError> {
        book.validate()?;
        let updated = self
            .gateway
            .update(&book)
            .await
            .map_err(AppError::request_failed(Operation::Update))?;
        tracing::info!(id = %updated.id, "book updated");
        self.refresh(Operation::Update).await;
        Ok(updated)
    }

    pub async fn remove(&self, id: &BookId) -> Result<(), AppError> {
        self.gateway
            .remove(id)
            .await
            .map_err(AppError::request_failed(Operation::Remove))?;
        tracing::info!(id = %id, "book removed");
        self.refresh(Operation::Remove).await;
        Ok(())
    }

    /// 編集フォームの内容で更新する。
    pub async fn submit_edit_form(&self, form: EditBookForm) -> Result<Book, AppError> {
        self.update(form.into_book()).await
    }

    // --- private ---

    /// 書き込み自体は成功しているので、再フェッチの失敗はログに留める。
    async fn refresh(&self, after: Operation) {
        if let Err(e) = self.cache.invalidate_and_refetch().await {
            tracing::warn!(error = %e, after = %after, "refetch after write failed");
        }
    }
}

impl<G: BookGateway> LibraryService<G> {
    /// 追加フォームを送信する。
    ///
    /// 必須項目が欠けていればフォームはそのままでエラーを返す。通ればDraftを
    /// 取り出してフォームを即座に初期化し、作成はバックグラウンドで行う。
    /// フォームから見れば投げっぱなしで、書き込みの成否を待たずにクリアされる。
    pub fn submit_add_form(
        self: &Arc<Self>,
        form: &AddBookForm,
    ) -> Result<JoinHandle<Result<Book, AppError>>, AppError> {
        form.draft().validate()?;
        let draft = form.take_and_reset();
        let service = Arc::clone(self);
        Ok(tokio::spawn(async move {
            let result = service.create(draft).await;
            if let Err(e) = &result {
                tracing::warn!(error = %e, "background create failed");
            }
            result
        }))
    }
}
