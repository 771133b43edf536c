use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::model::book::{Book, BookDraft, BookPatch, Rating};
use crate::domain::model::metadata::MetadataCandidate;

use super::error::AppError;

/// 追加フォームの一時状態。
#[derive(Debug, Clone, PartialEq)]
pub struct AddFormState {
    pub draft: BookDraft,
    /// メタデータ検索欄の入力
    pub metadata_query: String,
    pub candidates: Vec<MetadataCandidate>,
    pub is_searching: bool,
}

impl Default for AddFormState {
    fn default() -> Self {
        Self {
            draft: blank_draft(),
            metadata_query: String::new(),
            candidates: Vec::new(),
            is_searching: false,
        }
    }
}

/// 追加フォームの初期Draft。ratingは0から始まる。
pub fn blank_draft() -> BookDraft {
    BookDraft {
        rating: Some(Rating::ZERO),
        ..BookDraft::default()
    }
}

/// 追加フォーム。メタデータ検索コントローラと送信処理から共有される。
#[derive(Debug, Default)]
pub struct AddBookForm {
    state: Mutex<AddFormState>,
}

impl AddBookForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> AddFormState {
        self.lock().clone()
    }

    pub fn draft(&self) -> BookDraft {
        self.lock().draft.clone()
    }

    pub fn candidates(&self) -> Vec<MetadataCandidate> {
        self.lock().candidates.clone()
    }

    pub fn is_searching(&self) -> bool {
        self.lock().is_searching
    }

    pub fn set_metadata_query(&self, query: &str) {
        self.lock().metadata_query = query.to_string();
    }

    /// Draftフィールドを編集する。
    pub fn edit(&self, patch: BookPatch) {
        self.lock().draft.apply(patch);
    }

    /// 候補を選んでDraftを上書きし、候補一覧と検索欄をクリアする。
    pub fn select_candidate(&self, index: usize) -> Result<BookDraft, AppError> {
        let mut state = self.lock();
        let draft = state
            .candidates
            .get(index)
            .ok_or(AppError::CandidateNotFound(index))?
            .to_draft();
        state.draft = BookDraft {
            rating: Some(Rating::ZERO),
            ..draft
        };
        state.candidates.clear();
        state.metadata_query.clear();
        Ok(state.draft.clone())
    }

    pub(crate) fn begin_search(&self) {
        self.lock().is_searching = true;
    }

    /// 検索完了。結果を差し替えてフラグを戻す。
    pub(crate) fn finish_search(&self, candidates: Vec<MetadataCandidate>) {
        let mut state = self.lock();
        state.candidates = candidates;
        state.is_searching = false;
    }

    /// Draftを取り出し、フォーム全体を初期状態に戻す。
    pub fn take_and_reset(&self) -> BookDraft {
        std::mem::take(&mut *self.lock()).draft
    }

    pub fn reset(&self) {
        *self.lock() = AddFormState::default();
    }

    fn lock(&self) -> MutexGuard<'_, AddFormState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 編集フォーム。既存Bookから初期化し、ratingが無ければ0で埋める。
#[derive(Debug, Clone, PartialEq)]
pub struct EditBookForm {
    book: Book,
}

impl EditBookForm {
    pub fn new(book: Book) -> Self {
        let rating = book.rating.unwrap_or(Rating::ZERO);
        Self {
            book: Book {
                rating: Some(rating),
                ..book
            },
        }
    }

    pub fn book(&self) -> &Book {
        &self.book
    }

    pub fn edit(&mut self, patch: BookPatch) {
        self.book.apply(patch);
    }

    pub fn into_book(self) -> Book {
        self.book
    }
}
