use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::domain::gateway::BookGateway;
use crate::domain::model::book::{Book, BookDraft};
use crate::domain::model::metadata::MetadataParams;

use super::cache::BookCache;
use super::debounce::{
    DebounceState, DebouncedSearch, Debouncer, SearchAction, DEFAULT_QUIET_PERIOD,
};
use super::error::AppError;
use super::form::AddBookForm;

/// メタデータ検索でタイマーを張るのに必要な最小文字数
pub const DEFAULT_MIN_METADATA_CHARS: usize = 3;

/// 検索コントローラの設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSettings {
    pub quiet_period: Duration,
    pub min_metadata_chars: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            quiet_period: DEFAULT_QUIET_PERIOD,
            min_metadata_chars: DEFAULT_MIN_METADATA_CHARS,
        }
    }
}

// =============================================================================
// Library search: 静止期間後にキャッシュを無効化・再フェッチ
// =============================================================================

pub struct LibrarySearchAction<G: BookGateway> {
    cache: Arc<BookCache<G>>,
}

#[async_trait]
impl<G: BookGateway> SearchAction for LibrarySearchAction<G> {
    async fn fire(&self, query: String) {
        if let Err(e) = self.cache.search(&query).await {
            tracing::warn!(error = %e, query = %query, "library search failed");
        }
    }
}

/// ライブラリ全体検索。入力値はローカルフィルタにもそのまま使う。
pub struct LibrarySearch<G: BookGateway> {
    cache: Arc<BookCache<G>>,
    controller: DebouncedSearch<LibrarySearchAction<G>>,
}

impl<G: BookGateway> LibrarySearch<G> {
    pub fn new(cache: Arc<BookCache<G>>, settings: SearchSettings) -> Self {
        let action = Arc::new(LibrarySearchAction {
            cache: Arc::clone(&cache),
        });
        Self {
            cache,
            controller: DebouncedSearch::new(Debouncer::new(settings.quiet_period), action),
        }
    }

    pub fn type_query(&self, input: &str) {
        self.controller.keystroke(input);
    }

    pub fn search_now(&self) -> Option<JoinHandle<()>> {
        self.controller.search_now()
    }

    pub fn query(&self) -> String {
        self.controller.current_input()
    }

    pub fn state(&self) -> DebounceState {
        self.controller.state()
    }

    /// 描画対象: キャッシュ済みコレクションを現在の入力で絞り込んだもの
    pub fn visible_books(&self) -> Option<Vec<Book>> {
        self.cache.filtered(&self.query())
    }
}

// =============================================================================
// Metadata lookup: 静止期間後に外部カタログを検索
// =============================================================================

pub struct MetadataLookupAction<G: BookGateway> {
    gateway: Arc<G>,
    form: Arc<AddBookForm>,
}

#[async_trait]
impl<G: BookGateway> SearchAction for MetadataLookupAction<G> {
    /// 失敗はログに残して握りつぶす（候補0件、is_searchingは戻す）。
    async fn fire(&self, query: String) {
        let params = MetadataParams::from_query(&query);
        tracing::debug!(
            field = params.field().as_str(),
            value = params.value(),
            "metadata lookup"
        );

        self.form.begin_search();
        let candidates = match self.gateway.lookup_metadata(&params).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(error = %e, query = %query, "metadata lookup failed");
                Vec::new()
            }
        };
        self.form.finish_search(candidates);
    }
}

/// 追加フォームの外部カタログ検索。
pub struct MetadataLookup<G: BookGateway> {
    form: Arc<AddBookForm>,
    controller: DebouncedSearch<MetadataLookupAction<G>>,
}

impl<G: BookGateway> MetadataLookup<G> {
    pub fn new(gateway: Arc<G>, form: Arc<AddBookForm>, settings: SearchSettings) -> Self {
        let action = Arc::new(MetadataLookupAction {
            gateway,
            form: Arc::clone(&form),
        });
        let debouncer =
            Debouncer::new(settings.quiet_period).with_min_chars(settings.min_metadata_chars);
        Self {
            form,
            controller: DebouncedSearch::new(debouncer, action),
        }
    }

    pub fn type_query(&self, input: &str) {
        self.form.set_metadata_query(input);
        self.controller.keystroke(input);
    }

    /// 検索欄の現在値で即時検索する。
    pub fn search_now(&self) -> Option<JoinHandle<()>> {
        let query = self.form.snapshot().metadata_query;
        self.controller.search_now_with(&query)
    }

    /// 候補を選んでDraftに反映する。保留中の検索は取り消す。
    pub fn select_candidate(&self, index: usize) -> Result<BookDraft, AppError> {
        let draft = self.form.select_candidate(index)?;
        self.controller.cancel();
        Ok(draft)
    }

    pub fn state(&self) -> DebounceState {
        self.controller.state()
    }

    pub fn form(&self) -> &Arc<AddBookForm> {
        &self.form
    }
}
