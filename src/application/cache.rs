use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::domain::filter::filter_books;
use crate::domain::gateway::BookGateway;
use crate::domain::model::book::Book;

use super::error::{AppError, Operation};

/// キャッシュ読み取り結果。
#[derive(Debug, Clone, PartialEq)]
pub enum CacheRead {
    NotYetLoaded,
    Loaded(Arc<Vec<Book>>),
}

impl CacheRead {
    pub fn books(&self) -> Option<&[Book]> {
        match self {
            CacheRead::NotYetLoaded => None,
            CacheRead::Loaded(books) => Some(books),
        }
    }
}

#[derive(Debug, Default)]
struct CacheState {
    books: Option<Arc<Vec<Book>>>,
    query: String,
    stale: bool,
    fetching: bool,
    rerun_requested: bool,
}

/// UIから見た「現在のBookコレクション」の唯一の保持者。
///
/// キーは固定で1つ（クエリ毎のキャッシュは持たない）。フェッチ成功時に値を
/// 丸ごと置き換え、失敗時は直前の値を残す（stale-while-revalidate）。
/// 変更はすべてこのオブジェクト経由で行い、各コンポーネントには `Arc` で注入する。
pub struct BookCache<G: BookGateway> {
    shared: Arc<Shared<G>>,
}

struct Shared<G: BookGateway> {
    gateway: Arc<G>,
    state: Mutex<CacheState>,
    /// 値の置き換えごとに進む
    version: watch::Sender<u64>,
    /// ドライバが再実行分も含めてフェッチを終えるごとに進む
    settled: watch::Sender<u64>,
}

impl<G: BookGateway> BookCache<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        let (version, _) = watch::channel(0);
        let (settled, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                gateway,
                state: Mutex::new(CacheState::default()),
                version,
                settled,
            }),
        }
    }

    pub fn read(&self) -> CacheRead {
        match &self.shared.lock().books {
            Some(books) => CacheRead::Loaded(Arc::clone(books)),
            None => CacheRead::NotYetLoaded,
        }
    }

    /// 描画用: キャッシュ済みの値をローカルフィルタで絞り込む。未ロードならNone。
    pub fn filtered(&self, query: &str) -> Option<Vec<Book>> {
        self.read().books().map(|books| filter_books(books, query))
    }

    /// フェッチ時に使うサーバ側検索クエリ
    pub fn query(&self) -> String {
        self.shared.lock().query.clone()
    }

    pub fn is_stale(&self) -> bool {
        self.shared.lock().stale
    }

    pub fn is_fetching(&self) -> bool {
        self.shared.lock().fetching
    }

    /// 値が置き換わるたびにカウンタが進むReceiverを返す。再描画トリガー用。
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.version.subscribe()
    }

    /// 検索クエリを差し替えてから無効化・再フェッチする。
    pub async fn search(&self, query: &str) -> Result<(), AppError> {
        self.shared.lock().query = query.to_string();
        self.invalidate_and_refetch().await
    }

    /// 無効化して即座に再フェッチする。
    ///
    /// フェッチ中に呼ばれた場合は再実行フラグを立て、実行中のドライバが
    /// 追加の1回を終えるまで待つ。何回無効化されても余分なリクエストは高々1回。
    ///
    /// フェッチループは切り離したタスクで回るので、呼び出し側のFutureが
    /// dropされても合流済みの再実行は失われない。
    ///
    /// エラーはフェッチを駆動した呼び出し側にのみ返る。その場合も直前の値は残る。
    pub async fn invalidate_and_refetch(&self) -> Result<(), AppError> {
        let merged = {
            let mut state = self.shared.lock();
            state.stale = true;
            if state.fetching {
                state.rerun_requested = true;
                tracing::debug!("refetch already in flight, coalescing invalidation");
                Some(self.shared.settled.subscribe())
            } else {
                state.fetching = true;
                None
            }
        };

        if let Some(mut settled) = merged {
            // Senderは`shared`が持つのでErrにはならない
            let _ = settled.changed().await;
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move { shared.drive().await })
            .await
            .unwrap_or_else(|e| Err(AppError::request_failed(Operation::ListOrSearch)(e)))
    }
}

impl<G: BookGateway> BookCache<G> {
    /// 結果を待たずに再フェッチを開始する。
    pub fn spawn_invalidate(self: &Arc<Self>) -> JoinHandle<Result<(), AppError>> {
        let cache = Arc::clone(self);
        tokio::spawn(async move { cache.invalidate_and_refetch().await })
    }

    /// クエリ付きの [`BookCache::spawn_invalidate`]
    pub fn spawn_search(self: &Arc<Self>, query: String) -> JoinHandle<Result<(), AppError>> {
        let cache = Arc::clone(self);
        tokio::spawn(async move { cache.search(&query).await })
    }
}

impl<G: BookGateway> Shared<G> {
    /// `fetching` を立てた呼び出し側だけが走らせるフェッチループ。
    async fn drive(&self) -> Result<(), AppError> {
        let mut guard = FetchGuard {
            shared: self,
            finished: false,
        };

        loop {
            let query = self.lock().query.clone();
            tracing::debug!(query = %query, "fetching book collection");
            let outcome = self.gateway.list_or_search(&query).await;

            let mut state = self.lock();
            let result = match outcome {
                Ok(books) => {
                    tracing::debug!(count = books.len(), "book collection replaced");
                    state.books = Some(Arc::new(books));
                    self.version.send_modify(|v| *v += 1);
                    Ok(())
                }
                Err(e) => {
                    tracing::warn!(error = %e, "book collection fetch failed, keeping previous value");
                    Err(AppError::request_failed(Operation::ListOrSearch)(e))
                }
            };

            if state.rerun_requested {
                state.rerun_requested = false;
                continue;
            }

            state.fetching = false;
            if result.is_ok() {
                state.stale = false;
            }
            self.settled.send_modify(|v| *v += 1);
            guard.finished = true;
            return result;
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// ドライバがパニックで抜けてもfetchingフラグが残らず、合流した呼び出し側も起きるようにする。
struct FetchGuard<'a, G: BookGateway> {
    shared: &'a Shared<G>,
    finished: bool,
}

impl<G: BookGateway> Drop for FetchGuard<'_, G> {
    fn drop(&mut self) {
        if !self.finished {
            let mut state = self.shared.lock();
            state.fetching = false;
            state.rerun_requested = false;
            self.shared.settled.send_modify(|v| *v += 1);
        }
    }
}
