//! Shared test harness for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use bookshelf_sync::application::library::Library;
use bookshelf_sync::application::search::SearchSettings;
use bookshelf_sync::domain::gateway::BookGateway;
use bookshelf_sync::domain::model::book::{Book, BookDraft, Rating};
use bookshelf_sync::domain::model::id::BookId;
use bookshelf_sync::domain::model::metadata::{MetadataCandidate, MetadataParams};

// =============================================================================
// FakeGateway: テスト用ゲートウェイ
// =============================================================================

#[derive(Debug, thiserror::Error)]
#[error("fake backend unavailable")]
pub struct FakeError;

/// ゲートウェイへの呼び出し記録
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListOrSearch(String),
    LookupMetadata { field: &'static str, value: String },
    Create(BookDraft),
    Update(Book),
    Remove(String),
}

#[derive(Debug, Default)]
struct FakeState {
    books: Vec<Book>,
    candidates: Vec<MetadataCandidate>,
    calls: Vec<Call>,
    next_id: u32,
    fail_reads: bool,
    fail_writes: bool,
    fail_metadata: bool,
}

/// HTTP不要のインメモリゲートウェイ。呼び出しを記録し、失敗を注入できる。
#[derive(Clone, Default)]
pub struct FakeGateway {
    state: Arc<Mutex<FakeState>>,
    latency: Duration,
}

impl FakeGateway {
    pub fn new(books: Vec<Book>) -> Self {
        let next_id = books.len() as u32 + 1;
        Self {
            state: Arc::new(Mutex::new(FakeState {
                books,
                next_id,
                ..FakeState::default()
            })),
            latency: Duration::ZERO,
        }
    }

    /// 全リクエストに遅延を入れる（tokioの仮想時間で進む）。
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_candidates(self, candidates: Vec<MetadataCandidate>) -> Self {
        self.state.lock().unwrap().candidates = candidates;
        self
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    pub fn fail_metadata(&self, fail: bool) {
        self.state.lock().unwrap().fail_metadata = fail;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn fetches(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::ListOrSearch(q) => Some(q),
                _ => None,
            })
            .collect()
    }

    pub fn metadata_lookups(&self) -> Vec<(&'static str, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::LookupMetadata { field, value } => Some((field, value)),
                _ => None,
            })
            .collect()
    }

    pub fn stored_books(&self) -> Vec<Book> {
        self.state.lock().unwrap().books.clone()
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl BookGateway for FakeGateway {
    type Error = FakeError;

    async fn list_or_search(&self, query: &str) -> Result<Vec<Book>, Self::Error> {
        let fail = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::ListOrSearch(query.to_string()));
            state.fail_reads
        };
        self.pause().await;
        if fail {
            return Err(FakeError);
        }
        let state = self.state.lock().unwrap();
        let needle = query.to_lowercase();
        Ok(state
            .books
            .iter()
            .filter(|b| {
                needle.is_empty()
                    || b.title.to_lowercase().contains(&needle)
                    || b.author.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }

    async fn lookup_metadata(
        &self,
        params: &MetadataParams,
    ) -> Result<Vec<MetadataCandidate>, Self::Error> {
        let fail = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::LookupMetadata {
                field: params.field().as_str(),
                value: params.value().to_string(),
            });
            state.fail_metadata
        };
        self.pause().await;
        if fail {
            return Err(FakeError);
        }
        Ok(self.state.lock().unwrap().candidates.clone())
    }

    async fn create(&self, draft: &BookDraft) -> Result<Book, Self::Error> {
        let fail = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::Create(draft.clone()));
            state.fail_writes
        };
        self.pause().await;
        if fail {
            return Err(FakeError);
        }
        let mut state = self.state.lock().unwrap();
        let book = Book {
            id: BookId::new(format!("b-{}", state.next_id)),
            title: draft.title.clone(),
            author: draft.author.clone(),
            isbn: draft.isbn.clone(),
            cover_url: draft.cover_url.clone(),
            rating: draft.rating,
            is_read: draft.is_read,
            notes: draft.notes.clone(),
            created_at: None,
        };
        state.next_id += 1;
        state.books.push(book.clone());
        Ok(book)
    }

    async fn update(&self, book: &Book) -> Result<Book, Self::Error> {
        let fail = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::Update(book.clone()));
            state.fail_writes
        };
        self.pause().await;
        if fail {
            return Err(FakeError);
        }
        let mut state = self.state.lock().unwrap();
        match state.books.iter_mut().find(|b| b.id == book.id) {
            Some(stored) => {
                *stored = book.clone();
                Ok(book.clone())
            }
            None => Err(FakeError),
        }
    }

    async fn remove(&self, id: &BookId) -> Result<(), Self::Error> {
        let fail = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::Remove(id.as_str().to_string()));
            state.fail_writes
        };
        self.pause().await;
        if fail {
            return Err(FakeError);
        }
        self.state.lock().unwrap().books.retain(|b| &b.id != id);
        Ok(())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn book(id: &str, title: &str, author: &str) -> Book {
    Book {
        id: BookId::new(id),
        title: title.into(),
        author: author.into(),
        isbn: None,
        cover_url: None,
        rating: None,
        is_read: false,
        notes: None,
        created_at: None,
    }
}

/// 標準的なテスト用蔵書:
/// ```text
/// b-1  Dune            Frank Herbert   isbn 9780441013593  ★4  read
/// b-2  Dune Messiah    Frank Herbert
/// b-3  Neuromancer     William Gibson
/// ```
pub fn sample_books() -> Vec<Book> {
    let mut dune = book("b-1", "Dune", "Frank Herbert");
    dune.isbn = Some("9780441013593".into());
    dune.rating = Some(Rating::new(4).unwrap());
    dune.is_read = true;
    vec![
        dune,
        book("b-2", "Dune Messiah", "Frank Herbert"),
        book("b-3", "Neuromancer", "William Gibson"),
    ]
}

pub fn candidate(title: &str, author: &str, isbn: &str, cover: Option<u64>) -> MetadataCandidate {
    MetadataCandidate {
        title: title.into(),
        author_name: vec![author.into()],
        isbn: vec![isbn.into()],
        cover_i: cover,
    }
}

pub fn library(gateway: &FakeGateway) -> Library<FakeGateway> {
    Library::new(gateway.clone(), SearchSettings::default())
}

/// spawnされたタスクを進める。仮想時間は動かさない。
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

pub fn assert_error_contains<T: std::fmt::Debug>(
    result: Result<T, impl std::fmt::Display>,
    expected: &str,
) {
    match result {
        Err(e) => {
            let msg = e.to_string();
            assert!(
                msg.contains(expected),
                "Expected error containing '{expected}', got: '{msg}'"
            );
        }
        Ok(v) => panic!("Expected error containing '{expected}', got Ok({v:?})"),
    }
}
