use std::sync::Arc;

use crate::domain::gateway::BookGateway;

use super::cache::BookCache;
use super::form::AddBookForm;
use super::search::{LibrarySearch, MetadataLookup, SearchSettings};
use super::service::LibraryService;

/// 1画面分の部品を組み立てる。キャッシュ・フォームはここで1つだけ作り、
/// 各コンポーネントへ `Arc` で配る。
pub struct Library<G: BookGateway> {
    pub cache: Arc<BookCache<G>>,
    pub service: Arc<LibraryService<G>>,
    pub search: LibrarySearch<G>,
    pub add_form: Arc<AddBookForm>,
    pub metadata: MetadataLookup<G>,
}

impl<G: BookGateway> Library<G> {
    pub fn new(gateway: G, settings: SearchSettings) -> Self {
        let gateway = Arc::new(gateway);
        let cache = Arc::new(BookCache::new(Arc::clone(&gateway)));
        let service = Arc::new(LibraryService::new(
            Arc::clone(&gateway),
            Arc::clone(&cache),
        ));
        let add_form = Arc::new(AddBookForm::new());
        let metadata = MetadataLookup::new(gateway, Arc::clone(&add_form), settings);
        let search = LibrarySearch::new(Arc::clone(&cache), settings);

        Self {
            cache,
            service,
            search,
            add_form,
            metadata,
        }
    }
}
