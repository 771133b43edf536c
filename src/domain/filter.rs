use super::model::book::Book;

/// キャッシュ済みコレクションをローカルで絞り込む。I/Oなし。
///
/// クエリは小文字化され、title / author / isbn（あれば）のいずれかに
/// 部分一致したBookを元の順序のまま残す。空クエリは全件。
pub fn filter_books(books: &[Book], query: &str) -> Vec<Book> {
    let query = query.to_lowercase();
    books
        .iter()
        .filter(|book| matches(book, &query))
        .cloned()
        .collect()
}

/// `query` は小文字化済みであること。
pub fn matches(book: &Book, query: &str) -> bool {
    book.title.to_lowercase().contains(query)
        || book.author.to_lowercase().contains(query)
        || book
            .isbn
            .as_deref()
            .is_some_and(|isbn| isbn.to_lowercase().contains(query))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::id::BookId;

    fn book(id: &str, title: &str, author: &str, isbn: Option<&str>) -> Book {
        Book {
            id: BookId::new(id),
            title: title.into(),
            author: author.into(),
            isbn: isbn.map(String::from),
            cover_url: None,
            rating: None,
            is_read: false,
            notes: None,
            created_at: None,
        }
    }

    fn shelf() -> Vec<Book> {
        vec![
            book("1", "Dune", "Frank Herbert", Some("9780441172719")),
            book("2", "Emma", "Jane Austen", None),
            book("3", "The Hobbit", "J.R.R. Tolkien", Some("978054792822X")),
        ]
    }

    #[test]
    fn empty_query_keeps_all_in_order() {
        let books = shelf();
        assert_eq!(filter_books(&books, ""), books);
    }

    #[test]
    fn matches_title_case_insensitive() {
        let hits = filter_books(&shelf(), "DUNE");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id.as_str(), "1");
    }

    #[test]
    fn matches_author() {
        let hits = filter_books(&shelf(), "austen");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Emma");
    }

    #[test]
    fn matches_isbn_lowercased() {
        let hits = filter_books(&shelf(), "792822x");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "The Hobbit");
    }

    #[test]
    fn no_match_returns_empty() {
        assert!(filter_books(&shelf(), "zzz").is_empty());
    }

    #[test]
    fn query_is_not_trimmed() {
        assert!(filter_books(&shelf(), " dune").is_empty());
    }
}
