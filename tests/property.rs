//! Property-based tests: invariant verification with proptest.

mod common;

use common::book;
use proptest::prelude::*;

use bookshelf_sync::domain::filter::filter_books;
use bookshelf_sync::domain::model::book::{Book, Rating};
use bookshelf_sync::domain::model::metadata::{MetadataParams, SearchField};

fn arb_book() -> impl Strategy<Value = Book> {
    (
        "[a-zA-Z ]{1,20}",
        "[a-zA-Z .]{1,20}",
        proptest::option::of("[0-9]{10,13}"),
    )
        .prop_map(|(title, author, isbn)| {
            let mut b = book("b-x", &title, &author);
            b.isbn = isbn;
            b
        })
}

proptest! {
    /// 空クエリは全件をそのままの順序で返す。
    #[test]
    fn filter_empty_query_is_identity(books in proptest::collection::vec(arb_book(), 0..20)) {
        prop_assert_eq!(filter_books(&books, ""), books);
    }

    /// 結果は常に元の部分列で、各要素はいずれかのフィールドに部分一致する。
    #[test]
    fn filter_keeps_exactly_matching_books(
        books in proptest::collection::vec(arb_book(), 0..20),
        query in "[a-zA-Z0-9]{0,4}",
    ) {
        let result = filter_books(&books, &query);
        let needle = query.to_lowercase();
        let expected: Vec<Book> = books
            .iter()
            .filter(|b| {
                b.title.to_lowercase().contains(&needle)
                    || b.author.to_lowercase().contains(&needle)
                    || b.isbn.as_deref().is_some_and(|i| i.contains(&needle))
            })
            .cloned()
            .collect();
        prop_assert_eq!(result, expected);
    }

    /// フィルタは大文字小文字を区別しない。
    #[test]
    fn filter_is_case_insensitive(
        books in proptest::collection::vec(arb_book(), 0..20),
        query in "[a-zA-Z]{1,4}",
    ) {
        prop_assert_eq!(
            filter_books(&books, &query.to_uppercase()),
            filter_books(&books, &query.to_lowercase())
        );
    }

    /// 数字のみの入力は常にISBN検索。
    #[test]
    fn digits_classify_as_isbn(digits in "[0-9]{1,13}") {
        let params = MetadataParams::from_query(&digits);
        prop_assert_eq!(params.field(), SearchField::Isbn);
        prop_assert_eq!(params.value(), digits.as_str());
    }

    /// 空白を挟む入力はタイトル検索。
    #[test]
    fn inner_space_classifies_as_title(a in "[a-z]{1,8}", b in "[a-z0-9]{1,8}") {
        let params = MetadataParams::from_query(&format!("{a} {b}"));
        prop_assert_eq!(params.field(), SearchField::Title);
    }

    /// 空白なしで数字以外を含む入力は著者検索。
    #[test]
    fn single_word_classifies_as_author(word in "[a-z][a-z0-9]{0,10}") {
        let params = MetadataParams::from_query(&format!("  {word} "));
        prop_assert_eq!(params.field(), SearchField::Author);
        prop_assert_eq!(params.value(), word.as_str());
    }

    /// 0-5だけがRatingになる。
    #[test]
    fn rating_accepts_only_zero_to_five(value in -100i64..100) {
        prop_assert_eq!(Rating::new(value).is_ok(), (0..=5).contains(&value));
    }
}
