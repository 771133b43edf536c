//! Snapshot tests: wire payload regression detection.

mod common;

use common::{candidate, sample_books};
use insta::assert_json_snapshot;

use bookshelf_sync::domain::model::book::{Book, BookDraft, Rating};
use bookshelf_sync::domain::model::metadata::MetadataSearchResponse;

// =============================================================================
// Outgoing payloads
// =============================================================================

#[test]
fn snapshot_minimal_draft() {
    let draft = BookDraft::new("Foundation", "Isaac Asimov");
    assert_json_snapshot!(draft, @r#"
    {
      "title": "Foundation",
      "author": "Isaac Asimov",
      "isRead": false
    }
    "#);
}

#[test]
fn snapshot_draft_from_candidate() {
    let mut draft =
        candidate("Dune", "Frank Herbert", "9780441013593", Some(12345)).to_draft();
    draft.rating = Some(Rating::new(4).unwrap());
    assert_json_snapshot!(draft, @r#"
    {
      "title": "Dune",
      "author": "Frank Herbert",
      "isbn": "9780441013593",
      "coverUrl": "https://covers.openlibrary.org/b/id/12345-M.jpg",
      "rating": 4,
      "isRead": false
    }
    "#);
}

#[test]
fn snapshot_full_book_update() {
    let book = sample_books().remove(0);
    assert_json_snapshot!(book, @r#"
    {
      "id": "b-1",
      "title": "Dune",
      "author": "Frank Herbert",
      "isbn": "9780441013593",
      "rating": 4,
      "isRead": true
    }
    "#);
}

// =============================================================================
// Incoming payloads
// =============================================================================

#[test]
fn snapshot_book_from_backend() {
    let book: Book = serde_json::from_str(
        r#"{
            "id": "6650f1",
            "title": "Neuromancer",
            "author": "William Gibson",
            "isbn": null,
            "coverUrl": null,
            "rating": 0,
            "isRead": false,
            "notes": "Sprawl #1",
            "created_at": "2024-05-01T12:30:00Z"
        }"#,
    )
    .unwrap();
    assert_json_snapshot!(book, @r#"
    {
      "id": "6650f1",
      "title": "Neuromancer",
      "author": "William Gibson",
      "rating": 0,
      "isRead": false,
      "notes": "Sprawl #1",
      "created_at": "2024-05-01T12:30:00Z"
    }
    "#);
}

#[test]
fn snapshot_metadata_docs() {
    let response: MetadataSearchResponse = serde_json::from_str(
        r#"{
            "numFound": 2,
            "docs": [
                {"title": "Dune", "author_name": ["Frank Herbert"], "isbn": ["9780441013593", "0441013597"], "cover_i": 12345},
                {"title": "Dune (untitled edition)"}
            ]
        }"#,
    )
    .unwrap();
    let drafts: Vec<BookDraft> = response.docs.iter().map(|c| c.to_draft()).collect();
    assert_json_snapshot!(drafts, @r#"
    [
      {
        "title": "Dune",
        "author": "Frank Herbert",
        "isbn": "9780441013593",
        "coverUrl": "https://covers.openlibrary.org/b/id/12345-M.jpg",
        "isRead": false
      },
      {
        "title": "Dune (untitled edition)",
        "author": "",
        "isRead": false
      }
    ]
    "#);
}
