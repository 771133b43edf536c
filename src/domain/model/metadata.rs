use serde::{Deserialize, Serialize};

use super::book::BookDraft;

/// Open Libraryのカバー画像URLテンプレート（Mサイズ）
const COVER_URL_BASE: &str = "https://covers.openlibrary.org/b/id";

/// 外部カタログ検索の候補1件。Draftの初期値にだけ使い、永続化しない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataCandidate {
    pub title: String,
    #[serde(default)]
    pub author_name: Vec<String>,
    #[serde(default)]
    pub isbn: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_i: Option<u64>,
}

impl MetadataCandidate {
    pub fn primary_author(&self) -> Option<&str> {
        self.author_name.first().map(String::as_str)
    }

    pub fn primary_isbn(&self) -> Option<&str> {
        self.isbn.first().map(String::as_str)
    }

    /// cover_iがある場合のみカバー画像URLを導出する。
    pub fn cover_url(&self) -> Option<String> {
        self.cover_i.map(cover_url_for)
    }

    /// 候補からDraftを作る。rating/notesは空、未読扱い。
    pub fn to_draft(&self) -> BookDraft {
        BookDraft {
            title: self.title.clone(),
            author: self.primary_author().unwrap_or_default().to_string(),
            isbn: self.primary_isbn().map(str::to_string),
            cover_url: self.cover_url(),
            rating: None,
            is_read: false,
            notes: None,
        }
    }
}

pub fn cover_url_for(cover_id: u64) -> String {
    format!("{COVER_URL_BASE}/{cover_id}-M.jpg")
}

/// 外部検索APIのレスポンス本体。docs以外のフィールドは無視する。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataSearchResponse {
    #[serde(default)]
    pub docs: Vec<MetadataCandidate>,
}

/// 検索語の分類結果。1回の検索で埋まるパラメータは常に1つ。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchField {
    Isbn,
    Title,
    Author,
}

impl SearchField {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchField::Isbn => "isbn",
            SearchField::Title => "title",
            SearchField::Author => "author",
        }
    }

    /// 分類規則（順序依存）:
    /// 1. 全て10進数字 → isbn
    /// 2. 内部に空白を含む → title
    /// 3. それ以外 → author
    ///
    /// 入力はtrim済みのものとして扱う。
    pub fn classify(trimmed: &str) -> Self {
        if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
            SearchField::Isbn
        } else if trimmed.chars().any(char::is_whitespace) {
            SearchField::Title
        } else {
            SearchField::Author
        }
    }
}

/// メタデータ検索のクエリパラメータ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataParams {
    field: SearchField,
    value: String,
}

impl MetadataParams {
    /// 入力をtrimして分類し、該当フィールドだけを埋める。
    pub fn from_query(input: &str) -> Self {
        let trimmed = input.trim();
        Self {
            field: SearchField::classify(trimmed),
            value: trimmed.to_string(),
        }
    }

    pub fn field(&self) -> SearchField {
        self.field
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// HTTPクエリ文字列用の (key, value) ペア
    pub fn as_pair(&self) -> (&'static str, &str) {
        (self.field.as_str(), &self.value)
    }
}
