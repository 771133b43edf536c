use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::BookId;
use crate::domain::error::DomainError;

/// 0〜5の評価値。範囲外はデシリアライズ時点で弾く。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MAX_VALUE: u8 = 5;
    pub const ZERO: Rating = Rating(0);

    pub fn new(value: i64) -> Result<Self, DomainError> {
        if (0..=i64::from(Self::MAX_VALUE)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(DomainError::RatingOutOfRange(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Rating {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(r: Rating) -> Self {
        r.0
    }
}

/// サーバ上のBookレコード。フィールド名はREST APIのワイヤ形式に合わせる。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(
        default,
        rename = "created_at",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

impl Book {
    /// 部分更新を適用する（Noneのフィールドは変更しない）
    pub fn apply(&mut self, patch: BookPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(author) = patch.author {
            self.author = author;
        }
        if let Some(isbn) = patch.isbn {
            self.isbn = non_blank(isbn);
        }
        if let Some(cover_url) = patch.cover_url {
            self.cover_url = non_blank(cover_url);
        }
        if let Some(rating) = patch.rating {
            self.rating = rating;
        }
        if let Some(is_read) = patch.is_read {
            self.is_read = is_read;
        }
        if let Some(notes) = patch.notes {
            self.notes = non_blank(notes);
        }
    }

    /// 更新リクエスト前の検証。title/authorは必須。
    pub fn validate(&self) -> Result<(), DomainError> {
        require("title", &self.title)?;
        require("author", &self.author)
    }
}

/// 未保存のBook。フォームが保持し、createでサーバに送る。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDraft {
    pub title: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl BookDraft {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            ..Self::default()
        }
    }

    /// 部分更新を適用する。フォーム入力の反映に使う。
    pub fn apply(&mut self, patch: BookPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(author) = patch.author {
            self.author = author;
        }
        if let Some(isbn) = patch.isbn {
            self.isbn = isbn;
        }
        if let Some(cover_url) = patch.cover_url {
            self.cover_url = cover_url;
        }
        if let Some(rating) = patch.rating {
            self.rating = rating;
        }
        if let Some(is_read) = patch.is_read {
            self.is_read = is_read;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        require("title", &self.title)?;
        require("author", &self.author)
    }

    /// 送信用に正規化する。空文字のoptionalフィールドは未指定として扱う。
    pub fn normalized(self) -> Self {
        Self {
            isbn: self.isbn.and_then(non_blank),
            cover_url: self.cover_url.and_then(non_blank),
            notes: self.notes.and_then(non_blank),
            ..self
        }
    }
}

/// Book/Draftへの部分更新（Noneのフィールドは変更しない、Some(None)でクリア）
#[derive(Debug, Clone, Default)]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<Option<String>>,
    pub cover_url: Option<Option<String>>,
    pub rating: Option<Option<Rating>>,
    pub is_read: Option<bool>,
    pub notes: Option<Option<String>>,
}

fn require(field: &'static str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::MissingField(field));
    }
    Ok(())
}

fn non_blank<S: Into<Option<String>>>(value: S) -> Option<String> {
    value.into().filter(|s| !s.trim().is_empty())
}
