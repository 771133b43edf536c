use serde::{Deserialize, Serialize};
use std::fmt;

/// サーバが採番する不透明なBook ID。クライアント側では生成しない。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(String);

impl BookId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// ログ・ツール出力用の短縮表記（先頭8文字）
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BookId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_truncates_long_ids() {
        let id = BookId::new("3f2a9c1e-77aa-4d1b-9e0f-000000000000");
        assert_eq!(id.short(), "3f2a9c1e");
    }

    #[test]
    fn short_keeps_small_ids() {
        assert_eq!(BookId::new("42").short(), "42");
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&BookId::new("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }
}
