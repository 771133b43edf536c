use std::fmt;

use crate::domain::error::DomainError;

/// ゲートウェイ操作の識別子。RequestFailedのどの呼び出しで失敗したかを示す。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListOrSearch,
    LookupMetadata,
    Create,
    Update,
    Remove,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::ListOrSearch => "list_or_search",
            Operation::LookupMetadata => "lookup_metadata",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Remove => "remove",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("request failed ({operation}): {source}")]
    RequestFailed {
        operation: Operation,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("no metadata candidate at index {0}")]
    CandidateNotFound(usize),
}

impl AppError {
    pub fn request_failed<E>(operation: Operation) -> impl FnOnce(E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        move |e| AppError::RequestFailed {
            operation,
            source: Box::new(e),
        }
    }

    pub fn operation(&self) -> Option<Operation> {
        match self {
            AppError::RequestFailed { operation, .. } => Some(*operation),
            _ => None,
        }
    }
}
