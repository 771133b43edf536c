#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("rating {0} out of range (0-5)")]
    RatingOutOfRange(i64),

    #[error("required field is blank: {0}")]
    MissingField(&'static str),
}
