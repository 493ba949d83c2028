use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("unknown rater kind: {value}. Must be 'peer', 'supervisor' or 'responsible'")]
    UnknownRaterKind { value: String },

    #[error("unknown answer label: {value}. Must be one of 'very_bad', 'bad', 'regular', 'very_good', 'excellent'")]
    UnknownAnswerLabel { value: String },

    #[error("unknown outcome: {value}. Must be 'positive', 'negative' or 'neutral'")]
    UnknownOutcome { value: String },

    #[error("malformed answer '{raw}': expected KEY=VALUE")]
    MalformedAnswer { raw: String },

    #[error("employee not found: {email}")]
    EmployeeNotFound { email: String },

    #[error("complaint rejected: rate limit exceeded for source '{source_key}'")]
    RateLimited { source_key: String },
}
