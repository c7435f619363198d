use std::sync::Arc;

use async_graphql::{Error, ErrorExtensions};
use thiserror::Error;

/// Shared GraphQL result type.
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error, Clone)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("bad request: {0}")]
    InvalidInput(String),
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
    #[error("internal server error")]
    Internal(Arc<anyhow::Error>),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::Unavailable(_) => "UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self::Internal(Arc::new(err))
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::internal(value)
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> Error {
        if let ApiError::Internal(inner) = self {
            tracing::error!(error = %inner, "internal error masked from client");
        }
        let mut err = Error::new(self.to_string());
        err = err.extend_with(|_err, e| {
            e.set("code", self.code());
        });
        if let ApiError::InvalidInput(_) = self {
            err = err.extend_with(|_err, e| {
                e.set("type", "BAD_REQUEST");
            });
        }
        err
    }
}

/// Convert any error into a GraphQL error payload while hiding internals.
pub fn internal_error(err: impl Into<anyhow::Error>) -> Error {
    ApiError::internal(err.into()).extend()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_graphql::Value;

    #[test]
    fn internal_errors_are_masked() {
        let err = internal_error(anyhow::anyhow!("connection reset by peer"));
        assert_eq!(err.message, "internal server error");
        let code = err
            .extensions
            .as_ref()
            .and_then(|map| map.get("code"))
            .cloned();
        assert_eq!(code, Some(Value::from("INTERNAL")));
    }

    #[test]
    fn not_found_names_the_resource() {
        let err = ApiError::NotFound("deal").extend();
        assert_eq!(err.message, "deal not found");
        let code = err
            .extensions
            .as_ref()
            .and_then(|map| map.get("code"))
            .cloned();
        assert_eq!(code, Some(Value::from("NOT_FOUND")));
    }

    #[test]
    fn invalid_input_is_tagged_bad_request() {
        let err = ApiError::invalid("unknown stage").extend();
        let kind = err
            .extensions
            .as_ref()
            .and_then(|map| map.get("type"))
            .cloned();
        assert_eq!(kind, Some(Value::from("BAD_REQUEST")));
    }
}
