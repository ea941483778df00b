use super::{EesErr, EesError};
use crate::core::embedder::EmbeddingError;
use axum::{
    http::{header::RETRY_AFTER, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

impl EesError {
    pub fn status(&self) -> StatusCode {
        use EesErr as E;
        use StatusCode as SC;
        match &self.error {
            E::ParseInt(_) | E::Validation(_) => SC::BAD_REQUEST,
            E::AlreadyExists(_) => SC::CONFLICT,
            E::DoesNotExist(_) => SC::NOT_FOUND,
            E::InvalidProvider(_) => SC::UNPROCESSABLE_ENTITY,
            E::Embedding(e) => match e {
                EmbeddingError::Authentication { .. } => SC::UNAUTHORIZED,
                EmbeddingError::RateLimit { .. } => SC::TOO_MANY_REQUESTS,
                EmbeddingError::Model { .. } => SC::NOT_FOUND,
                EmbeddingError::Connection { .. } => SC::INTERNAL_SERVER_ERROR,
            },
            E::Migration(_)
            | E::VectorDecode(_)
            | E::MalformedRow(_)
            | E::Sql(_)
            | E::SerdeJson(_)
            | E::IO(_)
            | E::Regex(_)
            | E::Http(_)
            | E::Axum(_) => SC::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response wrapper.
#[derive(Debug, Serialize)]
struct ResponseError<T: Serialize> {
    error: T,
}

impl<T> ResponseError<T>
where
    T: Serialize,
{
    pub fn new(error: T) -> Self {
        Self { error }
    }
}

impl<T> IntoResponse for ResponseError<T>
where
    T: Serialize,
{
    fn into_response(self) -> axum::response::Response {
        <Json<ResponseError<T>> as IntoResponse>::into_response(Json(self))
    }
}

impl IntoResponse for EesError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();

        self.print();

        use EesErr as E;

        match self.error {
            E::Validation(errors) => (status, ResponseError::new(errors)).into_response(),

            E::Embedding(EmbeddingError::RateLimit {
                retry_after,
                ref message,
                ..
            }) => {
                let mut response =
                    (status, ResponseError::new(message.clone())).into_response();
                if let Some(seconds) = retry_after {
                    if let Ok(value) = seconds.to_string().parse() {
                        response.headers_mut().insert(RETRY_AFTER, value);
                    }
                }
                response
            }

            E::Embedding(e) => (status, ResponseError::new(e.to_string())).into_response(),

            E::DoesNotExist(e)
            | E::AlreadyExists(e)
            | E::InvalidProvider(e)
            | E::Migration(e) => (status, ResponseError::new(e)).into_response(),

            E::ParseInt(e) => (status, ResponseError::new(e.to_string())).into_response(),

            E::VectorDecode(_)
            | E::MalformedRow(_)
            | E::Sql(_)
            | E::SerdeJson(_)
            | E::IO(_)
            | E::Regex(_)
            | E::Http(_)
            | E::Axum(_) => (
                status,
                ResponseError::new("Internal server error".to_string()),
            )
                .into_response(),
        }
    }
}
