use crate::core::embedder::EmbeddingError;
use std::{error::Error as _, num::ParseIntError};
use thiserror::Error;
use tracing::error;
use validify::ValidationErrors;

pub mod http;

#[derive(Debug, Error)]
pub enum EesErr {
    #[error("Does not exist; {0}")]
    DoesNotExist(String),

    #[error("Entity already exists; {0}")]
    AlreadyExists(String),

    #[error("Invalid provider; {0}")]
    InvalidProvider(String),

    #[error("embedding error; {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("migration failed, database may be in an inconsistent state; {0}")]
    Migration(String),

    #[error("stored vector cannot be decoded; {0}")]
    VectorDecode(String),

    #[error("malformed row; {0}")]
    MalformedRow(String),

    #[error("Validation; {0}")]
    Validation(#[from] ValidationErrors),

    #[error("SQL; {0}")]
    Sql(#[from] libsql::Error),

    #[error("JSON error; {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Parse int; {0}")]
    ParseInt(#[from] ParseIntError),

    #[error("IO; {0}")]
    IO(#[from] std::io::Error),

    #[error("Regex; {0}")]
    Regex(#[from] regex::Error),

    #[error("Http; {0}")]
    Http(#[from] axum::http::Error),

    #[error("Axum; {0}")]
    Axum(#[from] axum::Error),
}

#[derive(Debug, Error)]
#[error("{error}")]
pub struct EesError {
    file: &'static str,
    line: u32,
    column: u32,
    pub error: EesErr,
}

impl EesError {
    pub fn new(file: &'static str, line: u32, column: u32, error: EesErr) -> EesError {
        EesError {
            file,
            line,
            column,
            error,
        }
    }

    pub fn location(&self) -> String {
        format!("{}:{}:{}", self.file, self.line, self.column)
    }

    pub fn print(&self) {
        let location = self.location();

        error!("{location} | {self}");

        if self.error.source().is_some() {
            error!("Causes:");
        }

        let mut src = self.error.source();
        while let Some(source) = src {
            error!(" - {source}");
            src = source.source();
        }
    }
}

#[macro_export]
macro_rules! err {
    ($ty:ident $(, $l:literal $(,)? $($args:expr),* )?) => {
        Err($crate::error::EesError::new(
            file!(),
            line!(),
            column!(),
            $crate::error::EesErr::$ty $( (format!($l, $( $args, )*)) )?,
        ))
    };
}

#[macro_export]
macro_rules! map_err {
    ($ex:expr) => {
        $ex.map_err(|e| $crate::error::EesError::new(file!(), line!(), column!(), e.into()))?
    };
}
