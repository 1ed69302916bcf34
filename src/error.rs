//! Typed errors and HTTP mapping.

use crate::response::ErrorBody;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// A model description that cannot produce parameter shapes.
#[derive(Error, Debug)]
pub enum ShapeError {
    #[error("{record}: duplicate field '{field}'")]
    DuplicateField { record: String, field: String },
    #[error("{record}: no field named '{field}'")]
    MissingField { record: String, field: String },
    #[error("{record}: contents field '{field}' is not a list of records")]
    NotAList { record: String, field: String },
    #[error("{record} does not expose a language identifier")]
    NotContent { record: String },
    #[error("{record}: contents relation has no foreign key")]
    MissingForeignKey { record: String },
    #[error("{record} has no identity field (embed Model)")]
    MissingId { record: String },
}

/// A request body or query string that does not fit its shape.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("body must be a JSON object")]
    NotAnObject,
    #[error("field '{field}': expected {expected}, found {found}")]
    WrongType {
        field: String,
        expected: String,
        found: &'static str,
    },
    #[error("field '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CopyError {
    #[error("field {field}: type mismatch: {from} -> {to}")]
    TypeMismatch {
        field: String,
        from: String,
        to: String,
    },
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("model field {0} cannot be set")]
    FieldNotSettable(String),
    #[error(transparent)]
    Copy(#[from] CopyError),
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error("model encoding: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("model decoding: {0}")]
    Decode(#[source] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {key}='{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("config load: {0}")]
    Load(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    /// Rollback failed after `cause`; both are kept.
    #[error("rollback failed: {rollback} (after: {cause})")]
    Rollback {
        cause: Box<AppError>,
        rollback: sqlx::Error,
    },
    #[error("stored record: {0}")]
    Decode(#[source] serde_json::Error),
}

impl AppError {
    /// A missing row, possibly behind a failed rollback.
    pub fn is_not_found(&self) -> bool {
        match self {
            AppError::NotFound(_) | AppError::Db(sqlx::Error::RowNotFound) => true,
            AppError::Rollback { cause, .. } => cause.is_not_found(),
            _ => false,
        }
    }
}

/// Stable codes carried in `error_code`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    CantReadId,
    FetchReadObjectError,
    FetchError,
    GenerateFilterParamsError,
    ParseFilterParamsError,
    GenerateCreateParamsError,
    ParseCreateParamsError,
    GenerateCreateModelError,
    CreateError,
    NotFound,
    GenerateUpdateParamsError,
    ParseUpdateParamsError,
    GenerateUpdateModelError,
    UpdateError,
    DeleteError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::CantReadId => "CANT_READ_ID",
            ErrorCode::FetchReadObjectError => "FETCH_READ_OBJECT_ERROR",
            ErrorCode::FetchError => "FETCH_ERROR",
            ErrorCode::GenerateFilterParamsError => "GENERATE_FILTER_PARAMS_ERROR",
            ErrorCode::ParseFilterParamsError => "PARSE_FILTER_PARAMS_ERROR",
            ErrorCode::GenerateCreateParamsError => "GENERATE_CREATE_PARAMS_ERROR",
            ErrorCode::ParseCreateParamsError => "PARSE_CREATE_PARAMS_ERROR",
            ErrorCode::GenerateCreateModelError => "GENERATE_CREATE_MODEL_ERROR",
            ErrorCode::CreateError => "CREATE_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::GenerateUpdateParamsError => "GENERATE_UPDATE_PARAMS_ERROR",
            ErrorCode::ParseUpdateParamsError => "PARSE_UPDATE_PARAMS_ERROR",
            ErrorCode::GenerateUpdateModelError => "GENERATE_UPDATE_MODEL_ERROR",
            ErrorCode::UpdateError => "UPDATE_ERROR",
            ErrorCode::DeleteError => "DELETE_ERROR",
        }
    }

    /// Every code maps to 400, not-found paths included.
    pub fn status(self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

/// An [`AppError`] tagged with the code of the step that failed.
#[derive(Debug)]
pub struct ApiError {
    pub code: ErrorCode,
    pub error: AppError,
}

impl ApiError {
    pub fn new(code: ErrorCode, error: impl Into<AppError>) -> Self {
        Self {
            code,
            error: error.into(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.error)
    }
}

/// Tags any error convertible into [`AppError`] with an [`ErrorCode`].
pub trait ResultExt<T> {
    fn code(self, code: ErrorCode) -> Result<T, ApiError>;
}

impl<T, E: Into<AppError>> ResultExt<T> for Result<T, E> {
    fn code(self, code: ErrorCode) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::new(code, e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status();
        tracing::warn!(error_code = self.code.as_str(), error = %self.error, "request failed");
        let body = ErrorBody {
            error: self.error.to_string(),
            error_code: self.code.as_str().to_string(),
        };
        (status, Json(body)).into_response()
    }
}
