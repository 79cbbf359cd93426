use crate::allocation::report::ExportError;
use crate::allocation::AllocationError;
use crate::config::{ConfigError, ModelConfigError};
use crate::sources::SourceImportError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Model(ModelConfigError),
    Import(SourceImportError),
    Allocation(AllocationError),
    Export(ExportError),
    UnknownScenario(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Model(err) => write!(f, "model parameter error: {}", err),
            AppError::Import(err) => write!(f, "source import error: {}", err),
            AppError::Allocation(err) => write!(f, "{}", err),
            AppError::Export(err) => write!(f, "export error: {}", err),
            AppError::UnknownScenario(name) => write!(f, "unknown scenario '{}'", name),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Model(err) => Some(err),
            AppError::Import(err) => Some(err),
            AppError::Allocation(err) => Some(err),
            AppError::Export(err) => Some(err),
            AppError::UnknownScenario(_) => None,
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Import(_) | AppError::Model(_) | AppError::UnknownScenario(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Allocation(AllocationError::Model(_)) => StatusCode::BAD_REQUEST,
            AppError::Allocation(AllocationError::Normalization(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            AppError::Allocation(AllocationError::Normalization(err)) => Json(json!({
                "error": self.to_string(),
                "invariant": err.invariant(),
            })),
            _ => Json(json!({ "error": self.to_string() })),
        };
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<ModelConfigError> for AppError {
    fn from(value: ModelConfigError) -> Self {
        Self::Model(value)
    }
}

impl From<SourceImportError> for AppError {
    fn from(value: SourceImportError) -> Self {
        Self::Import(value)
    }
}

impl From<AllocationError> for AppError {
    fn from(value: AllocationError) -> Self {
        Self::Allocation(value)
    }
}

impl From<ExportError> for AppError {
    fn from(value: ExportError) -> Self {
        Self::Export(value)
    }
}
