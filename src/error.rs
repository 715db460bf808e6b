use axum::{
    Json,
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::error;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{}", .0.body_text())]
    Query(#[from] QueryRejection),
    #[error("{0}")]
    Internal(String),
    #[error("{0}")]
    Database(#[from] diesel::result::Error),
    #[error("{0}")]
    Connection(#[from] diesel::ConnectionError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Query(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // client mistakes are answered, not logged
        if status.is_server_error() {
            error!("API request failed: {}", self);
        }
        let body = Json(ErrorBody { error: self.to_string() });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
