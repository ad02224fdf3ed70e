// src/handlers/error.rs
use std::fmt;
use warp::http::StatusCode;
use warp::reject::Reject;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
}

#[derive(Debug, Clone)]
pub struct ApiError {
    pub message: String,
    pub kind: ErrorKind,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            message: message.into(),
            kind: ErrorKind::BadRequest,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError {
            message: message.into(),
            kind: ErrorKind::NotFound,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}
impl Reject for ApiError {}
