use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("validation error")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("malformed identifier")]
    InvalidObjectId,

    #[error("cart items are required")]
    EmptyCart,

    #[error("invalid payment signature")]
    InvalidPaymentSignature,

    #[error("{0}")]
    Unauthorized(UnauthorizedType),

    #[error("you have no permission to access this resource")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("a user with this email already exists")]
    EmailTaken,

    #[error("{0} already exists")]
    AlreadyExists(&'static str),

    #[error("{0}")]
    PasswordHashError(#[from] password_hash::Error),

    #[error("{0}")]
    DatabaseError(#[from] mongodb::error::Error),

    #[error("{0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("{0}")]
    BsonSerError(#[from] bson::ser::Error),

    #[error("payment gateway request failed")]
    GatewayError(#[from] reqwest::Error),

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum UnauthorizedType {
    #[error("please login to access this resource")]
    MissingToken,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("wrong email or password")]
    WrongCredentials,
}

/// The JSON failure envelope every handler error renders to:
/// `{"success": false, "message": ...}` with field-level validation
/// errors attached when present.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorJson {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<serde_json::Value>,
}

impl From<Error> for ErrorJson {
    fn from(err: Error) -> Self {
        let message = err.to_string();

        let errors = match err {
            Error::ValidationError(err) => serde_json::to_value(err).ok(),
            _ => None,
        };

        Self {
            success: false,
            message,
            errors,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        tracing::error!("error: {:?}", self);
        let status = match self {
            Self::ValidationError(..)
            | Self::InvalidObjectId
            | Self::EmptyCart
            | Self::AlreadyExists(..)
            | Self::InvalidPaymentSignature => StatusCode::BAD_REQUEST,
            Self::Unauthorized(..) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(..) => StatusCode::NOT_FOUND,
            Self::EmailTaken => StatusCode::CONFLICT,
            Self::PasswordHashError(..)
            | Self::DatabaseError(..)
            | Self::JwtError(..)
            | Self::BsonSerError(..)
            | Self::GatewayError(..)
            | Self::Internal(..) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let error = ErrorJson::from(self);

        (status, Json(error)).into_response()
    }
}

impl From<axum::extract::rejection::PathRejection> for Error {
    fn from(_value: axum::extract::rejection::PathRejection) -> Self {
        Self::InvalidObjectId
    }
}
