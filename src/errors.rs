use crate::cart::CartError;
use crate::checkout::CheckoutError;
use crate::loyalty::LoyaltyError;
use crate::operator::AuthError;
use crate::orders::OrderError;
use crate::payments::GatewayError;
use crate::settings::SettingsError;
use axum::{http::StatusCode, Json};
use serde_json::json;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err)
    }
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::UnknownItem(_) => Self::not_found(err.to_string()),
            _ => Self::bad_request(err.to_string()),
        }
    }
}

impl From<LoyaltyError> for AppError {
    fn from(err: LoyaltyError) -> Self {
        match err {
            LoyaltyError::UnknownReward(_) | LoyaltyError::UnknownCoupon(_) => {
                Self::not_found(err.to_string())
            }
            LoyaltyError::CouponAlreadyActive => Self::conflict(err.to_string()),
            LoyaltyError::NotOwner => Self::new(StatusCode::FORBIDDEN, err.to_string()),
            _ => Self::bad_request(err.to_string()),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Cart(inner) => inner.into(),
            CheckoutError::Loyalty(inner) => inner.into(),
            CheckoutError::UnknownLocation(_) | CheckoutError::UnknownPromo(_) => {
                Self::not_found(err.to_string())
            }
            CheckoutError::Closed(_) => Self::conflict(err.to_string()),
            _ => Self::bad_request(err.to_string()),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound(_) | OrderError::UnknownSession(_) => {
                Self::not_found(err.to_string())
            }
            OrderError::Transition(_) => Self::conflict(err.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::LockedOut { .. } => Self::new(StatusCode::TOO_MANY_REQUESTS, err.to_string()),
            _ => Self::unauthorized(err.to_string()),
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, err.to_string())
    }
}

impl From<SettingsError> for AppError {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::Loyalty(inner) => inner.into(),
            SettingsError::NotFound(_) => Self::not_found(err.to_string()),
            SettingsError::Duplicate(_) => Self::conflict(err.to_string()),
            SettingsError::Invalid(_) => Self::bad_request(err.to_string()),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
