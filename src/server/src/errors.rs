//! Maps `thicket::ThicketError` onto the HTTP surface: one envelope shape
//! (`{cause?, user_message, http_status}`) for every handler, per the
//! error handling design.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;
use thicket::ThicketError;

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    cause: Option<String>,
    user_message: String,
    http_status: u16,
}

/// Thin wrapper so `ThicketError` (defined in the core crate) can
/// implement `actix_web::ResponseError` without that impl living in a
/// crate that doesn't know about actix.
#[derive(Debug)]
pub struct ThicketHttpError(pub ThicketError);

impl fmt::Display for ThicketHttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ThicketError> for ThicketHttpError {
    fn from(err: ThicketError) -> Self {
        ThicketHttpError(err)
    }
}

impl From<std::io::Error> for ThicketHttpError {
    fn from(err: std::io::Error) -> Self {
        ThicketHttpError(ThicketError::from(err))
    }
}

impl ThicketHttpError {
    fn status_code_raw(&self) -> u16 {
        match &self.0 {
            ThicketError::BadRequest(_) => 400,
            ThicketError::Forbidden(_) => 403,
            ThicketError::NotFound(_) => 404,
            ThicketError::Conflict(_) => 409,
            ThicketError::RangeNotSatisfiable { .. } => 416,
            ThicketError::TooLarge { .. } => 442,
            ThicketError::QuotaExceeded => 443,
            ThicketError::Internal(_) => 500,
            ThicketError::PartialResponse => 499,
        }
    }
}

impl ResponseError for ThicketHttpError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code_raw()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        if matches!(self.0, ThicketError::PartialResponse) {
            log::warn!("response write aborted mid-stream: {}", self.0);
            return HttpResponse::build(self.status_code()).finish();
        }

        let status = self.status_code_raw();
        log::error!("request failed with {status}: {}", self.0);

        let mut builder = HttpResponse::build(self.status_code());
        if let ThicketError::RangeNotSatisfiable { size } = &self.0 {
            builder.insert_header((actix_web::http::header::CONTENT_RANGE, format!("bytes */{size}")));
        }

        builder.json(ErrorEnvelope {
            cause: None,
            user_message: self.0.to_string(),
            http_status: status,
        })
    }
}
