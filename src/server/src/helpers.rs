//! Small per-request helpers shared by every controller: pulling
//! `AppData` and path/query parameters out of an `HttpRequest` with a
//! consistent `BadRequest`/`Internal` failure mode instead of `.unwrap()`.

use crate::app_data::AppData;
use crate::errors::ThicketHttpError;
use actix_web::{web, HttpRequest};
use thicket::ThicketError;

pub fn app_data(req: &HttpRequest) -> Result<&web::Data<AppData>, ThicketHttpError> {
    req.app_data::<web::Data<AppData>>()
        .ok_or_else(|| ThicketHttpError(ThicketError::internal("app data not configured")))
}

pub fn path_param<'a>(req: &'a HttpRequest, name: &str) -> Result<&'a str, ThicketHttpError> {
    req.match_info()
        .get(name)
        .ok_or_else(|| ThicketHttpError(ThicketError::bad_request(format!("missing path parameter {name}"))))
}

/// `true` when the request's `User-Agent` names Firefox, used by the
/// `Content-Disposition` filename-form rule.
pub fn is_firefox(req: &HttpRequest) -> bool {
    req.headers()
        .get(actix_web::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|ua| ua.contains("Firefox"))
        .unwrap_or(false)
}
