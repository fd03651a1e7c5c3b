//! The data-plane HTTP surface (spec.md §6): five routes, each bound to
//! one resolved access token.

use crate::controllers::{blocks, files, upload, zip};
use actix_web::web;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/files/{token}/{filename}", web::get().to(files::show))
        .route("/files/{token}/{filename}", web::head().to(files::show))
        .route("/blks/{token}/{block_id}", web::get().to(blocks::show))
        .route("/zip/{token}", web::get().to(zip::show))
        .route("/upload-api/{token}", web::post().to(upload::api))
        .route("/upload-aj/{token}", web::post().to(upload::ajax))
        .route("/upload-aj/{token}", web::method(actix_web::http::Method::OPTIONS).to(upload::options));
}
