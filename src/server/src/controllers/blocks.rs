//! Raw block download handler: `GET /blks/{token}/{block_id}`.
//!
//! Streams the stored bytes as-is (ciphertext if the repo is encrypted);
//! no decryption happens at this layer, per spec.md §4.6.

use crate::errors::ThicketHttpError;
use crate::helpers;
use actix_web::{HttpRequest, HttpResponse};
use thicket::model::Operation;
use thicket::rpc::resolve_access;
use thicket::ThicketError;

pub async fn show(req: HttpRequest) -> Result<HttpResponse, ThicketHttpError> {
    let data = helpers::app_data(&req)?;
    let token = helpers::path_param(&req, "token")?;
    let block_id = helpers::path_param(&req, "block_id")?;

    let access = resolve_access(data.tokens.as_ref(), token, Operation::Downloadblks).await?;
    let repo = data.registry.get(&access.repo_id).await?;
    let file = thicket::download::load_file(data.fs.as_ref(), &repo.store_id, &access.obj_id).await?;

    if !file.block_ids.iter().any(|id| id == block_id) {
        return Err(ThicketHttpError(ThicketError::bad_request(format!(
            "block {block_id} not part of the requested file"
        ))));
    }

    let bytes = data.blocks.read(&repo.store_id, block_id).await?;
    Ok(HttpResponse::Ok()
        .content_type("application/octet-stream")
        .body(bytes))
}
