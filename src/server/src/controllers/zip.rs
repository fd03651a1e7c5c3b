//! Directory/multi-file zip stream handler: `GET /zip/{token}`.
//!
//! Which of `download-dir` or `download-multi` a request is performing
//! is inferred from the shape of the token's own `obj-id` payload (a bare
//! directory id vs a `{parent_dir, file_list}` JSON object) rather than
//! from a query parameter, since the URL is the same for both — the
//! inferred operation is then what gets validated against the token's
//! bound op (spec.md §4.6/§4.8).

use crate::errors::ThicketHttpError;
use crate::helpers;
use crate::params::ZipSelection;
use actix_web::{web, HttpRequest, HttpResponse};
use thicket::download::zip::{collect_directory_entries, collect_multi_select_entries, default_multi_zip_name, write_zip};
use thicket::model::Operation;
use thicket::rpc::resolve_access;
use thicket::ThicketError;

pub async fn show(req: HttpRequest) -> Result<HttpResponse, ThicketHttpError> {
    let data = helpers::app_data(&req)?;
    let token = helpers::path_param(&req, "token")?;

    let raw = data
        .tokens
        .query_access_token(token)
        .await?
        .ok_or_else(|| ThicketError::bad_request("bad access token"))?;

    let selection = serde_json::from_str::<ZipSelection>(&raw.obj_id).ok();
    let url_op = if selection.is_some() {
        Operation::DownloadMulti
    } else {
        Operation::DownloadDir
    };

    let token_op = raw.op.normalized();
    if !url_op.as_str().starts_with(token_op.as_str()) {
        return Err(ThicketHttpError(ThicketError::bad_request(format!(
            "token bound to op {token_op:?}, request is {url_op:?}"
        ))));
    }

    let repo = data.registry.get(&raw.repo_id).await?;
    let key = if repo.info.is_encrypted {
        let k = data.keys.get_decrypt_key(&raw.repo_id, &raw.username).await?;
        Some(k)
    } else {
        None
    };
    let key_pair = key.as_ref().map(|k| (k.key.as_slice(), k.iv.as_slice()));

    let (entries, archive_name) = match selection {
        Some(sel) => {
            let root_id = current_root_id(data, &repo).await?;
            let entries = collect_multi_select_entries(
                data.fs.as_ref(),
                data.blocks.as_ref(),
                &repo.store_id,
                &root_id,
                &sel.parent_dir,
                &sel.file_list,
                key_pair,
            )
            .await?;
            let now = thicket::util::time::now_unix();
            (entries, default_multi_zip_name(now))
        }
        None => {
            let entries =
                collect_directory_entries(data.fs.as_ref(), data.blocks.as_ref(), &repo.store_id, &raw.obj_id, "", key_pair)
                    .await?;
            (entries, format!("{}.zip", repo.info.name))
        }
    };

    let bytes = web::block(move || write_zip(&entries))
        .await
        .map_err(|_| ThicketHttpError(ThicketError::internal("zip worker thread panicked")))??;

    let disposition = crate::content_disposition::build(&archive_name, true, helpers::is_firefox(&req));

    Ok(HttpResponse::Ok()
        .content_type("application/zip")
        .insert_header((actix_web::http::header::CONTENT_DISPOSITION, disposition))
        .insert_header(("X-Content-Type-Options", "nosniff"))
        .body(bytes))
}

async fn current_root_id(data: &crate::app_data::AppData, repo: &thicket::store::Repo) -> Result<String, ThicketHttpError> {
    let head_id = repo
        .head_commit_id
        .clone()
        .ok_or_else(|| ThicketHttpError(ThicketError::not_found("repo has no head commit")))?;
    let commit = data
        .commits
        .load(&repo.store_id, &head_id)
        .await?
        .ok_or_else(|| ThicketHttpError(ThicketError::not_found(format!("commit {head_id}"))))?;
    Ok(commit.root_id)
}
