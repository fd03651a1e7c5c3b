//! Multipart upload ingest: `POST /upload-api/{token}` and
//! `POST/OPTIONS /upload-aj/{token}` (spec.md §4.5). The two routes
//! differ only in response shape — a JSON array for the API form, a
//! tab-joined id list for the AJAX form — everything else is shared.

use crate::app_data::AppData;
use crate::errors::ThicketHttpError;
use crate::helpers;
use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::TryStreamExt as _;
use thicket::core::SizeJob;
use thicket::model::Operation;
use thicket::rpc::resolve_access;
use thicket::upload::{commit_uploaded_files, resumable, PendingFile, UploadRequest, UploadedFileInfo};
use thicket::ThicketError;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Removes every tracked temp file on drop, so the handler doesn't have
/// to repeat the cleanup on each of its early-return error paths. Best
/// effort: a missing file is not an error, anything else is logged and
/// swallowed (the response has usually already been built by the time
/// this runs).
#[derive(Default)]
struct TempFileGuard {
    paths: Vec<PathBuf>,
}

impl TempFileGuard {
    fn track(&mut self, path: PathBuf) {
        self.paths.push(path);
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        for path in &self.paths {
            if let Err(err) = std::fs::remove_file(path) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("failed to remove upload temp file {path:?}: {err}");
                }
            }
        }
    }
}

pub async fn api(req: HttpRequest, payload: Multipart) -> Result<HttpResponse, ThicketHttpError> {
    handle(req, payload, true).await
}

pub async fn ajax(req: HttpRequest, payload: Multipart) -> Result<HttpResponse, ThicketHttpError> {
    handle(req, payload, false).await
}

pub async fn options() -> HttpResponse {
    HttpResponse::Ok()
        .insert_header(("Access-Control-Allow-Origin", "*"))
        .insert_header(("Access-Control-Allow-Methods", "POST, OPTIONS"))
        .insert_header(("Access-Control-Allow-Headers", "Content-Type, Content-Range"))
        .finish()
}

async fn handle(req: HttpRequest, mut payload: Multipart, json_format: bool) -> Result<HttpResponse, ThicketHttpError> {
    let data = helpers::app_data(&req)?;
    let token = helpers::path_param(&req, "token")?;
    let access = resolve_access(data.tokens.as_ref(), token, Operation::Upload).await?;
    let repo = data.registry.get(&access.repo_id).await?;

    let content_range_header = req
        .headers()
        .get(header::CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut parent_dir: Option<String> = None;
    let mut relative_path: Option<String> = None;
    let mut replace = false;
    let mut files: Vec<PendingFile> = Vec::new();
    let mut resumable_file: Option<(String, Vec<u8>)> = None;
    let mut temp_files = TempFileGuard::default();

    while let Some(mut field) = payload.try_next().await.map_err(multipart_err)? {
        let content_disposition = field.content_disposition();
        let field_name = content_disposition.get_name().unwrap_or("").to_string();
        let filename = content_disposition.get_filename().map(str::to_string);

        if let Some(filename) = filename {
            thicket::core::validate_name(&filename)?;

            if content_range_header.is_some() {
                if resumable_file.is_some() {
                    return Err(ThicketHttpError(ThicketError::bad_request(
                        "Content-Range requires exactly one file part",
                    )));
                }
                let mut buf = Vec::new();
                while let Some(chunk) = field.try_next().await.map_err(multipart_err)? {
                    buf.extend_from_slice(&chunk);
                }
                resumable_file = Some((filename, buf));
            } else {
                let temp_path = data
                    .config
                    .abs_data_dir
                    .join(thicket::constants::HTTP_TEMP_DIR)
                    .join(Uuid::new_v4().to_string());
                tokio::fs::create_dir_all(temp_path.parent().expect("httptemp dir is not root")).await?;
                temp_files.track(temp_path.clone());
                let mut out = tokio::fs::File::create(&temp_path).await?;
                let mut size: u64 = 0;
                while let Some(chunk) = field.try_next().await.map_err(multipart_err)? {
                    size += chunk.len() as u64;
                    out.write_all(&chunk).await?;
                }
                out.flush().await?;
                files.push(PendingFile {
                    name: filename,
                    temp_path,
                    size,
                });
            }
        } else {
            let mut buf = Vec::new();
            while let Some(chunk) = field.try_next().await.map_err(multipart_err)? {
                buf.extend_from_slice(&chunk);
            }
            let value = String::from_utf8(buf)
                .map_err(|_| ThicketHttpError(ThicketError::bad_request("form field is not valid utf-8")))?;
            match field_name.as_str() {
                "parent_dir" => parent_dir = Some(value),
                "relative_path" => relative_path = Some(value),
                "replace" => replace = value.trim() == "1",
                _ => {}
            }
        }
    }

    let parent_dir = parent_dir.ok_or_else(|| ThicketHttpError(ThicketError::bad_request("missing parent_dir")))?;
    thicket::util::fs::validate_parent_dir(&parent_dir)?;
    if let Some(rel) = &relative_path {
        thicket::util::fs::validate_relative_path(rel)?;
    }

    let canonical_parent = thicket::util::fs::canonicalize_path(&parent_dir);
    let bound_parent = thicket::util::fs::canonicalize_path(&access.obj_id);
    if canonical_parent != bound_parent {
        return Err(ThicketHttpError(ThicketError::Forbidden(
            "parent_dir does not match the access token".into(),
        )));
    }

    if let Some((filename, chunk)) = resumable_file {
        let header_val = content_range_header.as_deref().expect("resumable_file implies header present");
        let range = resumable::parse_content_range(header_val)?;
        let abs_path = thicket::util::fs::posix_join(
            &thicket::util::fs::posix_join(&parent_dir, relative_path.as_deref().unwrap_or("")),
            &filename,
        );

        let assembled = resumable::write_chunk(
            data.registry.as_ref(),
            &data.config.abs_data_dir,
            &access.repo_id,
            &abs_path,
            range,
            &chunk,
        )
        .await?;

        match assembled {
            None => return Ok(HttpResponse::Ok().json(serde_json::json!({"success": true}))),
            Some(temp_path) => {
                temp_files.track(temp_path.clone());
                files.push(PendingFile {
                    name: filename,
                    temp_path,
                    size: range.total,
                });
            }
        }
    }

    if files.is_empty() {
        return Err(ThicketHttpError(ThicketError::bad_request("no files to upload")));
    }

    let total_size: u64 = files.iter().map(|f| f.size).sum();
    let over_quota = data.quota.check_quota(&access.repo_id, total_size as i64).await?;
    if over_quota {
        return Err(ThicketHttpError(ThicketError::QuotaExceeded));
    }

    let key = if repo.info.is_encrypted {
        Some(data.keys.get_decrypt_key(&access.repo_id, &access.user).await?)
    } else {
        None
    };
    let key_pair = key.as_ref().map(|k| (k.key.as_slice(), k.iv.as_slice()));

    let branch = data
        .registry
        .get_branch(&access.repo_id, thicket::constants::MASTER_BRANCH)
        .await?
        .ok_or_else(|| ThicketHttpError(ThicketError::internal(format!("no master branch for {}", access.repo_id))))?;
    let head_commit = data
        .commits
        .load(&repo.store_id, &branch.commit_id)
        .await?
        .ok_or_else(|| ThicketHttpError(ThicketError::not_found(format!("commit {}", branch.commit_id))))?;

    let now = thicket::util::time::now_unix();
    let req_ctx = UploadRequest {
        repo_id: &access.repo_id,
        store_id: &repo.store_id,
        parent_dir: &parent_dir,
        relative_path: relative_path.as_deref(),
        replace,
        user: &access.user,
        encryption_key: key_pair,
        max_upload_size: data.config.max_upload_size,
    };

    let uploaded = commit_uploaded_files(
        data.registry.as_ref(),
        data.blocks.as_ref(),
        data.fs.as_ref(),
        data.commits.as_ref(),
        &req_ctx,
        files,
        &repo.info.name,
        &repo.info.name,
        head_commit.encryption.clone(),
        now,
    )
    .await?;

    spawn_post_commit(data, access.repo_id.clone());

    let event_channel = if access.op == Operation::UploadLink {
        "link-file-upload"
    } else {
        "web-file-upload"
    };
    let events = data.events.clone();
    let user = access.user.clone();
    let repo_id = access.repo_id.clone();
    tokio::spawn(async move {
        events
            .publish(
                event_channel,
                format!("{{\"user\":\"{user}\",\"repo\":\"{repo_id}\",\"bytes\":{total_size}}}"),
            )
            .await;
    });

    Ok(build_response(json_format, uploaded))
}

fn spawn_post_commit(data: &web::Data<AppData>, repo_id: String) {
    let data = data.clone();
    tokio::spawn(async move {
        data.size_worker
            .enqueue(SizeJob {
                repo_id: repo_id.clone(),
                diff: Vec::new(),
            })
            .await;

        match data.registry.is_virtual(&repo_id).await {
            Ok(true) => {
                let now = thicket::util::time::now_unix();
                if let Err(err) = thicket::core::sync_virtual_repo(
                    data.registry.as_ref(),
                    data.fs.as_ref(),
                    data.commits.as_ref(),
                    &repo_id,
                    &[],
                    now,
                )
                .await
                {
                    log::warn!("virtual-repo sync after upload failed for {repo_id}: {err}");
                }
            }
            Ok(false) => {}
            Err(err) => log::warn!("failed to check virtual-repo status for {repo_id}: {err}"),
        }
    });
}

fn build_response(json_format: bool, uploaded: Vec<UploadedFileInfo>) -> HttpResponse {
    if json_format {
        HttpResponse::Ok().json(uploaded)
    } else {
        let ids: Vec<&str> = uploaded.iter().map(|f| f.id.as_str()).collect();
        HttpResponse::Ok().content_type("text/plain").body(ids.join("\t"))
    }
}

fn multipart_err(err: actix_multipart::MultipartError) -> ThicketHttpError {
    ThicketHttpError(ThicketError::bad_request(err.to_string()))
}
