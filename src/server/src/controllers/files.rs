//! Single-file download/view handler: `GET`/`HEAD /files/{token}/{filename}`.

use crate::app_data::AppData;
use crate::errors::ThicketHttpError;
use crate::params::FileQuery;
use crate::{content_disposition, helpers};
use actix_web::http::{header, Method, StatusCode};
use actix_web::{web, HttpRequest, HttpResponse};
use thicket::model::Operation;
use thicket::rpc::resolve_access;

pub async fn show(req: HttpRequest, query: web::Query<FileQuery>) -> Result<HttpResponse, ThicketHttpError> {
    let data = helpers::app_data(&req)?;
    let token = helpers::path_param(&req, "token")?;
    let filename = helpers::path_param(&req, "filename")?;

    let url_op = if query.wants_attachment() {
        Operation::Download
    } else {
        Operation::View
    };
    let access = resolve_access(data.tokens.as_ref(), token, url_op).await?;

    let repo = data.registry.get(&access.repo_id).await?;
    let file = thicket::download::load_file(data.fs.as_ref(), &repo.store_id, &access.obj_id).await?;

    // The object model only carries an mtime on a directory's dirent for
    // this file, not on the file object itself, so there is no stored
    // timestamp to report here beyond the instant of the request.
    let now = thicket::util::time::now_unix();
    if let Some(since) = req
        .headers()
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(thicket::util::time::parse_http_date)
    {
        if since >= now {
            return Ok(HttpResponse::NotModified().finish());
        }
    }

    let is_encrypted = repo.info.is_encrypted;
    let key = if is_encrypted {
        Some(data.keys.get_decrypt_key(&access.repo_id, &access.user).await?)
    } else {
        None
    };

    let mime = thicket::util::content_type::content_type_header(filename, &data.config.text_charset);
    let disposition = content_disposition::build(filename, query.wants_attachment(), helpers::is_firefox(&req));
    let is_head = req.method() == Method::HEAD;
    let supports_range = !is_encrypted;

    let mut builder = HttpResponse::Ok();
    builder
        .insert_header((header::CONTENT_TYPE, mime.clone()))
        .insert_header((header::CONTENT_DISPOSITION, disposition))
        .insert_header((header::LAST_MODIFIED, thicket::util::time::format_http_date(now)))
        .insert_header((header::CACHE_CONTROL, "max-age=3600"));
    if !mime.eq_ignore_ascii_case("image/jpeg") {
        builder.insert_header(("X-Content-Type-Options", "nosniff"));
    }
    if supports_range {
        builder.insert_header((header::ACCEPT_RANGES, "bytes"));
    }

    let range_header = req
        .headers()
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok());

    if let (true, Some(range_str)) = (supports_range, range_header) {
        let range = thicket::download::parse_range(range_str, file.file_size)?;
        builder
            .status(StatusCode::PARTIAL_CONTENT)
            .insert_header((
                header::CONTENT_RANGE,
                format!("bytes {}-{}/{}", range.start, range.end, file.file_size),
            ))
            .insert_header((header::CONTENT_LENGTH, range.len().to_string()));

        if is_head {
            return Ok(builder.finish());
        }
        let bytes = thicket::download::read_range(data.blocks.as_ref(), &repo.store_id, &file, range, None).await?;
        return Ok(builder.body(bytes));
    }

    builder.insert_header((header::CONTENT_LENGTH, file.file_size.to_string()));
    if is_head {
        return Ok(builder.finish());
    }

    let key_pair = key.as_ref().map(|k| (k.key.as_slice(), k.iv.as_slice()));
    let mut out = Vec::with_capacity(file.file_size as usize);
    thicket::download::read_whole_file(data.blocks.as_ref(), &repo.store_id, &file, key_pair, |chunk| {
        out.extend_from_slice(&chunk);
        Ok(())
    })
    .await?;

    Ok(builder.body(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_data::ServerConfig;
    use crate::oracles::{AlwaysUnderQuotaOracle, InMemoryKeyOracle, InMemoryTokenOracle, LoggingEventBus};
    use actix_web::{test, App};
    use std::sync::Arc;
    use thicket::model::{AccessToken, Commit, Dirent, EncryptionInfo, FileObject};
    use thicket::store::local::{LocalObjectStore, LocalRegistry};

    async fn build_data() -> (web::Data<AppData>, String) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalObjectStore::new(dir.path()));
        let registry = Arc::new(LocalRegistry::new());

        let data = b"hello, world!".to_vec();
        let block_id = thicket::model::object::sha1_hex(&data);
        store.write("repo1", &block_id, &data).await.unwrap();
        let file = FileObject::new(vec![block_id], data.len() as u64);
        let file_id = store.save_file("repo1", &file).await.unwrap();

        let root = thicket::model::Directory::new_sorted(vec![Dirent {
            name: "hello.txt".into(),
            id: file_id.clone(),
            mode: thicket::model::MODE_FILE,
            mtime: 0,
            size: data.len() as u64,
            modifier: "alice".into(),
        }]);
        let root_id = store.save_dir("repo1", &root).await.unwrap();
        let commit = Commit {
            commit_id: Commit::compute_id(&root_id, "alice", "Alice", "Created", 0),
            repo_id: "repo1".into(),
            root_id: root_id.clone(),
            parent_id: None,
            second_parent_id: None,
            creator_id: "alice".into(),
            creator_name: "Alice".into(),
            desc: "Created".into(),
            ctime: 0,
            repo_name: "repo1".into(),
            repo_desc: "".into(),
            encryption: EncryptionInfo::default(),
            new_merge: false,
            conflict: false,
        };
        store.save("repo1", &commit).await.unwrap();
        registry.create_repo("repo1", "repo1", &root_id, &commit);

        let tokens = InMemoryTokenOracle::new();
        tokens.insert(
            "tok1",
            AccessToken {
                repo_id: "repo1".into(),
                obj_id: file_id,
                op: Operation::View,
                username: "alice".into(),
            },
        );

        let app_data = AppData {
            blocks: store.clone(),
            fs: store.clone(),
            commits: store.clone(),
            registry: registry.clone(),
            tokens: Arc::new(tokens),
            keys: Arc::new(InMemoryKeyOracle::new()),
            quota: Arc::new(AlwaysUnderQuotaOracle),
            events: Arc::new(LoggingEventBus),
            size_worker: thicket::core::spawn_size_worker(registry.clone(), store.clone(), store.clone()),
            config: ServerConfig {
                abs_data_dir: dir.path().to_path_buf(),
                max_upload_size: None,
                text_charset: "utf-8".into(),
                cloud_mode: false,
            },
        };

        (web::Data::new(app_data), "tok1".to_string())
    }

    #[actix_web::test]
    async fn whole_file_download_returns_full_body() {
        let (data, token) = build_data().await;
        let app = test::init_service(
            App::new()
                .app_data(data)
                .route("/files/{token}/{filename}", web::get().to(show)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri(&format!("/files/{token}/hello.txt"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        assert_eq!(&body[..], b"hello, world!");
    }

    #[actix_web::test]
    async fn range_request_returns_partial_content() {
        let (data, token) = build_data().await;
        let app = test::init_service(
            App::new()
                .app_data(data)
                .route("/files/{token}/{filename}", web::get().to(show)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri(&format!("/files/{token}/hello.txt"))
            .insert_header((header::RANGE, "bytes=0-4"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        let body = test::read_body(resp).await;
        assert_eq!(&body[..], b"hello");
    }
}
