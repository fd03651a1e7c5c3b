pub mod app_data;
pub mod content_disposition;
pub mod controllers;
pub mod errors;
pub mod helpers;
pub mod oracles;
pub mod params;
pub mod routes;

use actix_web::middleware::Logger;
use actix_web::{web, App, HttpResponse, HttpServer};
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use app_data::{AppData, ServerConfig};
use oracles::{AlwaysUnderQuotaOracle, InMemoryKeyOracle, InMemoryTokenOracle, LoggingEventBus};
use thicket::store::local::{LocalObjectStore, LocalRegistry};

#[derive(Parser, Debug)]
#[command(name = "thicket-server", version = thicket::constants::THICKET_VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP data-plane server.
    Start {
        #[arg(long, short = 'i', default_value = "0.0.0.0")]
        ip: String,
        #[arg(long, short = 'p', default_value_t = 3000)]
        port: u16,
        /// Root directory for object storage and resumable-upload temp files.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
        /// Absent means unlimited.
        #[arg(long)]
        max_upload_size: Option<u64>,
        #[arg(long, default_value = thicket::constants::DEFAULT_TEXT_CHARSET)]
        text_charset: String,
        #[arg(long)]
        cloud_mode: bool,
    },
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}: {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let cli = Cli::parse();
    let Command::Start {
        ip,
        port,
        data_dir,
        max_upload_size,
        text_charset,
        cloud_mode,
    } = cli.command;

    log::info!("thicket-server v{}", thicket::constants::THICKET_VERSION);
    log::info!("data directory: {data_dir:?}");

    let store = Arc::new(LocalObjectStore::new(&data_dir));
    let registry = Arc::new(LocalRegistry::new());
    let size_worker = thicket::core::spawn_size_worker(registry.clone(), store.clone(), store.clone());

    // No pack example wires a real token/key/quota/event client, and the
    // wire protocol to those services is out of scope here — these
    // in-memory stand-ins let the binary run standalone, the same way a
    // missing Redis connection falls back to an in-memory task queue.
    let data = web::Data::new(AppData {
        blocks: store.clone(),
        fs: store.clone(),
        commits: store.clone(),
        registry: registry.clone(),
        tokens: Arc::new(InMemoryTokenOracle::new()),
        keys: Arc::new(InMemoryKeyOracle::new()),
        quota: Arc::new(AlwaysUnderQuotaOracle),
        events: Arc::new(LoggingEventBus),
        size_worker,
        config: ServerConfig {
            abs_data_dir: data_dir,
            max_upload_size,
            text_charset,
            cloud_mode,
        },
    });

    log::info!("listening on {ip}:{port}");

    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .configure(routes::config)
            .default_service(web::route().to(not_found))
            .wrap(Logger::default())
    })
    .bind((ip.as_str(), port))?
    .run()
    .await
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().finish()
}
