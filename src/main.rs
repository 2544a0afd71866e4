use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use videotube_api::config::Config;
use videotube_api::helpers::media::{DiskStorage, MediaStorage, S3Storage};
use videotube_api::helpers::tokens::SessionManager;
use videotube_api::routes::media::{serve as serve_media, MediaRoot};
use videotube_api::state::AppState;
use videotube_api::store::{MemoryStore, PgStore, Store};

fn startup_error(err: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load().map_err(startup_error)?;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => Arc::new(PgStore::connect(url, config.database_pool_size).map_err(startup_error)?),
        None => {
            warn!("DATABASE_URL not set, data is kept in memory and lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let media: Arc<dyn MediaStorage>;
    let mut local_media = None;
    match &config.s3 {
        Some(s3) => media = Arc::new(S3Storage::new(s3).map_err(startup_error)?),
        None => {
            std::fs::create_dir_all(&config.media_dir)?;
            media = Arc::new(DiskStorage::new(
                config.media_dir.clone(),
                config.media_public_url.clone(),
            ));
            local_media = Some(web::Data::new(MediaRoot(config.media_dir.clone())));
        }
    }

    std::fs::create_dir_all(&config.upload_dir)?;

    let state = web::Data::new(AppState {
        store,
        media,
        sessions: Arc::new(SessionManager::new(config.tokens.clone())),
        upload_dir: config.upload_dir.clone(),
    });

    let cors_origin = config.cors_origin.clone();

    info!("Listening on {}:{}", config.host, config.port);

    HttpServer::new(move || {
        let cors = match &cors_origin {
            Some(origin) => Cors::default()
                .allowed_origin(origin)
                .allow_any_method()
                .allow_any_header()
                .supports_credentials(),
            None => Cors::permissive(),
        };

        let mut app = App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .configure(videotube_api::configure(state.clone()));

        if let Some(root) = &local_media {
            app = app
                .app_data(root.clone())
                .route("/media/{path:.*}", web::get().to(serve_media));
        }

        app
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
