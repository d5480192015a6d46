mod config;
mod error;
mod inference;
mod routes;
mod storage;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use config::AppConfig;
use inference::model::Analyzer;
use routes::configure_routes;
use std::env;
use storage::upload::UploadSettings;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::other(format!("Configuration failed: {}", e))
    })?;

    // Present in the deployment environment but not consumed by any route.
    if config.mongodb_uri.is_some() {
        log::info!("MONGODB_URI is set but unused");
    }
    if config.secret_key.is_some() {
        log::info!("SECRET_KEY is set but unused");
    }

    std::fs::create_dir_all(&config.upload_dir)?;
    log::info!("Upload directory: {}", config.upload_dir.display());

    let analyzer = match Analyzer::load(&config) {
        Ok(analyzer) => analyzer,
        Err(e) => {
            log::error!("Failed to load models at startup: {}", e);
            return Err(std::io::Error::other(format!("Model loading failed: {}", e)));
        }
    };
    log::info!("Models loaded successfully");

    let analyzer = web::Data::new(analyzer);
    let uploads = web::Data::new(UploadSettings::from(&config));
    let bind_address = config.bind_address();

    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .app_data(analyzer.clone())
            .app_data(uploads.clone())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
