use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, http::header, web};
use neuroscan::config::AppConfig;
use neuroscan::routes::configure_routes;
use neuroscan::state::AppState;
use std::env;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    }

    let config = AppConfig::from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
    })?;

    let state = web::Data::new(AppState::initialize(&config));
    if !state.model_loaded() {
        log::warn!(
            "Serving without a classifier; /analyze will fail until {} is available",
            config.weights_path.display()
        );
    }
    if !state.assistant().is_available() {
        log::warn!("Chat assistant running in offline mode");
    }

    let bind_address = format!("{}:{}", config.host, config.port);
    let allowed_origins = config.allowed_origins.clone();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        let cors = allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
