use actix_cors::Cors;
use actix_web::{web, App, HttpServer, middleware};
use score_service::config::Settings;
use score_service::core::Scorer;
use score_service::routes::{self, score::AppState};
use std::sync::Arc;
use tracing::{info, error};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    init_logging();

    info!("Starting score service...");

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Configuration loaded successfully");

    // No request is accepted unless the model and all channels are ready
    let scorer = match Scorer::init(&settings) {
        Ok(scorer) => Arc::new(scorer),
        Err(e) => {
            error!("Initialization failed: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Model {} ready ({} features, prediction column {})",
        scorer.model().name(),
        scorer.model().feature_names().len(),
        scorer.prediction_column()
    );

    let app_state = AppState { scorer };

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);
    let max_payload = settings.server.max_payload_bytes;

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::PayloadConfig::new(max_payload))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
