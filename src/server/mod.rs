pub mod handlers;

use actix_cors::Cors;
use actix_web::{
    error::InternalError,
    http::{header, StatusCode},
    middleware, web, App, HttpResponse, HttpServer, ResponseError,
};
use serde_json::json;

use crate::{config::Config, error::GatewayError, gateway::Gateway};

/// JSON bodies above this size are rejected.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::ValidationError(_) => StatusCode::BAD_REQUEST,
            GatewayError::RateLimitError { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::UpstreamError(_)
            | GatewayError::StorageError(_)
            | GatewayError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut response = HttpResponse::build(self.status_code());
        match self {
            GatewayError::RateLimitError { retry_after_ms } => response
                .insert_header((
                    header::RETRY_AFTER,
                    retry_after_ms.div_ceil(1000).to_string(),
                ))
                .json(json!({
                    "error": "Rate limit exceeded",
                    "message": self.message(),
                    "retryAfter": retry_after_ms,
                })),
            _ => response.json(json!({
                "error": error_label(self),
                "message": self.message(),
            })),
        }
    }
}

fn error_label(err: &GatewayError) -> &'static str {
    match err {
        GatewayError::ValidationError(_) => "Invalid request",
        GatewayError::RateLimitError { .. } => "Rate limit exceeded",
        GatewayError::UpstreamError(_) => "Generation failed",
        GatewayError::StorageError(_) => "Storage error",
        GatewayError::ConfigError(_) => "Server misconfigured",
        GatewayError::NotFound(_) => "Image not found",
    }
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(MAX_BODY_BYTES)
        .error_handler(|err, _req| {
            let body = json!({ "error": "Invalid request", "message": err.to_string() });
            InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
        })
}

/// Registers every route on an app that already carries `web::Data<Gateway>`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(
            web::scope("/api")
                .route("/generate", web::post().to(handlers::generate))
                .route("/images", web::get().to(handlers::list_images))
                .route("/images/{filename}", web::get().to(handlers::get_image))
                .route("/models", web::get().to(handlers::list_models))
                .route("/health", web::get().to(handlers::health)),
        )
        .route("/uploads/{filename}", web::get().to(handlers::get_image));
}

/// Any origin, answered with `*`; preflights echo the requested method and headers.
fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .send_wildcard()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600)
}

pub async fn run(config: Config) -> std::io::Result<()> {
    let gateway = Gateway::from_config(&config)
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    if !gateway.storage().health_check().await.unwrap_or(false) {
        log::error!("❌ Content directory {} is not usable", config.uploads_dir.display());
        return Err(std::io::Error::other("content directory unavailable"));
    }

    let gateway = web::Data::new(gateway);
    let bind = (config.host.clone(), config.port_or_default());

    log::info!("✅ Gateway ready, listening on {}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .app_data(gateway.clone())
            .wrap(cors())
            .wrap(middleware::Logger::default())
            .configure(configure)
    })
    .bind(bind)?
    .run()
    .await
}
