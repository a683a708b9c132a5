use actix_web::{http::header, web, HttpRequest, HttpResponse};
use serde_json::json;

use crate::{
    error::GatewayError,
    gateway::Gateway,
    models::{GenerationRequest, HealthStatus, ImageListResponse, ModelListResponse},
    storage::content_type_for,
};

/// Rate-limit identity: the connecting peer's IP address.
fn caller_identity(req: &HttpRequest) -> String {
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn generate(
    req: HttpRequest,
    gateway: web::Data<Gateway>,
    body: web::Json<GenerationRequest>,
) -> Result<HttpResponse, GatewayError> {
    let identity = caller_identity(&req);
    let result = gateway.submit(&identity, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(result))
}

pub async fn list_images(gateway: web::Data<Gateway>) -> HttpResponse {
    match gateway.list().await {
        Ok(images) => HttpResponse::Ok().json(ImageListResponse { images }),
        Err(e) => {
            log::error!("Failed to list images: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "error": "Failed to fetch images",
                "message": e.message(),
            }))
        }
    }
}

pub async fn get_image(
    gateway: web::Data<Gateway>,
    filename: web::Path<String>,
) -> Result<HttpResponse, GatewayError> {
    let filename = filename.into_inner();
    let bytes = gateway.read_image(&filename).await?;
    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, content_type_for(&filename)))
        .body(bytes))
}

pub async fn list_models(gateway: web::Data<Gateway>) -> HttpResponse {
    HttpResponse::Ok().json(ModelListResponse {
        models: gateway.models(),
    })
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthStatus::ok())
}
