use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use common::models::{ErrorResponse, NormalizedForecast, PingResponse};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::ping,
        handlers::get_forecast,
    ),
    components(schemas(
        NormalizedForecast,
        ErrorResponse,
        PingResponse,
    )),
    tags(
        (name = "forecast", description = "Current and historical weather by place name"),
    ),
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
