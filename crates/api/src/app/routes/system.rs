use axum::Json;

use crate::app::dto::Liveness;

pub async fn liveness() -> Json<Liveness> {
    Json(Liveness {
        status: "up".to_string(),
    })
}
