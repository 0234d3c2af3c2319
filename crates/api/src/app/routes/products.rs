use axum::{Extension, Json};

use tollgate_infra::ProductRecord;

use crate::app::AppServices;
use crate::context::Owned;

pub async fn list_products(
    Extension(services): Extension<AppServices>,
) -> Json<Vec<ProductRecord>> {
    Json(services.products.list())
}

pub async fn get_product(
    Extension(Owned(product)): Extension<Owned<ProductRecord>>,
) -> Json<ProductRecord> {
    Json(product)
}
