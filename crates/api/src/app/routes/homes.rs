use axum::{Extension, Json};

use tollgate_infra::HomeRecord;

use crate::app::AppServices;
use crate::context::Owned;

pub async fn list_homes(Extension(services): Extension<AppServices>) -> Json<Vec<HomeRecord>> {
    Json(services.homes.list())
}

pub async fn get_home(Extension(Owned(home)): Extension<Owned<HomeRecord>>) -> Json<HomeRecord> {
    Json(home)
}
