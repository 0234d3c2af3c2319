use axum::{Extension, Json};

use tollgate_auth::UserRecord;

use crate::app::AppServices;
use crate::context::Owned;

pub async fn list_users(Extension(services): Extension<AppServices>) -> Json<Vec<UserRecord>> {
    Json(services.users.list())
}

pub async fn get_user(Extension(Owned(user)): Extension<Owned<UserRecord>>) -> Json<UserRecord> {
    Json(user)
}
