use axum::http::StatusCode;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn alive() -> StatusCode {
    StatusCode::OK
}
