use axum::Router;

pub async fn create_test_app() -> Router {
    std::env::set_var("DATABASE_URL", "");
    std::env::remove_var("REDIS_URL");
    std::env::remove_var("SEARCH_URL");

    pinglun_backend_rust::create_app().await
}
