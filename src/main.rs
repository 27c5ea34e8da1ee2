use axum::{http::Method, Extension};
use campus_connect::{auth::ensure_jwt_secret_is_valid, bootstrap, connect_to_db, email};
use envconfig::Envconfig;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

#[derive(Envconfig)]
struct Config {
    #[envconfig(from = "DATABASE_URL")]
    pub db_url: String,
    #[envconfig(from = "PORT", default = "8080")]
    pub port: u16,
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::init_from_env().unwrap();
    ensure_jwt_secret_is_valid();
    if let Err(e) = email::sanity_check().await {
        tracing::warn!(error = %e, "email sanity check failed, outbound notifications will not work");
    };

    let pool = connect_to_db(&config.db_url);
    if let Err(e) = bootstrap::seed_root_admin(&pool).await {
        match e {
            campus_connect::error::AppError::InternalServerError(err) => {
                panic!("failed to seed root admin: {err}")
            }
            campus_connect::error::AppError::ResponseStatusError(code, msg) => {
                panic!("failed to seed root admin: {code} {msg}")
            }
        }
    }

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(Any);
    let app = campus_connect::app().layer(Extension(pool)).layer(cors);

    tracing::info!(port = config.port, "starting campus connect backend");
    axum::Server::bind(&([0, 0, 0, 0], config.port).into())
        .serve(app.into_make_service())
        .await
        .unwrap();
}
