use foodgram::api::{self, AppState};
use foodgram::config::Config;
use foodgram::storage::RecipeStorage;
use foodgram::user_storage::UserStorage;
use log::info;
use simple_logger::SimpleLogger;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
        .expect("Failed to initialize logger");

    let config = Config::load();
    std::fs::create_dir_all(&config.media_dir).expect("Failed to create media directory");

    let users = UserStorage::new(&config.data_dir).expect("Failed to initialize user storage");
    let recipes = RecipeStorage::new(&config.data_dir).expect("Failed to initialize recipe storage");

    let addr = config.addr.clone();
    let state = Arc::new(AppState {
        config,
        users,
        recipes,
    });

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {addr}: {e}"));

    info!("Foodgram API running on http://{addr}");
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
