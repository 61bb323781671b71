use salvo::{listener::TcpListener, Server};

use video_editor::{
    config::env_var,
    infra::{
        database::connection::{apply_schema, create_sqlx_pool},
        router, services,
    },
};

fn init_tracing() {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
    };

    if std::env::var("LOG_FORMAT").unwrap_or_default() == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter()).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter()).init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let env = env_var::get();

    let pool = create_sqlx_pool().await;
    apply_schema(&pool)
        .await
        .expect("Expect to apply the database schema");

    let address = format!("0.0.0.0:{}", env.port);
    tracing::info!(address = %address, "starting video editor api");

    let listener = TcpListener::bind(&address);
    Server::new(listener)
        .serve(router::app(services::from_env(pool, env)))
        .await;
}
