use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;

mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod pages;
mod routers;
mod services;
mod utils;

use config::Config;
use db::{PgChatHistory, PgDocumentIndex, PgUserStore};
use handlers::AppContext;
use services::agent_gateway::{AgentBackend, AgentGateway};
use services::auth_service::{AuthService, UserStore};
use services::chat_service::{ChatHistoryStore, ChatService};
use services::document_service::{DocumentIndex, DocumentService};
use services::object_store::{ObjectStore, S3ObjectStore};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cfg = Config::from_env()?;

    let pool = db::init_pool(&cfg.database_url).await?;
    sqlx::query("SELECT 1")
        .fetch_one(&pool)
        .await
        .context("database connectivity check failed")?;
    db::ensure_schema(&pool).await?;
    info!("Database OK.");

    let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool.clone()));
    let documents_index: Arc<dyn DocumentIndex> = Arc::new(PgDocumentIndex::new(pool.clone()));
    let chat_history: Arc<dyn ChatHistoryStore> = Arc::new(PgChatHistory::new(pool.clone()));
    let objects: Arc<dyn ObjectStore> =
        Arc::new(S3ObjectStore::new(&cfg).context("object store setup failed")?);
    let agent: Arc<dyn AgentBackend> = Arc::new(AgentGateway::new(&cfg));

    let ctx = AppContext {
        auth: Arc::new(AuthService::new(users, cfg.secret_key.clone())),
        chat: Arc::new(ChatService::new(chat_history, agent)),
        documents: Arc::new(DocumentService::new(objects, documents_index)),
    };

    let addr: SocketAddr = cfg
        .bind_addr
        .parse()
        .with_context(|| format!("invalid bind address {}", cfg.bind_addr))?;

    info!("Listening on http://{}", addr);
    warp::serve(routers::make_routes(ctx)).run(addr).await;

    Ok(())
}
