use axum::{
    routing::{delete, get, post, put},
    Router,
};
use anyhow::Context;
use dotenvy as dotenv;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod auth;
mod config;
mod db;
mod email;
mod error;
mod funding;
mod gateway;

use config::Config;
use db::{AdminService, ContactService, NotificationService, ProjectService, UserService};
use email::Mailer;
use funding::FundingManager;
use gateway::PaymentGateway;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // trying multiple .env locations since working directory differs between dev and prod
    let _ = dotenv::from_filename_override(".env");
    let _ = dotenv::from_filename_override(concat!(env!("CARGO_MANIFEST_DIR"), "/.env"));
    let _ = dotenv::dotenv_override();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,funding_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Funding Backend");

    tracing::info!("Loading configuration from environment");
    let config = Arc::new(Config::from_env().context("error with configuration")?);
    tracing::info!("Configuration loaded successfully");

    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected successfully");

    let users = Arc::new(UserService::new(db_pool.clone()));
    let projects = Arc::new(ProjectService::new(
        db_pool.clone(),
        config.job_creation_rate,
        config.campaign_duration_days,
    ));
    let notifications = Arc::new(NotificationService::new(db_pool.clone()));
    let contact = Arc::new(ContactService::new(db_pool.clone()));
    let admin = Arc::new(AdminService::new(db_pool.clone(), config.job_creation_rate));
    let mailer = Arc::new(Mailer::new(&config));

    let payment_gateway = PaymentGateway::new(&config);
    let funding = Arc::new(FundingManager::new(
        db_pool.clone(),
        payment_gateway,
        notifications.clone(),
        mailer.clone(),
        config.job_creation_rate,
        config.min_backing_amount,
    ));

    let app_state = Arc::new(AppState {
        config: config.clone(),
        db_pool: db_pool.clone(),
        users,
        projects,
        notifications,
        contact,
        admin,
        funding,
        mailer,
    });

    let app = Router::new()
        .route("/health", get(api::health::health_check))

        .route("/api/v1/auth/register", post(api::auth::register))
        .route("/api/v1/auth/login", post(api::auth::login))
        .route("/api/v1/auth/refresh", post(api::auth::refresh))
        .route("/api/v1/auth/me", get(api::auth::me))

        .route("/api/v1/projects", post(api::projects::create_project))
        .route("/api/v1/projects", get(api::projects::list_projects))
        .route("/api/v1/projects/my", get(api::projects::my_projects))
        .route("/api/v1/projects/slug/:slug", get(api::projects::get_project_by_slug))
        .route("/api/v1/projects/:id", get(api::projects::get_project))
        .route("/api/v1/projects/:id", put(api::projects::update_project))
        .route("/api/v1/projects/:id", delete(api::projects::delete_project))
        .route("/api/v1/projects/:id/launch", post(api::projects::launch_project))
        .route("/api/v1/projects/:id/transactions", get(api::transactions::project_transactions))

        .route("/api/v1/transactions", post(api::transactions::initiate_payment))
        .route("/api/v1/transactions/my", get(api::transactions::my_transactions))
        .route("/api/v1/transactions/webhook/momo", post(api::transactions::momo_webhook))

        .route("/api/v1/notifications", get(api::notifications::list_notifications))
        .route("/api/v1/notifications/:id/read", post(api::notifications::mark_notification_read))
        .route("/api/v1/notifications/:id", delete(api::notifications::delete_notification))

        .route("/api/v1/contact", post(api::contact::create_contact_message))
        .route("/api/v1/contact", get(api::contact::list_contact_messages))
        .route("/api/v1/contact/:id/read", post(api::contact::mark_contact_message_read))

        .route("/api/v1/content/success-stories", get(api::content::success_stories))

        .route("/api/v1/admin/stats", get(api::admin::platform_stats))
        .route("/api/v1/admin/projects", get(api::admin::list_all_projects))
        .route("/api/v1/admin/transactions", get(api::admin::list_all_transactions))
        .route("/api/v1/admin/users", get(api::admin::list_all_users))

        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // in case the configured port is taken, try a few more before giving up
    let mut port = config.port;
    let mut listener = None;

    for _ in 0..10u16 {
        let addr = format!("{}:{}", config.host, port);
        match tokio::net::TcpListener::bind(&addr).await {
            Ok(l) => {
                listener = Some((addr, l));
                break;
            }
            Err(e) => {
                tracing::warn!("Failed to bind to {}: {} (trying next port)", addr, e);
                port = port.saturating_add(1);
            }
        }
    }

    let (addr, listener) = listener.ok_or_else(|| anyhow::anyhow!(
        "Failed to bind to any port in range {}..{}",
        config.port,
        config.port.saturating_add(9)
    ))?;

    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db_pool: sqlx::PgPool,
    pub users: Arc<UserService>,
    pub projects: Arc<ProjectService>,
    pub notifications: Arc<NotificationService>,
    pub contact: Arc<ContactService>,
    pub admin: Arc<AdminService>,
    pub funding: Arc<FundingManager>,
    pub mailer: Arc<Mailer>,
}
