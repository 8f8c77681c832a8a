use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use staypay::config::{AppConfig, Config};
use staypay::middleware::RequestId;
use staypay::modules::bookings::{BookingRepository, MySqlBookingRepository};
use staypay::modules::gateways::{ChapaClient, PaymentGateway};
use staypay::modules::notifications::services::notifier_from_config;
use staypay::modules::payments::controllers::WebhookSecret;
use staypay::modules::payments::repositories::{MySqlPaymentRepository, PaymentRepository};
use staypay::modules::payments::services::{PaymentService, PaymentSettings};
use staypay::modules::tasks::{
    ChannelTaskQueue, SweepScheduler, TaskExecutor, TaskQueue, TaskRunner,
};

fn init_tracing(app: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("staypay={},actix_web=info", app.log_level).into());

    let registry = tracing_subscriber::registry().with(filter);

    if app.log_format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(&config.app);
    config.validate().context("Configuration validation failed")?;

    tracing::info!(env = %config.app.env, bind = %config.server.bind_address(), "Starting StayPay");

    let db_pool = config
        .database
        .create_pool()
        .await
        .context("Failed to create database pool")?;

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!(
        max_connections = config.database.max_connections,
        "Database pool initialized"
    );

    let payment_repo: Arc<dyn PaymentRepository> =
        Arc::new(MySqlPaymentRepository::new(db_pool.clone()));
    let booking_repo: Arc<dyn BookingRepository> =
        Arc::new(MySqlBookingRepository::new(db_pool.clone()));
    let gateway: Arc<dyn PaymentGateway> = Arc::new(ChapaClient::from_config(&config.chapa)?);
    let notifier = notifier_from_config(&config.mail)?;

    let (queue, receiver) = ChannelTaskQueue::new(config.tasks.queue_size);
    let queue: Arc<dyn TaskQueue> = Arc::new(queue);

    let payment_service = Arc::new(PaymentService::new(
        payment_repo,
        gateway,
        Arc::clone(&queue),
        PaymentSettings::from_config(&config),
    ));

    let executor = Arc::new(TaskExecutor::new(
        Arc::clone(&payment_service),
        Arc::clone(&booking_repo),
        notifier,
        config.tasks.reverify_schedule(),
        config.app.payment_expiry(),
    ));

    let shutdown = CancellationToken::new();
    let workers = TaskRunner::new(executor, config.tasks.worker_count, shutdown.clone())
        .spawn(receiver);
    let scheduler = Arc::new(SweepScheduler::new(
        Arc::clone(&queue),
        config.tasks.sweep_interval(),
        shutdown.clone(),
    ));
    let scheduler_handle = tokio::spawn(scheduler.start());

    let service_data = web::Data::new(payment_service);
    let booking_data = web::Data::new(booking_repo);
    let webhook_secret = web::Data::new(WebhookSecret(config.chapa.webhook_secret.clone()));
    let pool_data = web::Data::new(db_pool.clone());

    let bind_address = config.server.bind_address();
    let server = HttpServer::new(move || {
        App::new()
            .wrap(RequestId)
            .wrap(TracingLogger::default())
            .app_data(service_data.clone())
            .app_data(booking_data.clone())
            .app_data(webhook_secret.clone())
            .app_data(pool_data.clone())
            .configure(staypay::configure)
    })
    .workers(config.server.workers)
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run();

    tracing::info!("Server started at http://{}", bind_address);
    server.await.context("HTTP server failed")?;

    tracing::info!("Shutting down background workers");
    shutdown.cancel();
    for worker in workers {
        if let Err(e) = worker.await {
            tracing::warn!(error = %e, "Task worker ended abnormally");
        }
    }
    if let Err(e) = scheduler_handle.await {
        tracing::warn!(error = %e, "Sweep scheduler ended abnormally");
    }
    db_pool.close().await;

    Ok(())
}
