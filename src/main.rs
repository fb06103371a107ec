//! NotifyHub server — notification delivery pipeline.
//!
//! Wires the Postgres repositories, transports, job queue, worker runner,
//! and recurring scheduler together and runs them until shutdown.

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use notifyhub_core::clock::{Clock, SystemClock};
use notifyhub_core::config::AppConfig;
use notifyhub_core::error::AppError;
use notifyhub_database::repositories::{
    JobRepository, NotificationRepository, PreferenceRepository, SubscriptionRepository,
    UserRepository,
};
use notifyhub_database::{connection, migration};
use notifyhub_queue::{names, JobQueue};
use notifyhub_transport::{SmtpMailer, TemplateRenderer, WebPushClient};
use notifyhub_worker::jobs::{
    BatchIngestHandler, DigestBuildHandler, PushFanoutHandler, SendEmailHandler,
    SweepArchivedHandler,
};
use notifyhub_worker::{
    JobExecutor, Lane, RecurringScheduler, RecurringTask, Schedule, WorkerRunner,
};

#[tokio::main]
async fn main() {
    let env = std::env::var("NOTIFYHUB_ENV").unwrap_or_else(|_| "default".to_string());
    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    if config.logging.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting NotifyHub server");

    let pool = connection::create_pool(&config.database).await?;
    migration::run_migrations(&pool).await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let users = Arc::new(UserRepository::new(pool.clone()));
    let preferences = Arc::new(PreferenceRepository::new(pool.clone()));
    let notifications = Arc::new(NotificationRepository::new(pool.clone()));
    let subscriptions = Arc::new(SubscriptionRepository::new(pool.clone()));
    let jobs = Arc::new(JobRepository::new(pool.clone()));
    let queue = JobQueue::new(jobs, Arc::clone(&clock));

    let push = Arc::new(WebPushClient::new(&config.push)?);
    let mailer = Arc::new(SmtpMailer::new(&config.email)?);

    let mut executor = JobExecutor::new();
    executor.register(Arc::new(PushFanoutHandler::new(
        preferences.clone(),
        notifications.clone(),
        subscriptions.clone(),
        push,
        Arc::clone(&clock),
        config.push.fanout_concurrency,
    )));
    executor.register(Arc::new(BatchIngestHandler::new(
        users.clone(),
        preferences.clone(),
        notifications.clone(),
        subscriptions.clone(),
        queue.clone(),
        config.queues.push_fanout.retry,
        Arc::clone(&clock),
    )));
    executor.register(Arc::new(SendEmailHandler::new(
        mailer,
        TemplateRenderer::new()?,
        Arc::clone(&clock),
    )));
    executor.register(Arc::new(DigestBuildHandler::new(
        users,
        preferences,
        notifications.clone(),
        queue.clone(),
        config.queues.send_email.retry,
        config.queues.digest_build.retry,
        Arc::clone(&clock),
    )));
    executor.register(Arc::new(SweepArchivedHandler::new(
        notifications,
        Arc::clone(&clock),
    )));
    let executor = Arc::new(executor);

    let lanes = vec![
        Lane::new(
            names::NOTIFICATION_DISPATCH,
            names::PUSH_FANOUT,
            config.queues.push_fanout.concurrency,
        ),
        Lane::new(
            names::NOTIFICATION_DISPATCH,
            names::BATCH_INGEST,
            config.queues.batch_ingest.concurrency,
        ),
        Lane::new(
            names::NOTIFICATION_DISPATCH,
            names::DIGEST_BUILD,
            config.queues.digest_build.concurrency,
        ),
        Lane::new(
            names::EMAIL_DISPATCH,
            names::SEND_EMAIL,
            config.queues.send_email.concurrency,
        ),
        Lane::new(
            names::CLEANUP,
            names::SWEEP_ARCHIVED,
            config.queues.sweep_archived.concurrency,
        ),
    ];

    let worker_id = format!(
        "{}-{}",
        hostname().unwrap_or_else(|| "notifyhub".to_string()),
        std::process::id()
    );
    let runner = WorkerRunner::new(
        queue.clone(),
        executor,
        config.worker.clone(),
        worker_id,
        lanes,
    );

    let scheduler = RecurringScheduler::new(
        queue,
        Arc::clone(&clock),
        vec![RecurringTask {
            name: "sweep-archived".to_string(),
            schedule: Schedule::Daily { hour: 2, minute: 0 },
            queue: names::CLEANUP.to_string(),
            job_type: names::SWEEP_ARCHIVED.to_string(),
            payload: serde_json::json!({
                "max_age_days": config.retention.archived_max_age_days,
            }),
            retry: config.queues.sweep_archived.retry,
        }],
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    if config.worker.enabled {
        tokio::join!(runner.run(shutdown_rx.clone()), scheduler.run(shutdown_rx));
    } else {
        tracing::warn!("Workers disabled by configuration, running scheduler only");
        scheduler.run(shutdown_rx).await;
    }

    tracing::info!("NotifyHub server stopped");
    Ok(())
}

fn hostname() -> Option<String> {
    std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty())
}
