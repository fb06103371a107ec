//! End-to-end pipeline tests over the in-memory stores: the producer
//! service enqueues, the queue hands out, and the handlers deliver.

use std::sync::Arc;

use notifyhub_core::clock::Clock;
use notifyhub_core::config::{QueuesConfig, RetryPolicy};
use notifyhub_entity::notification::{NotificationDraft, NotificationKind, NotificationPreference};
use notifyhub_queue::{names, JobQueue};
use notifyhub_service::{CreateNotification, NotificationService, SubscribePush};
use notifyhub_test_utils::{
    FixedClock, MemoryJobStore, MemoryNotificationStore, MemoryPreferenceStore,
    MemorySubscriptionStore, MemoryUserStore, MockEmailTransport, MockPushTransport,
};
use notifyhub_transport::TemplateRenderer;
use notifyhub_worker::jobs::{
    BatchIngestHandler, DigestBuildHandler, PushFanoutHandler, SendEmailHandler,
};
use notifyhub_worker::JobHandler;

struct Pipeline {
    service: NotificationService,
    queue: JobQueue,
    fanout: PushFanoutHandler,
    batch: BatchIngestHandler,
    digest: DigestBuildHandler,
    email: SendEmailHandler,
    users: Arc<MemoryUserStore>,
    preferences: Arc<MemoryPreferenceStore>,
    notifications: Arc<MemoryNotificationStore>,
    push: Arc<MockPushTransport>,
    mail: Arc<MockEmailTransport>,
    clock: Arc<FixedClock>,
}

fn pipeline() -> Pipeline {
    let users = Arc::new(MemoryUserStore::new());
    let preferences = Arc::new(MemoryPreferenceStore::new());
    let notifications = Arc::new(MemoryNotificationStore::new());
    let subscriptions = Arc::new(MemorySubscriptionStore::new());
    let jobs = Arc::new(MemoryJobStore::new());
    let clock = Arc::new(FixedClock::at("2026-03-02T12:00:00Z"));
    let queue = JobQueue::new(jobs, clock.clone());
    let push = Arc::new(MockPushTransport::new());
    let mail = Arc::new(MockEmailTransport::new());
    let retry = RetryPolicy {
        max_attempts: 3,
        backoff_base_secs: 2,
    };

    let service = NotificationService::new(
        users.clone(),
        preferences.clone(),
        notifications.clone(),
        subscriptions.clone(),
        queue.clone(),
        QueuesConfig::default(),
        clock.clone(),
    );
    let fanout = PushFanoutHandler::new(
        preferences.clone(),
        notifications.clone(),
        subscriptions.clone(),
        push.clone(),
        clock.clone(),
        4,
    );
    let batch = BatchIngestHandler::new(
        users.clone(),
        preferences.clone(),
        notifications.clone(),
        subscriptions.clone(),
        queue.clone(),
        retry,
        clock.clone(),
    );
    let digest = DigestBuildHandler::new(
        users.clone(),
        preferences.clone(),
        notifications.clone(),
        queue.clone(),
        retry,
        retry,
        clock.clone(),
    );
    let email = SendEmailHandler::new(
        mail.clone(),
        TemplateRenderer::new().unwrap(),
        clock.clone(),
    );

    Pipeline {
        service,
        queue,
        fanout,
        batch,
        digest,
        email,
        users,
        preferences,
        notifications,
        push,
        mail,
        clock,
    }
}

async fn subscribe(p: &Pipeline, user: uuid::Uuid, endpoint: &str) {
    p.service
        .subscribe_push(
            user,
            SubscribePush {
                endpoint: endpoint.to_string(),
                p256dh_key: "p256dh".to_string(),
                auth_key: "auth".to_string(),
                user_agent: None,
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn create_flows_through_fanout_to_the_push_endpoint() {
    let p = pipeline();
    let user = p.users.add("avery@example.com", "Avery");
    subscribe(&p, user, "https://push/avery").await;

    let draft = NotificationDraft::new(user, NotificationKind::Assignment, "Lab 3 graded", "92%");
    p.service
        .create_notification(CreateNotification::new(draft))
        .await
        .unwrap();

    let job = p
        .queue
        .claim(names::NOTIFICATION_DISPATCH, names::PUSH_FANOUT, "itest")
        .await
        .unwrap()
        .expect("fanout job eligible");
    let result = p.fanout.execute(&job).await.unwrap().unwrap();
    assert_eq!(result["delivered"], 1);

    assert_eq!(p.push.sent_endpoints(), vec!["https://push/avery"]);
    assert_eq!(p.push.sent()[0].1.title, "Lab 3 graded");
    let row = &p.notifications.all()[0];
    assert!(row.delivered);
}

#[tokio::test]
async fn batch_submission_persists_and_fans_out() {
    let p = pipeline();
    let user = p.users.add("avery@example.com", "Avery");
    subscribe(&p, user, "https://push/avery").await;

    let drafts = vec![
        NotificationDraft::new(user, NotificationKind::Course, "Week 5 posted", "New content"),
        NotificationDraft::new(user, NotificationKind::Course, "Quiz open", "Due Friday"),
    ];
    let receipt = p.service.create_batch(drafts, None).await.unwrap();
    assert_eq!(receipt.accepted, 2);

    // Default batching preference coalesces for 300 seconds.
    assert!(p
        .queue
        .claim(names::NOTIFICATION_DISPATCH, names::BATCH_INGEST, "itest")
        .await
        .unwrap()
        .is_none());
    p.clock.advance_secs(300);

    let ingest = p
        .queue
        .claim(names::NOTIFICATION_DISPATCH, names::BATCH_INGEST, "itest")
        .await
        .unwrap()
        .expect("ingest job eligible after the batching delay");
    let result = p.batch.execute(&ingest).await.unwrap().unwrap();
    assert_eq!(result["persisted"], 2);
    assert_eq!(result["fanout_jobs"], 1);

    let fanout = p
        .queue
        .claim(names::NOTIFICATION_DISPATCH, names::PUSH_FANOUT, "itest")
        .await
        .unwrap()
        .expect("fanout job enqueued by ingest");
    p.fanout.execute(&fanout).await.unwrap();

    let sent = p.push.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.title, "2 new notifications");
    assert!(p.notifications.all().iter().all(|n| n.delivered));
}

#[tokio::test]
async fn digest_build_emails_the_unread_summary() {
    let p = pipeline();
    let user = p.users.add("avery@example.com", "Avery");
    let mut prefs = NotificationPreference::default_for_user(user);
    prefs.digest_enabled = true;
    let chain = prefs.digest_chain_id;
    p.preferences.seed(prefs);

    let draft = NotificationDraft::new(user, NotificationKind::Discussion, "New reply", "Sam");
    p.service
        .create_notification(CreateNotification::new(draft))
        .await
        .unwrap();

    let digest_job = notifyhub_entity::job::model::Job {
        id: uuid::Uuid::new_v4(),
        queue: names::NOTIFICATION_DISPATCH.to_string(),
        job_type: names::DIGEST_BUILD.to_string(),
        payload: serde_json::json!({ "user_id": user, "chain_id": chain }),
        result: None,
        error_message: None,
        status: notifyhub_entity::job::JobStatus::Active,
        attempts: 1,
        max_attempts: 3,
        backoff_base_secs: 2,
        scheduled_at: p.clock.now(),
        started_at: Some(p.clock.now()),
        completed_at: None,
        worker_id: Some("itest".to_string()),
        created_at: p.clock.now(),
        updated_at: p.clock.now(),
    };
    let result = p.digest.execute(&digest_job).await.unwrap().unwrap();
    assert_eq!(result["emailed"], 1);

    let send = p
        .queue
        .claim(names::EMAIL_DISPATCH, names::SEND_EMAIL, "itest")
        .await
        .unwrap()
        .expect("send-email job enqueued by digest build");
    p.email.execute(&send).await.unwrap();

    let sent = p.mail.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "avery@example.com");
    assert_eq!(sent[0].subject, "Your daily digest");
    assert!(sent[0].body_html.contains("New reply"));
}

#[tokio::test]
async fn digest_settings_change_leaves_one_live_chain() {
    let p = pipeline();
    let user = p.users.add("avery@example.com", "Avery");

    let mut prefs = p.service.get_preferences(user).await.unwrap();
    prefs.digest_enabled = true;
    p.service.update_preferences(prefs).await.unwrap();
    let mut prefs = p.service.get_preferences(user).await.unwrap();
    prefs.digest_time = "09:00".to_string();
    p.service.update_preferences(prefs).await.unwrap();

    let draft = NotificationDraft::new(user, NotificationKind::Course, "Week 5 posted", "New");
    p.service
        .create_notification(CreateNotification::new(draft))
        .await
        .unwrap();

    // A day later both scheduled builds are due, but only the chain from
    // the latest settings may produce a digest.
    p.clock.advance_secs(24 * 3600);
    let mut built = 0;
    while let Some(job) = p
        .queue
        .claim(names::NOTIFICATION_DISPATCH, names::DIGEST_BUILD, "itest")
        .await
        .unwrap()
    {
        let result = p.digest.execute(&job).await.unwrap().unwrap();
        if result.get("skipped").is_none() {
            built += 1;
        }
    }
    assert_eq!(built, 1);

    p.queue
        .claim(names::EMAIL_DISPATCH, names::SEND_EMAIL, "itest")
        .await
        .unwrap()
        .expect("the live chain enqueued one digest email");
    assert!(p
        .queue
        .claim(names::EMAIL_DISPATCH, names::SEND_EMAIL, "itest")
        .await
        .unwrap()
        .is_none());
}
