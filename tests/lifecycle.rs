// End-to-end lifecycle tests against a throwaway Postgres database.
// They skip (and pass) when TEST_DATABASE_URL is not set.
mod common;

use std::time::Duration;

use common::*;
use serial_test::serial;

use fixmatch::{
    db::jobdb::JobExt,
    models::jobmodel::{AiAnalysis, JobStatus},
    service::error::ServiceError,
};

fn analysis() -> AiAnalysis {
    AiAnalysis {
        recommended_tools: vec!["multimeter".to_string(), "screwdriver".to_string()],
        estimated_price: "50 TND - 80 TND".to_string(),
        advice: "Unplug the unit before opening it.".to_string(),
    }
}

#[tokio::test]
#[serial]
async fn created_job_is_open_and_a_diagnosis_does_not_close_it() {
    let Some(app) = try_setup().await else { return };
    let owner = client(&app, "Sami").await;

    let record = app
        .jobs
        .create_job(
            &owner,
            "broken compressor".to_string(),
            vec![media("front.jpg"), media("back.jpg")],
        )
        .await
        .unwrap();

    assert_eq!(record.job.status, JobStatus::Analyzing);
    assert_eq!(record.job.media_urls.len(), 2);
    assert_eq!(record.job.owner_id, owner.id);
    assert!(record.proposals.is_empty());

    let open = app.jobs.list_open_jobs().await.unwrap();
    assert!(open.iter().any(|r| r.job.id == record.job.id));

    // The AI bridge attaches its diagnosis; the job stays in the open feed.
    let updated = app
        .db
        .record_analysis(record.job.id, &analysis())
        .await
        .unwrap()
        .expect("first write-back applies");

    assert_eq!(updated.job.status, JobStatus::Analyzing);
    assert_eq!(
        updated.job.ai_result.as_ref().unwrap().estimated_price,
        "50 TND - 80 TND"
    );

    let open = app.jobs.list_open_jobs().await.unwrap();
    assert!(open.iter().any(|r| r.job.id == record.job.id));

    // Write-back happens exactly once.
    assert!(app
        .db
        .record_analysis(record.job.id, &analysis())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
#[serial]
async fn upload_failure_never_persists_a_partial_job() {
    use async_trait::async_trait;
    use fixmatch::service::{
        job_service::JobService,
        notification_service::NotificationService,
        storage_service::{ObjectStore, StorageError},
    };
    use std::sync::Arc;

    struct FailingStore;

    #[async_trait]
    impl ObjectStore for FailingStore {
        async fn upload(
            &self,
            _path: &str,
            _bytes: Vec<u8>,
            _content_type: &str,
            file_name: &str,
        ) -> Result<String, StorageError> {
            Err(StorageError::Status {
                file: file_name.to_string(),
                status: 500,
            })
        }
    }

    let Some(app) = try_setup().await else { return };
    let owner = client(&app, "Sami").await;

    let jobs = JobService::new(
        app.db.clone(),
        Arc::new(FailingStore),
        Arc::new(NotificationService::new(app.db.clone())),
    );

    let err = jobs
        .create_job(&owner, "broken compressor".to_string(), vec![media("a.jpg")])
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Upload { ref file, .. } if file == "a.jpg"));
    assert!(app.jobs.list_jobs_for_owner(owner.id).await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn acceptance_locks_one_worker_and_notifies_them() {
    let Some(app) = try_setup().await else { return };
    let owner = client(&app, "Sami").await;
    let w1 = worker(&app, "Ahmed").await;
    let w2 = worker(&app, "Karim").await;

    let record = app
        .jobs
        .create_job(&owner, "broken compressor".to_string(), vec![media("a.jpg")])
        .await
        .unwrap();
    let job_id = record.job.id;

    app.jobs
        .submit_proposal(&w1, job_id, 60.0, None, None, None)
        .await
        .unwrap();
    app.jobs
        .submit_proposal(&w2, job_id, 55.0, Some("I have the parts".to_string()), None, None)
        .await
        .unwrap();

    let accepted = app.jobs.accept_proposal(&owner, job_id, w2.id).await.unwrap();

    assert_eq!(accepted.job.status, JobStatus::Assigned);
    assert_eq!(accepted.job.worker_id, Some(w2.id));
    assert_eq!(accepted.job.accepted_price, Some(55.0));
    assert!(accepted.job.accepted_at.is_some());

    // The losing proposal stays in place, inert.
    assert_eq!(accepted.proposals.len(), 2);

    // The chosen worker gains exactly one unread notification.
    assert_eq!(app.notifications.unread_count(&w2).await.unwrap(), 1);
    let inbox = app.notifications.list(&w2, None).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert!(!inbox[0].read);
    assert_eq!(inbox[0].job_id, Some(job_id));

    // A second acceptance is rejected.
    let err = app.jobs.accept_proposal(&owner, job_id, w1.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::AlreadyAssigned(_)));

    // And the job no longer takes proposals.
    let w3 = worker(&app, "Walid").await;
    let err = app
        .jobs
        .submit_proposal(&w3, job_id, 40.0, None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::JobNotOpen(_)));
}

#[tokio::test]
#[serial]
async fn only_the_owner_may_accept() {
    let Some(app) = try_setup().await else { return };
    let owner = client(&app, "Sami").await;
    let w1 = worker(&app, "Ahmed").await;

    let record = app
        .jobs
        .create_job(&owner, "door stuck".to_string(), vec![media("door.jpg")])
        .await
        .unwrap();

    app.jobs
        .submit_proposal(&w1, record.job.id, 30.0, None, None, None)
        .await
        .unwrap();

    let err = app
        .jobs
        .accept_proposal(&w1, record.job.id, w1.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Authorization(_)));
}

#[tokio::test]
#[serial]
async fn duplicate_proposal_is_rejected_and_the_ledger_is_unchanged() {
    let Some(app) = try_setup().await else { return };
    let owner = client(&app, "Sami").await;
    let w1 = worker(&app, "Ahmed").await;

    let record = app
        .jobs
        .create_job(&owner, "broken compressor".to_string(), vec![media("a.jpg")])
        .await
        .unwrap();

    app.jobs
        .submit_proposal(&w1, record.job.id, 60.0, None, None, None)
        .await
        .unwrap();

    let err = app
        .jobs
        .submit_proposal(&w1, record.job.id, 45.0, None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::DuplicateProposal { .. }));

    let record = app.jobs.get_job(record.job.id).await.unwrap();
    assert_eq!(record.proposals.len(), 1);
    assert_eq!(record.proposals[0].price, 60.0);
}

#[tokio::test]
#[serial]
async fn concurrent_submissions_from_one_worker_leave_one_proposal() {
    let Some(app) = try_setup().await else { return };
    let owner = client(&app, "Sami").await;
    let w1 = worker(&app, "Ahmed").await;

    let record = app
        .jobs
        .create_job(&owner, "broken compressor".to_string(), vec![media("a.jpg")])
        .await
        .unwrap();
    let job_id = record.job.id;

    let mut handles = Vec::new();
    for i in 0..5 {
        let jobs = app.jobs.clone();
        let auth = w1.clone();
        handles.push(tokio::spawn(async move {
            jobs.submit_proposal(&auth, job_id, 50.0 + i as f64, None, None, None)
                .await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            successes += 1;
        }
    }

    assert_eq!(successes, 1);
    let record = app.jobs.get_job(job_id).await.unwrap();
    assert_eq!(record.proposals.len(), 1);
}

#[tokio::test]
#[serial]
async fn racing_acceptances_have_exactly_one_winner() {
    let Some(app) = try_setup().await else { return };
    let owner = client(&app, "Sami").await;
    let w1 = worker(&app, "Ahmed").await;
    let w2 = worker(&app, "Karim").await;

    let record = app
        .jobs
        .create_job(&owner, "broken compressor".to_string(), vec![media("a.jpg")])
        .await
        .unwrap();
    let job_id = record.job.id;

    app.jobs
        .submit_proposal(&w1, job_id, 60.0, None, None, None)
        .await
        .unwrap();
    app.jobs
        .submit_proposal(&w2, job_id, 55.0, None, None, None)
        .await
        .unwrap();

    let first = {
        let jobs = app.jobs.clone();
        let auth = owner.clone();
        tokio::spawn(async move { jobs.accept_proposal(&auth, job_id, w1.id).await })
    };
    let second = {
        let jobs = app.jobs.clone();
        let auth = owner.clone();
        tokio::spawn(async move { jobs.accept_proposal(&auth, job_id, w2.id).await })
    };

    let results = vec![first.await.unwrap(), second.await.unwrap()];
    let winners: Vec<_> = results.iter().filter(|r| r.is_ok()).collect();
    assert_eq!(winners.len(), 1);

    for result in &results {
        if let Err(err) = result {
            assert!(matches!(err, ServiceError::AlreadyAssigned(_)));
        }
    }

    // The stored assignment matches the winning call.
    let record = app.jobs.get_job(job_id).await.unwrap();
    assert_eq!(record.job.status, JobStatus::Assigned);
    let winner = winners[0].as_ref().unwrap();
    assert_eq!(record.job.worker_id, winner.job.worker_id);
    assert_eq!(record.job.accepted_price, winner.job.accepted_price);
}

#[tokio::test]
#[serial]
async fn price_boundaries_are_enforced() {
    let Some(app) = try_setup().await else { return };
    let owner = client(&app, "Sami").await;
    let w1 = worker(&app, "Ahmed").await;

    let record = app
        .jobs
        .create_job(&owner, "broken compressor".to_string(), vec![media("a.jpg")])
        .await
        .unwrap();

    for price in [0.0, -5.0] {
        let err = app
            .jobs
            .submit_proposal(&w1, record.job.id, price, None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidPrice));
    }

    // Smallest positive unit is accepted.
    let updated = app
        .jobs
        .submit_proposal(&w1, record.job.id, 0.01, None, None, None)
        .await
        .unwrap();
    assert_eq!(updated.proposals[0].price, 0.01);
}

#[tokio::test]
#[serial]
async fn clients_cannot_submit_proposals() {
    let Some(app) = try_setup().await else { return };
    let owner = client(&app, "Sami").await;
    let other_client = client(&app, "Lina").await;

    let record = app
        .jobs
        .create_job(&owner, "broken compressor".to_string(), vec![media("a.jpg")])
        .await
        .unwrap();

    let err = app
        .jobs
        .submit_proposal(&other_client, record.job.id, 20.0, None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Authorization(_)));
}

#[tokio::test]
#[serial]
async fn failed_analysis_marks_the_job_but_keeps_the_ledger_open() {
    let Some(app) = try_setup().await else { return };
    let owner = client(&app, "Sami").await;
    let w1 = worker(&app, "Ahmed").await;

    let record = app
        .jobs
        .create_job(&owner, "strange noise".to_string(), vec![media("noise.jpg")])
        .await
        .unwrap();
    let job_id = record.job.id;

    let failed = app
        .db
        .record_analysis_failure(job_id, "media URL unreachable".to_string())
        .await
        .unwrap()
        .expect("failure marker applies");
    assert_eq!(failed.job.status, JobStatus::Error);
    assert_eq!(failed.job.error_message.as_deref(), Some("media URL unreachable"));
    assert!(failed.job.ai_result.is_none());

    // Error jobs leave the open browse feed but still take proposals and an
    // acceptance.
    let open = app.jobs.list_open_jobs().await.unwrap();
    assert!(!open.iter().any(|r| r.job.id == job_id));

    app.jobs
        .submit_proposal(&w1, job_id, 35.0, None, None, None)
        .await
        .unwrap();
    let accepted = app.jobs.accept_proposal(&owner, job_id, w1.id).await.unwrap();
    assert_eq!(accepted.job.status, JobStatus::Assigned);

    // The failure marker never overwrites an existing outcome.
    assert!(app
        .db
        .record_analysis_failure(job_id, "late".to_string())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
#[serial]
async fn chat_opens_on_assignment_and_tracks_read_receipts() {
    let Some(app) = try_setup().await else { return };
    let owner = client(&app, "Sami").await;
    let w1 = worker(&app, "Ahmed").await;
    let outsider = worker(&app, "Karim").await;

    let record = app
        .jobs
        .create_job(&owner, "broken compressor".to_string(), vec![media("a.jpg")])
        .await
        .unwrap();
    let job_id = record.job.id;

    app.jobs
        .submit_proposal(&w1, job_id, 60.0, None, None, None)
        .await
        .unwrap();

    // No chat before the acceptance transition.
    let err = app
        .chat
        .send_message(&owner, job_id, "hello".to_string(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ChatNotActive(_)));

    app.jobs.accept_proposal(&owner, job_id, w1.id).await.unwrap();

    let first = app
        .chat
        .send_message(&owner, job_id, "  When can you come?  ".to_string(), None)
        .await
        .unwrap();
    assert_eq!(first.sender_id, owner.id);
    assert_eq!(first.text, "When can you come?");
    assert!(!first.read);

    tokio::time::sleep(Duration::from_millis(10)).await;

    let reply = app
        .chat
        .send_message(&w1, job_id, "Tuesday morning".to_string(), Some(first.id))
        .await
        .unwrap();
    assert!(reply.text.starts_with("> Replying to Sami:"));
    assert!(reply.created_at > first.created_at);

    // Blank messages are rejected.
    let err = app
        .chat
        .send_message(&owner, job_id, "   ".to_string(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::EmptyMessage));

    // Non-participants can neither read nor write.
    let err = app
        .chat
        .send_message(&outsider, job_id, "me too".to_string(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Authorization(_)));
    assert!(app.chat.get_thread(&outsider, job_id).await.is_err());

    // Subscription replays the ordered thread.
    let (snapshot, _receiver) = app.chat.subscribe(&w1, job_id).await.unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].id, first.id);
    assert!(snapshot[0].created_at < snapshot[1].created_at);

    // The worker has one unread message (their own reply does not count).
    assert_eq!(app.chat.unread_count(&w1, job_id).await.unwrap(), 1);

    // Batched read flip, idempotent on repeat.
    assert_eq!(app.chat.mark_thread_read(&w1, job_id).await.unwrap(), 1);
    assert_eq!(app.chat.mark_thread_read(&w1, job_id).await.unwrap(), 0);
    assert_eq!(app.chat.unread_count(&w1, job_id).await.unwrap(), 0);

    let thread = app.chat.get_thread(&owner, job_id).await.unwrap();
    assert!(thread[0].read);
    assert!(!thread[1].read);
}

#[tokio::test]
#[serial]
async fn notification_reads_are_idempotent_and_recipient_only() {
    let Some(app) = try_setup().await else { return };
    let recipient = client(&app, "Sami").await;
    let stranger = client(&app, "Lina").await;

    let notification = app
        .notifications
        .notify(recipient.id, "Your offer has been accepted!".to_string(), None, None)
        .await
        .unwrap();
    assert!(!notification.read);
    assert_eq!(app.notifications.unread_count(&recipient).await.unwrap(), 1);

    let err = app
        .notifications
        .mark_read(&stranger, notification.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Authorization(_)));

    let once = app
        .notifications
        .mark_read(&recipient, notification.id)
        .await
        .unwrap();
    assert!(once.read);

    let twice = app
        .notifications
        .mark_read(&recipient, notification.id)
        .await
        .unwrap();
    assert!(twice.read);
    assert_eq!(app.notifications.unread_count(&recipient).await.unwrap(), 0);

    // mark_all_read is also idempotent.
    app.notifications
        .notify(recipient.id, "second".to_string(), None, None)
        .await
        .unwrap();
    assert_eq!(app.notifications.mark_all_read(&recipient).await.unwrap(), 1);
    assert_eq!(app.notifications.mark_all_read(&recipient).await.unwrap(), 0);
}

#[tokio::test]
#[serial]
async fn live_feeds_deliver_creation_proposal_and_chat_deltas() {
    let Some(app) = try_setup().await else { return };
    let owner = client(&app, "Sami").await;
    let w1 = worker(&app, "Ahmed").await;

    let mut job_feed = app.jobs.job_feed();

    let record = app
        .jobs
        .create_job(&owner, "broken compressor".to_string(), vec![media("a.jpg")])
        .await
        .unwrap();
    let job_id = record.job.id;

    let delta = job_feed.recv().await.unwrap();
    assert_eq!(delta.job.id, job_id);
    assert!(delta.proposals.is_empty());

    // A proposal re-publishes the job document with its grown ledger.
    app.jobs
        .submit_proposal(&w1, job_id, 60.0, None, None, None)
        .await
        .unwrap();
    let delta = job_feed.recv().await.unwrap();
    assert_eq!(delta.proposals.len(), 1);

    app.jobs.accept_proposal(&owner, job_id, w1.id).await.unwrap();
    let delta = job_feed.recv().await.unwrap();
    assert_eq!(delta.job.status, JobStatus::Assigned);

    // Chat subscription: snapshot first, then the live delta.
    let (snapshot, mut messages) = app.chat.subscribe(&owner, job_id).await.unwrap();
    assert!(snapshot.is_empty());

    app.chat
        .send_message(&w1, job_id, "On my way".to_string(), None)
        .await
        .unwrap();
    let message = messages.recv().await.unwrap();
    assert_eq!(message.text, "On my way");
    assert_eq!(message.sender_id, w1.id);
}
