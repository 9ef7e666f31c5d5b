// db/live.rs
//
// In-process push layer over the document store. Every committed write is
// published on a broadcast topic so open subscriptions receive the changed
// document without polling. Dropping a receiver releases the watch.
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::models::{
    chatmodel::ChatMessage, jobmodel::JobRecord, notificationmodel::Notification,
};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
pub struct LiveHub {
    // Single topic for all job documents; feed subscribers filter by
    // owner/worker/status on their side, so a job leaving a filtered view
    // (e.g. assigned jobs leaving the open feed) is still delivered.
    jobs_tx: broadcast::Sender<JobRecord>,
    notification_channels: RwLock<HashMap<Uuid, broadcast::Sender<Notification>>>,
    message_channels: RwLock<HashMap<Uuid, broadcast::Sender<ChatMessage>>>,
    // Creation events feeding the AI annotation dispatcher, exactly one
    // consumer.
    created_tx: mpsc::UnboundedSender<JobRecord>,
    created_rx: Mutex<Option<mpsc::UnboundedReceiver<JobRecord>>>,
}

impl LiveHub {
    pub fn new() -> Self {
        let (jobs_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (created_tx, created_rx) = mpsc::unbounded_channel();

        Self {
            jobs_tx,
            notification_channels: RwLock::new(HashMap::new()),
            message_channels: RwLock::new(HashMap::new()),
            created_tx,
            created_rx: Mutex::new(Some(created_rx)),
        }
    }

    /// Hand over the job-creation event queue. Returns `None` after the first
    /// call; the dispatcher is the single consumer.
    pub fn take_created_events(&self) -> Option<mpsc::UnboundedReceiver<JobRecord>> {
        self.created_rx.lock().unwrap().take()
    }

    pub fn publish_job(&self, record: &JobRecord) {
        // No subscribers is fine; the write already committed.
        let _ = self.jobs_tx.send(record.clone());
    }

    pub fn publish_job_created(&self, record: &JobRecord) {
        self.publish_job(record);
        if self.created_tx.send(record.clone()).is_err() {
            tracing::warn!(
                "annotation dispatcher is gone; job {} will not be analyzed",
                record.job.id
            );
        }
    }

    pub fn subscribe_jobs(&self) -> broadcast::Receiver<JobRecord> {
        self.jobs_tx.subscribe()
    }

    pub fn publish_notification(&self, notification: &Notification) {
        Self::publish_keyed(
            &self.notification_channels,
            notification.recipient_id,
            notification,
        );
    }

    pub fn subscribe_notifications(&self, recipient_id: Uuid) -> broadcast::Receiver<Notification> {
        Self::subscribe_keyed(&self.notification_channels, recipient_id)
    }

    pub fn publish_message(&self, message: &ChatMessage) {
        Self::publish_keyed(&self.message_channels, message.job_id, message);
    }

    pub fn subscribe_messages(&self, job_id: Uuid) -> broadcast::Receiver<ChatMessage> {
        Self::subscribe_keyed(&self.message_channels, job_id)
    }

    fn publish_keyed<T: Clone>(
        channels: &RwLock<HashMap<Uuid, broadcast::Sender<T>>>,
        key: Uuid,
        item: &T,
    ) {
        let stale = {
            let channels = channels.read().unwrap();
            match channels.get(&key) {
                Some(tx) if tx.receiver_count() > 0 => {
                    let _ = tx.send(item.clone());
                    false
                }
                Some(_) => true,
                None => false,
            }
        };

        // Drop channels nobody listens to anymore so the map does not grow
        // with every user/job ever published to.
        if stale {
            let mut channels = channels.write().unwrap();
            if let Some(tx) = channels.get(&key) {
                if tx.receiver_count() == 0 {
                    channels.remove(&key);
                }
            }
        }
    }

    fn subscribe_keyed<T: Clone>(
        channels: &RwLock<HashMap<Uuid, broadcast::Sender<T>>>,
        key: Uuid,
    ) -> broadcast::Receiver<T> {
        let mut channels = channels.write().unwrap();
        channels
            .entry(key)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }
}

impl Default for LiveHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::jobmodel::{Job, JobStatus};
    use chrono::Utc;

    fn record() -> JobRecord {
        JobRecord {
            job: Job {
                id: Uuid::new_v4(),
                owner_id: Uuid::new_v4(),
                owner_email: "client@example.com".to_string(),
                description: "washing machine leaks".to_string(),
                media_urls: vec!["https://cdn.example.com/leak.jpg".to_string()],
                status: JobStatus::Analyzing,
                ai_result: None,
                error_message: None,
                worker_id: None,
                accepted_price: None,
                accepted_at: None,
                created_at: Utc::now(),
            },
            proposals: vec![],
        }
    }

    fn notification(recipient_id: Uuid) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            recipient_id,
            kind: None,
            job_id: None,
            message: "hello".to_string(),
            read: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn job_subscribers_receive_published_records() {
        let hub = LiveHub::new();
        let mut rx = hub.subscribe_jobs();

        let record = record();
        hub.publish_job(&record);

        let delivered = rx.recv().await.unwrap();
        assert_eq!(delivered.job.id, record.job.id);
    }

    #[tokio::test]
    async fn created_events_reach_the_single_consumer() {
        let hub = LiveHub::new();
        let mut events = hub.take_created_events().unwrap();
        assert!(hub.take_created_events().is_none());

        let record = record();
        hub.publish_job_created(&record);

        let delivered = events.recv().await.unwrap();
        assert_eq!(delivered.job.id, record.job.id);
    }

    #[tokio::test]
    async fn notifications_are_scoped_to_their_recipient() {
        let hub = LiveHub::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let mut alice_rx = hub.subscribe_notifications(alice);
        let mut bob_rx = hub.subscribe_notifications(bob);

        hub.publish_notification(&notification(alice));

        assert_eq!(alice_rx.recv().await.unwrap().recipient_id, alice);
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_a_no_op() {
        let hub = LiveHub::new();
        hub.publish_notification(&notification(Uuid::new_v4()));
        hub.publish_job(&record());
    }

    #[tokio::test]
    async fn dropped_subscriptions_are_cleaned_up_on_publish() {
        let hub = LiveHub::new();
        let recipient = Uuid::new_v4();

        let rx = hub.subscribe_notifications(recipient);
        drop(rx);

        // First publish after the drop prunes the dead channel.
        hub.publish_notification(&notification(recipient));
        assert!(hub
            .notification_channels
            .read()
            .unwrap()
            .get(&recipient)
            .is_none());
    }
}
