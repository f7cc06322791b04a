use crate::models::ActivityEvent;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::{self, Sender};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

/// Fan-out point for catalog and content activity.
pub struct NotificationHub {
    sender: Sender<ActivityEvent>,
}

impl NotificationHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    pub fn sender(&self) -> Sender<ActivityEvent> {
        self.sender.clone()
    }

    pub fn subscribe(&self) -> BroadcastStream<ActivityEvent> {
        BroadcastStream::new(self.sender.subscribe())
    }

    /// Writes each event to the server log until the hub closes. Returns how
    /// many events were logged; lagged gaps are reported and skipped.
    pub async fn log_activity(mut activity: BroadcastStream<ActivityEvent>) -> usize {
        let mut logged = 0;
        while let Some(next) = activity.next().await {
            match next {
                Ok(event) => {
                    log_event(&event);
                    logged += 1;
                }
                Err(lagged) => warn!(%lagged, "activity log fell behind"),
            }
        }
        logged
    }

    /// Streams every event to an admin's socket as JSON until either side hangs up.
    pub async fn handle_socket(socket: WebSocket, sender: Sender<ActivityEvent>) {
        let (mut sender_ws, mut receiver) = socket.split();
        let mut receiver_stream = BroadcastStream::new(sender.subscribe());

        let mut send_task = tokio::spawn(async move {
            while let Some(next) = receiver_stream.next().await {
                let event = match next {
                    Ok(event) => event,
                    Err(lagged) => {
                        debug!(%lagged, "activity feed subscriber lagged");
                        continue;
                    }
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    if sender_ws.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
            }
        });

        let mut recv_task = tokio::spawn(async move {
            while let Some(Ok(message)) = receiver.next().await {
                if matches!(message, Message::Close(_)) {
                    break;
                }
            }
        });

        tokio::select! {
            _ = &mut send_task => recv_task.abort(),
            _ = &mut recv_task => send_task.abort(),
        }
    }
}

fn log_event(event: &ActivityEvent) {
    match event {
        ActivityEvent::ProductCreated(product) => {
            info!(id = %product.id, title = %product.title, "activity: product created")
        }
        ActivityEvent::ProductUpdated(product) => {
            info!(id = %product.id, title = %product.title, "activity: product updated")
        }
        ActivityEvent::ProductDeleted { id } => info!(%id, "activity: product deleted"),
        ActivityEvent::ReviewSubmitted(review) => info!(
            id = %review.id,
            product = %review.product_id,
            approved = review.is_approved,
            "activity: review added"
        ),
        ActivityEvent::ReviewModerated(review) => info!(
            id = %review.id,
            approved = review.is_approved,
            "activity: review moderated"
        ),
        ActivityEvent::ReviewDeleted { id, product_id } => {
            info!(%id, product = %product_id, "activity: review deleted")
        }
        ActivityEvent::RatingRecomputed {
            product_id,
            average_rating,
            review_count,
        } => info!(
            product = %product_id,
            average_rating,
            review_count,
            "activity: rating recomputed"
        ),
        ActivityEvent::ContentChanged { resource, id } => {
            info!(%resource, ?id, "activity: content changed")
        }
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::CmsResource;
    use tokio::sync::broadcast::error::TryRecvError;
    use uuid::Uuid;

    #[test]
    fn test_send_without_admins_connected() {
        let hub = NotificationHub::default();
        assert_eq!(hub.sender.receiver_count(), 0);
        // Services ignore this error; nobody listening is normal.
        assert!(hub
            .sender()
            .send(ActivityEvent::content_changed(CmsResource::Faq, None))
            .is_err());
    }

    #[tokio::test]
    async fn test_event_broadcasting() {
        let hub = NotificationHub::new();
        let sender = hub.sender();
        let mut receiver1 = sender.subscribe();
        let mut receiver2 = sender.subscribe();

        let id = Uuid::new_v4();
        sender.send(ActivityEvent::ProductDeleted { id }).unwrap();

        let timeout = tokio::time::Duration::from_secs(1);
        for receiver in [&mut receiver1, &mut receiver2] {
            let result = tokio::time::timeout(timeout, receiver.recv()).await;
            match result {
                Ok(Ok(ActivityEvent::ProductDeleted { id: received })) => assert_eq!(received, id),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let hub = NotificationHub::new();
        let mut stream = hub.subscribe();
        let sender = hub.sender();

        let product_id = Uuid::new_v4();
        let events = vec![
            ActivityEvent::RatingRecomputed {
                product_id,
                average_rating: 4.3,
                review_count: 4,
            },
            ActivityEvent::ReviewDeleted {
                id: Uuid::new_v4(),
                product_id,
            },
        ];
        for event in &events {
            sender.send(event.clone()).unwrap();
        }

        for expected in events {
            let received = tokio::time::timeout(tokio::time::Duration::from_secs(1), stream.next())
                .await
                .expect("stream timed out");
            assert_eq!(received.unwrap().unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_receiver_after_sender_dropped() {
        let hub = NotificationHub::new();
        let sender = hub.sender();
        let mut receiver = sender.subscribe();

        sender
            .send(ActivityEvent::ProductDeleted { id: Uuid::new_v4() })
            .unwrap();
        assert!(receiver.try_recv().is_ok());

        drop(sender);
        drop(hub);
        assert!(matches!(receiver.try_recv(), Err(TryRecvError::Closed)));
    }

    #[tokio::test]
    async fn test_activity_log_survives_lag() {
        let hub = NotificationHub::new();
        let activity = hub.subscribe();
        let sender = hub.sender();

        // Capacity is 100; the first 50 are overwritten before anyone reads.
        for _ in 0..150 {
            sender
                .send(ActivityEvent::ProductDeleted { id: Uuid::new_v4() })
                .unwrap();
        }
        drop(sender);
        drop(hub);

        let logged = tokio::time::timeout(
            tokio::time::Duration::from_secs(1),
            NotificationHub::log_activity(activity),
        )
        .await
        .expect("activity log did not finish");
        assert_eq!(logged, 100);
    }

    #[test]
    fn test_event_json_shape() {
        let product_id = Uuid::nil();
        let json = serde_json::to_value(ActivityEvent::RatingRecomputed {
            product_id,
            average_rating: 3.6,
            review_count: 5,
        })
        .unwrap();
        assert_eq!(json["type"], "ratingRecomputed");
        assert_eq!(json["averageRating"], 3.6);
        assert_eq!(json["reviewCount"], 5);
        assert_eq!(json["productId"], product_id.to_string());
    }
}
