/// Delivery router
///
/// For each domain event:
/// 1. publish the live server events to every session holding the class topic
/// 2. per recipient, count a live delivery when one of their sessions holds
///    the topic; otherwise render the template and push to every stored
///    subscription, dropping subscriptions the provider reports as gone
/// 3. fall back to email when push reached nobody and an address is known
use crate::metrics;
use crate::models::{DeliveryChannel, DeliveryReport, EventDelivery, Recipient};
use crate::services::email::EmailChannel;
use crate::services::subscription_store::PushSubscriptionStore;
use crate::services::templates::NotificationGateway;
use crate::websocket::SessionHub;
use event_schema::PushPayload;
use push_delivery::PushDeliveryService;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct NotificationService {
    hub: Arc<SessionHub>,
    push: Arc<PushDeliveryService>,
    subscriptions: Arc<dyn PushSubscriptionStore>,
    email: Arc<dyn EmailChannel>,
}

impl NotificationService {
    pub fn new(
        hub: Arc<SessionHub>,
        push: Arc<PushDeliveryService>,
        subscriptions: Arc<dyn PushSubscriptionStore>,
        email: Arc<dyn EmailChannel>,
    ) -> Self {
        Self {
            hub,
            push,
            subscriptions,
            email,
        }
    }

    pub fn hub(&self) -> &Arc<SessionHub> {
        &self.hub
    }

    pub fn subscriptions(&self) -> &Arc<dyn PushSubscriptionStore> {
        &self.subscriptions
    }

    /// Route one domain event to live sessions and offline recipients
    pub async fn dispatch(&self, delivery: &EventDelivery) -> DeliveryReport {
        let event = &delivery.event;
        let mut report = DeliveryReport::default();

        let topics = event.live_topics();
        for live in &event.live_events() {
            report.live_frames += self.hub.publish_to(live, &topics);
        }

        let payload = event.template().map(|t| NotificationGateway::render(&t));
        let live_capable = event.has_live_counterpart();

        for recipient in &delivery.recipients {
            let channel = if live_capable
                && self.hub.is_user_subscribed_any(recipient.user_id, &topics)
            {
                DeliveryChannel::Live
            } else {
                match &payload {
                    Some(payload) => self.deliver_offline(recipient, payload).await,
                    None => DeliveryChannel::Skipped,
                }
            };
            debug!(user_id = %recipient.user_id, ?channel, "Recipient routed");
            report.record(channel);
        }

        info!(
            kind = event.kind(),
            class_id = %event.class_id(),
            live_frames = report.live_frames,
            live = report.live,
            push = report.push,
            email = report.email,
            failed = report.failed,
            "Domain event dispatched"
        );
        report
    }

    async fn deliver_offline(&self, recipient: &Recipient, payload: &PushPayload) -> DeliveryChannel {
        if self.deliver_push(recipient.user_id, payload).await {
            return DeliveryChannel::Push;
        }

        let Some(address) = &recipient.email else {
            warn!(user_id = %recipient.user_id, "Recipient unreachable: no push and no email");
            return DeliveryChannel::Failed;
        };

        match self.email.send(address, &payload.title, &payload.body).await {
            Ok(()) => {
                metrics::record_email("success");
                DeliveryChannel::Email
            }
            Err(e) => {
                metrics::record_email("failure");
                warn!(user_id = %recipient.user_id, "Email fallback failed: {}", e);
                DeliveryChannel::Failed
            }
        }
    }

    /// Push to all of a user's subscriptions; `true` if any accepted
    async fn deliver_push(&self, user_id: Uuid, payload: &PushPayload) -> bool {
        let subscriptions = self.subscriptions.for_user(user_id).await;
        if subscriptions.is_empty() {
            return false;
        }

        let results = self.push.send_to_multiple(&subscriptions, payload).await;

        let mut delivered = false;
        for result in results {
            if result.success {
                metrics::record_push("success");
                delivered = true;
            } else if result.should_invalidate {
                metrics::record_push("stale");
                self.subscriptions.remove(user_id, &result.endpoint).await;
                info!(%user_id, endpoint = %result.endpoint, "Removed stale push subscription");
            } else {
                metrics::record_push("failure");
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{AttendanceMarked, BookingChange, DomainEvent, PaymentReminderDue};
    use crate::services::email::MockEmailChannel;
    use crate::services::subscription_store::InMemorySubscriptionStore;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use event_schema::{
        AttendanceStatus, ControlMessage, PushSubscription, PushSubscriptionKeys, ServerFrame,
        Topic,
    };
    use futures::channel::mpsc;
    use futures::StreamExt;
    use push_delivery::{DeliveryError, PushProvider};

    /// Accepts every endpoint except those containing `gone` or `fail`
    struct EndpointProvider;

    #[async_trait]
    impl PushProvider for EndpointProvider {
        async fn deliver(
            &self,
            subscription: &PushSubscription,
            _payload: &PushPayload,
        ) -> Result<(), DeliveryError> {
            if subscription.endpoint.contains("gone") {
                Err(DeliveryError::Gone(subscription.endpoint.clone()))
            } else if subscription.endpoint.contains("fail") {
                Err(DeliveryError::Rejected {
                    status: 400,
                    body: "bad payload".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn subscription(endpoint: &str) -> PushSubscription {
        PushSubscription {
            endpoint: endpoint.to_string(),
            keys: PushSubscriptionKeys {
                p256dh: "p256dh".into(),
                auth: "auth".into(),
            },
            user_id: None,
        }
    }

    struct Fixture {
        hub: Arc<SessionHub>,
        store: Arc<InMemorySubscriptionStore>,
        service: NotificationService,
    }

    fn fixture(email: MockEmailChannel) -> Fixture {
        let hub = Arc::new(SessionHub::new());
        let store = Arc::new(InMemorySubscriptionStore::new());
        let push = Arc::new(PushDeliveryService::new("test-key").with_provider(Arc::new(EndpointProvider)));
        let service = NotificationService::new(hub.clone(), push, store.clone(), Arc::new(email));
        Fixture { hub, store, service }
    }

    fn booking(class_id: Uuid, recipients: Vec<Recipient>) -> EventDelivery {
        EventDelivery {
            event: DomainEvent::BookingCreated(BookingChange {
                class_id,
                class_name: "Spin 45".into(),
                participant_name: "Ana".into(),
                available_spots: 3,
                total_spots: 12,
                waitlist_count: None,
                organization_id: None,
            }),
            recipients,
        }
    }

    fn booking_in_org(class_id: Uuid, organization_id: Uuid, recipients: Vec<Recipient>) -> EventDelivery {
        let mut delivery = booking(class_id, recipients);
        if let DomainEvent::BookingCreated(change) = &mut delivery.event {
            change.organization_id = Some(organization_id);
        }
        delivery
    }

    fn recipient(user_id: Uuid, email: Option<&str>) -> Recipient {
        Recipient {
            user_id,
            email: email.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_subscribed_recipient_is_reached_live() {
        let mut email = MockEmailChannel::new();
        email.expect_send().times(0);
        let f = fixture(email);

        let class_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let (tx, _rx) = mpsc::unbounded();
        let session = f.hub.register(tx);
        f.hub.apply_control(session, &ControlMessage::Authenticate { user_id });
        f.hub.subscribe(session, Topic::class(class_id));
        f.store.save(user_id, subscription("https://push/ok")).await;

        let report = f
            .service
            .dispatch(&booking(class_id, vec![recipient(user_id, Some("a@example.com"))]))
            .await;

        assert_eq!(report.live, 1);
        assert_eq!(report.push, 0);
        // availability_update + booking_notification
        assert_eq!(report.live_frames, 2);
    }

    #[tokio::test]
    async fn test_organization_subscriber_is_reached_live() {
        let mut email = MockEmailChannel::new();
        email.expect_send().times(0);
        let f = fixture(email);

        let class_id = Uuid::new_v4();
        let org_id = Uuid::new_v4();
        let owner = Uuid::new_v4();

        // Studio dashboard: organization topic only
        let (tx_owner, mut rx_owner) = mpsc::unbounded();
        let dashboard = f.hub.register(tx_owner);
        f.hub.apply_control(dashboard, &ControlMessage::Authenticate { user_id: owner });
        f.hub.subscribe(dashboard, Topic::organization(org_id));

        // Holds both topics, still one frame per event
        let (tx_both, mut rx_both) = mpsc::unbounded();
        let both = f.hub.register(tx_both);
        f.hub.subscribe(both, Topic::organization(org_id));
        f.hub.subscribe(both, Topic::class(class_id));

        let report = f
            .service
            .dispatch(&booking_in_org(class_id, org_id, vec![recipient(owner, None)]))
            .await;

        assert_eq!(report.live, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(report.live_frames, 4);

        for rx in [&mut rx_owner, &mut rx_both] {
            let first = ServerFrame::from_json(&rx.next().await.unwrap()).unwrap();
            let second = ServerFrame::from_json(&rx.next().await.unwrap()).unwrap();
            assert_eq!(first.event.kind(), "availability_update");
            assert_eq!(second.event.kind(), "booking_notification");
            assert!(rx.try_next().is_err());
        }
    }

    #[tokio::test]
    async fn test_organization_topic_ignored_without_organization_id() {
        let mut email = MockEmailChannel::new();
        email.expect_send().times(0);
        let f = fixture(email);

        let (tx, mut rx) = mpsc::unbounded();
        let session = f.hub.register(tx);
        f.hub.subscribe(session, Topic::organization(Uuid::new_v4()));

        let report = f.service.dispatch(&booking(Uuid::new_v4(), vec![])).await;

        assert_eq!(report.live_frames, 0);
        assert!(rx.try_next().is_err());
    }

    #[tokio::test]
    async fn test_offline_recipient_gets_push() {
        let mut email = MockEmailChannel::new();
        email.expect_send().times(0);
        let f = fixture(email);

        let user_id = Uuid::new_v4();
        f.store.save(user_id, subscription("https://push/fail")).await;
        f.store.save(user_id, subscription("https://push/ok")).await;

        let report = f
            .service
            .dispatch(&booking(Uuid::new_v4(), vec![recipient(user_id, None)]))
            .await;

        assert_eq!(report.push, 1);
        assert_eq!(report.live_frames, 0);
        assert_eq!(f.store.for_user(user_id).await.len(), 2);
    }

    #[tokio::test]
    async fn test_stale_subscription_removed_then_email_fallback() {
        let mut email = MockEmailChannel::new();
        email
            .expect_send()
            .withf(|to, subject, body| {
                to == "ben@example.com" && subject == "New Booking" && body == "Ana booked Spin 45"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        let f = fixture(email);

        let user_id = Uuid::new_v4();
        f.store.save(user_id, subscription("https://push/gone")).await;

        let report = f
            .service
            .dispatch(&booking(
                Uuid::new_v4(),
                vec![recipient(user_id, Some("ben@example.com"))],
            ))
            .await;

        assert_eq!(report.email, 1);
        assert!(f.store.for_user(user_id).await.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_and_failed_email_count_as_failed() {
        let mut email = MockEmailChannel::new();
        email
            .expect_send()
            .times(1)
            .returning(|_, _, _| Err(AppError::Email("smtp down".into())));
        let f = fixture(email);

        let report = f
            .service
            .dispatch(&booking(
                Uuid::new_v4(),
                vec![
                    recipient(Uuid::new_v4(), None),
                    recipient(Uuid::new_v4(), Some("c@example.com")),
                ],
            ))
            .await;

        assert_eq!(report.failed, 2);
        assert_eq!(report.recipients(), 2);
    }

    #[tokio::test]
    async fn test_live_only_event_skips_offline_recipients() {
        let mut email = MockEmailChannel::new();
        email.expect_send().times(0);
        let f = fixture(email);

        let class_id = Uuid::new_v4();
        let (tx, _rx) = mpsc::unbounded();
        let session = f.hub.register(tx);
        f.hub.subscribe(session, Topic::class(class_id));

        let report = f
            .service
            .dispatch(&EventDelivery {
                event: DomainEvent::AttendanceMarked(AttendanceMarked {
                    class_id,
                    class_name: "Yoga".into(),
                    participant_name: "Ana".into(),
                    status: AttendanceStatus::Present,
                }),
                recipients: vec![recipient(Uuid::new_v4(), Some("d@example.com"))],
            })
            .await;

        assert_eq!(report.live_frames, 1);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_reminder_without_live_event_goes_to_push_even_when_connected() {
        let mut email = MockEmailChannel::new();
        email.expect_send().times(0);
        let f = fixture(email);

        let class_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let (tx, _rx) = mpsc::unbounded();
        let session = f.hub.register(tx);
        f.hub.authenticate(session, user_id);
        f.hub.subscribe(session, Topic::class(class_id));
        f.store.save(user_id, subscription("https://push/ok")).await;

        let report = f
            .service
            .dispatch(&EventDelivery {
                event: DomainEvent::PaymentReminderDue(PaymentReminderDue {
                    class_id,
                    class_name: "Boxing".into(),
                    amount: "$25.00".into(),
                    due_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                }),
                recipients: vec![recipient(user_id, None)],
            })
            .await;

        assert_eq!(report.push, 1);
        assert_eq!(report.live, 0);
    }
}
