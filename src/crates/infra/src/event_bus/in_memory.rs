use async_trait::async_trait;
use dashmap::DashMap;
use domain::event::{NotifyError, PartyEvent, PartyNotification, PartyNotifier};
use domain::value::PartyCode;
use std::sync::Arc;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

/// In-memory notification fan-out, one broadcast channel per party code.
///
/// Delivery is lossy and at most once: slow subscribers drop messages, a
/// publish with no subscribers goes nowhere, and neither case is an error.
/// A `PartyEnded` event tears the party's channel down after delivery.
#[derive(Clone, Default)]
pub struct InMemoryPartyNotifier {
    channels: Arc<DashMap<PartyCode, broadcast::Sender<PartyNotification>>>,
}

impl InMemoryPartyNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a client to one party's event stream.
    pub fn subscribe(&self, code: &PartyCode) -> broadcast::Receiver<PartyNotification> {
        self.channels
            .entry(code.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }
}

#[async_trait]
impl PartyNotifier for InMemoryPartyNotifier {
    async fn publish(&self, notification: PartyNotification) -> Result<(), NotifyError> {
        let ended = notification.event == PartyEvent::PartyEnded;
        let code = notification.code.clone();
        if let Some(sender) = self.channels.get(&code) {
            // A send error just means nobody is listening right now
            if sender.send(notification).is_err() {
                log::debug!("party {}: event published with no subscribers", code);
            }
        }
        if ended {
            self.channels.remove(&code);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::value::GoerId;

    #[tokio::test]
    async fn subscribers_receive_their_partys_events() {
        let notifier = InMemoryPartyNotifier::new();
        let code = PartyCode::from("AB12");
        let mut receiver = notifier.subscribe(&code);
        let mut other = notifier.subscribe(&PartyCode::from("ZZ99"));

        notifier
            .publish(PartyNotification::new(
                code.clone(),
                PartyEvent::ListenerJoined {
                    goer: GoerId::from("alice"),
                },
            ))
            .await
            .unwrap();

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.code, code);
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_fine() {
        let notifier = InMemoryPartyNotifier::new();
        notifier
            .publish(PartyNotification::new(
                PartyCode::from("AB12"),
                PartyEvent::QueueUpdated,
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn party_ended_tears_the_channel_down() {
        let notifier = InMemoryPartyNotifier::new();
        let code = PartyCode::from("AB12");
        let mut receiver = notifier.subscribe(&code);

        notifier
            .publish(PartyNotification::new(code.clone(), PartyEvent::PartyEnded))
            .await
            .unwrap();

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.event, PartyEvent::PartyEnded);
        assert!(notifier.channels.get(&code).is_none());
    }
}
