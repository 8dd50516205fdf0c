use crate::track::Track;
use crate::value::{GoerId, PartyCode, TrackUri};
use async_trait::async_trait;
use thiserror::Error;

/// Party state changes worth telling connected clients about.
#[derive(Debug, Clone, PartialEq)]
pub enum PartyEvent {
    ListenerJoined { goer: GoerId },
    ListenerLeft { goer: GoerId },
    PlaybackToggled { is_playing: bool },
    TrackQueued { uri: TrackUri },
    QueueUpdated,
    SongChanged { track: Track },
    PartyEnded,
}

/// A party event scoped to the party it happened in.
#[derive(Debug, Clone, PartialEq)]
pub struct PartyNotification {
    pub code: PartyCode,
    pub event: PartyEvent,
}

impl PartyNotification {
    pub fn new(code: PartyCode, event: PartyEvent) -> Self {
        Self { code, event }
    }
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification channel closed: {0}")]
    ChannelClosed(String),
    #[error("{0}")]
    OtherErr(String),
}

/// Fan-out of party state changes to connected clients.
///
/// Delivery is best effort and at most once. The engine publishes drained
/// aggregate events here for UI responsiveness only; correctness never
/// depends on a notification arriving.
#[async_trait]
pub trait PartyNotifier: Send + Sync {
    async fn publish(&self, notification: PartyNotification) -> Result<(), NotifyError>;
}
