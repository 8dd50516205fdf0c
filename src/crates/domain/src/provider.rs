use crate::track::Track;
use crate::value::{GoerId, TrackUri};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("provider request timed out: {0}")]
    Timeout(String),
    #[error("provider rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("provider authorization failed: {0}")]
    Auth(String),
    #[error("provider request failed: {0}")]
    Http(String),
    #[error("{0}")]
    OtherErr(String),
}

impl ProviderError {
    /// Transient failures are dropped for one cycle and corrected by the next
    /// poll; everything else is worth surfacing.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout(_) | ProviderError::RateLimited { .. }
        )
    }
}

/// What the provider reports a user's device is doing right now.
#[derive(Debug, Clone)]
pub struct PlaybackState {
    pub track: Track,
    pub progress_ms: i64,
    pub is_playing: bool,
}

#[derive(Debug, Clone)]
pub struct RecommendationRequest {
    pub seed_uris: Vec<TrackUri>,
    pub market: String,
    pub min_energy: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in_secs: i64,
}

/// Contract for the external music-provider API.
///
/// Every call crosses the network and must be assumed to fail, rate limit, or
/// time out; callers decide per operation whether a failure is fatal or a
/// skipped cycle. Only the orchestration layer talks to this.
#[async_trait]
pub trait MusicProviderClient: Send + Sync {
    /// Now-playing state for a user, `None` when no device is active.
    async fn current_playback(&self, goer: &GoerId)
        -> Result<Option<PlaybackState>, ProviderError>;

    /// Pushes a track list to the user's device, seeking to `position_ms`
    /// within the first track. Also serves as the seek/resume primitive.
    async fn push_playback(
        &self,
        goer: &GoerId,
        uris: &[TrackUri],
        position_ms: i64,
    ) -> Result<(), ProviderError>;

    async fn pause_playback(&self, goer: &GoerId) -> Result<(), ProviderError>;

    /// The user's top tracks, used as fallback recommendation seeds.
    async fn top_track_uris(
        &self,
        goer: &GoerId,
        count: usize,
    ) -> Result<Vec<TrackUri>, ProviderError>;

    async fn recommended_tracks(
        &self,
        goer: &GoerId,
        request: RecommendationRequest,
    ) -> Result<Vec<Track>, ProviderError>;

    /// Exchanges an authorization code for access/refresh tokens.
    async fn exchange_authorization_code(&self, code: &str) -> Result<TokenPair, ProviderError>;
}
