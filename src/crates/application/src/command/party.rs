use std::collections::HashSet;
use std::sync::Arc;

use crate::command::shared::CodeGenerator;
use crate::error::AppError;
use chrono::Utc;
use dashmap::DashMap;
use domain::event::{PartyEvent, PartyNotification, PartyNotifier};
use domain::likes_dislikes::Feeling;
use domain::party::{Party, PartyRepository, SEED_TRACK_COUNT};
use domain::party_goer::PartyGoer;
use domain::provider::{MusicProviderClient, RecommendationRequest};
use domain::track::Track;
use domain::value::{GoerId, PartyCode, TrackUri};
use tokio::sync::Mutex;

/// Give up allocating a fresh code after this many collisions in a row.
const CODE_ALLOCATION_ATTEMPTS: usize = 16;

/// Party orchestration service.
///
/// Translates client-facing actions into aggregate operations: resolve the
/// acting goer's party, take the per-party lock, mutate the aggregate,
/// persist, then fan out the drained events. Mutations on the same party are
/// serialized by a keyed lock so they stay linearizable; different parties
/// never contend. Provider calls on best-effort paths (sync, device pushes,
/// queue generation) are logged and dropped for the cycle when they fail,
/// never allowed to corrupt party state.
pub struct PartyAppService {
    party_repository: Arc<dyn PartyRepository>,
    provider: Arc<dyn MusicProviderClient>,
    notifier: Arc<dyn PartyNotifier>,
    code_generator: Arc<dyn CodeGenerator>,
    party_locks: DashMap<PartyCode, Arc<Mutex<()>>>,
    drift_tolerance_ms: i64,
}

impl PartyAppService {
    pub fn new(
        party_repository: Arc<dyn PartyRepository>,
        provider: Arc<dyn MusicProviderClient>,
        notifier: Arc<dyn PartyNotifier>,
        code_generator: Arc<dyn CodeGenerator>,
        drift_tolerance_ms: i64,
    ) -> Self {
        Self {
            party_repository,
            provider,
            notifier,
            code_generator,
            party_locks: DashMap::new(),
            drift_tolerance_ms,
        }
    }

    fn lock_for(&self, code: &PartyCode) -> Arc<Mutex<()>> {
        self.party_locks
            .entry(code.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn load_party(&self, code: &PartyCode) -> Result<Party, AppError> {
        self.party_repository
            .find_by_code(code)
            .await?
            .ok_or_else(|| AppError::AggregateNotFound("Party".to_string(), code.to_string()))
    }

    /// Drains the aggregate's recorded events, persists it, then fans the
    /// events out. Draining must happen before `save`: the store keeps whole
    /// aggregates, and a persisted event backlog would be republished by
    /// every later load of the party. Fan-out is best effort: a failed
    /// publish is logged and forgotten.
    async fn persist_and_publish(&self, party: &mut Party) -> Result<(), AppError> {
        let code = party.code.clone();
        let events = party.take_pending_events();
        self.party_repository.save(party).await?;
        for event in events {
            let notification = PartyNotification::new(code.clone(), event);
            if let Err(e) = self.notifier.publish(notification).await {
                log::warn!("party {}: event fan-out failed: {}", code, e);
            }
        }
        Ok(())
    }

    async fn unique_code(&self) -> Result<PartyCode, AppError> {
        for _ in 0..CODE_ALLOCATION_ATTEMPTS {
            let candidate = self.code_generator.next_code();
            if self.party_repository.find_by_code(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
        Err(AppError::UnknownError(
            "could not allocate a unique party code".to_string(),
        ))
    }

    async fn ensure_not_partying(&self, goer: &GoerId) -> Result<(), AppError> {
        if self.party_repository.is_hosting(goer).await?
            || self.party_repository.is_attending(goer).await?
        {
            return Err(AppError::AlreadyInAParty(goer.to_string()));
        }
        Ok(())
    }

    /// Creates a party hosted by `host` and returns its shareable code.
    pub async fn start_party(&self, host: PartyGoer) -> Result<PartyCode, AppError> {
        self.ensure_not_partying(host.id()).await?;
        let code = self.unique_code().await?;
        let party = Party::new(code.clone(), host);
        self.party_repository.create(party).await?;
        log::info!("party {} started", code);
        Ok(code)
    }

    pub async fn join_party(&self, code: &PartyCode, attendee: PartyGoer) -> Result<(), AppError> {
        self.ensure_not_partying(attendee.id()).await?;
        let lock = self.lock_for(code);
        let _guard = lock.lock().await;

        let mut party = self.load_party(code).await?;
        party.join(attendee)?;
        self.persist_and_publish(&mut party).await?;
        Ok(())
    }

    /// Listener leaving removes them; the host leaving ends the party.
    pub async fn leave_party(&self, goer: &GoerId) -> Result<(), AppError> {
        if let Some(attending) = self.party_repository.find_by_attendee(goer).await? {
            let lock = self.lock_for(&attending.code);
            let _guard = lock.lock().await;

            let mut party = self.load_party(&attending.code).await?;
            party.leave(goer)?;
            self.persist_and_publish(&mut party).await?;
            return Ok(());
        }

        if let Some(hosting) = self.party_repository.find_by_host(goer).await? {
            self.end_party_with_code(&hosting.code).await?;
            return Ok(());
        }

        Err(AppError::AggregateNotFound(
            "Party".to_string(),
            goer.to_string(),
        ))
    }

    /// Ends the party `host` is hosting; false when they are not hosting one.
    pub async fn end_party(&self, host: &GoerId) -> Result<bool, AppError> {
        match self.party_repository.find_by_host(host).await? {
            Some(party) => self.end_party_with_code(&party.code).await,
            None => Ok(false),
        }
    }

    pub async fn end_party_with_code(&self, code: &PartyCode) -> Result<bool, AppError> {
        let lock = self.lock_for(code);
        let _guard = lock.lock().await;

        let deleted = self.party_repository.delete(code).await?;
        if deleted {
            let notification =
                PartyNotification::new(code.clone(), PartyEvent::PartyEnded);
            if let Err(e) = self.notifier.publish(notification).await {
                log::warn!("party {}: end-of-party fan-out failed: {}", code, e);
            }
            log::info!("party {} ended", code);
        }
        drop(_guard);
        self.party_locks.remove(code);
        Ok(deleted)
    }

    /// Flips playing/paused and propagates the new state to the host's
    /// device. The persisted state wins: a failed device call is logged and
    /// left for the next now-playing refresh to reconcile.
    pub async fn toggle_playback(
        &self,
        code: &PartyCode,
        requester: &GoerId,
    ) -> Result<bool, AppError> {
        let lock = self.lock_for(code);
        let _guard = lock.lock().await;

        let mut party = self.load_party(code).await?;
        let is_playing = party.toggle_playback(requester)?;
        self.persist_and_publish(&mut party).await?;

        let device_result = if is_playing {
            match &party.current_song {
                Some(current) => {
                    // Resume with the queue behind the current track so the
                    // device keeps playing through it, same as a queue push.
                    let mut uris = vec![current.track.uri.clone()];
                    uris.extend(party.queue.upcoming_uris());
                    self.provider
                        .push_playback(party.host.id(), &uris, current.progress_ms)
                        .await
                }
                None => Ok(()),
            }
        } else {
            self.provider.pause_playback(party.host.id()).await
        };
        if let Err(e) = device_result {
            log::warn!("party {}: device toggle skipped this cycle: {}", code, e);
        }
        Ok(is_playing)
    }

    /// Skips to the head of the queue and pushes the new track to the host's
    /// device.
    pub async fn request_skip(
        &self,
        code: &PartyCode,
        requester: &GoerId,
    ) -> Result<Track, AppError> {
        let lock = self.lock_for(code);
        let _guard = lock.lock().await;

        let mut party = self.load_party(code).await?;
        let next = party.request_skip(requester)?;
        self.persist_and_publish(&mut party).await?;

        if let Err(e) = self
            .provider
            .push_playback(party.host.id(), &[next.uri.clone()], 0)
            .await
        {
            log::warn!("party {}: skip device push skipped this cycle: {}", code, e);
        }
        Ok(next)
    }

    pub async fn add_song_to_queue(
        &self,
        code: &PartyCode,
        requester: &GoerId,
        track: Track,
    ) -> Result<(), AppError> {
        let lock = self.lock_for(code);
        let _guard = lock.lock().await;

        let mut party = self.load_party(code).await?;
        party.add_track_to_queue(track, requester)?;
        self.persist_and_publish(&mut party).await?;
        Ok(())
    }

    /// The listener-initiated sync primitive. Pull-based and idempotent:
    /// a listener not in a party, a paused party, or drift within tolerance
    /// is a no-op without any provider call; past tolerance exactly one
    /// corrective seek goes out, and a failure waits for the next poll.
    pub async fn sync_listener(
        &self,
        listener: &GoerId,
        reported_position_ms: i64,
    ) -> Result<(), AppError> {
        let Some(party) = self.party_repository.find_by_attendee(listener).await? else {
            return Ok(());
        };
        let Some(command) =
            party.sync_command(reported_position_ms, Utc::now(), self.drift_tolerance_ms)
        else {
            return Ok(());
        };
        if let Err(e) = self
            .provider
            .push_playback(listener, &[command.uri], command.position_ms)
            .await
        {
            log::warn!(
                "party {}: sync for {} skipped this cycle: {}",
                party.code,
                listener,
                e
            );
        }
        Ok(())
    }

    /// Host-driven now-playing refresh: reads the host's playback from the
    /// provider and folds it into the party. Transient provider failures
    /// leave the party untouched until the next cycle.
    pub async fn update_current_song(&self, host: &GoerId) -> Result<(), AppError> {
        let hosting = self
            .party_repository
            .find_by_host(host)
            .await?
            .ok_or_else(|| AppError::AggregateNotFound("Party".to_string(), host.to_string()))?;

        let state = match self.provider.current_playback(host).await {
            Ok(state) => state,
            Err(e) if e.is_transient() => {
                log::warn!(
                    "party {}: now-playing refresh skipped this cycle: {}",
                    hosting.code,
                    e
                );
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let lock = self.lock_for(&hosting.code);
        let _guard = lock.lock().await;

        let mut party = self.load_party(&hosting.code).await?;
        party.apply_playback_state(state);
        self.persist_and_publish(&mut party).await?;
        Ok(())
    }

    pub async fn record_feeling(
        &self,
        code: &PartyCode,
        listener: &GoerId,
        uri: TrackUri,
        feeling: Feeling,
    ) -> Result<(), AppError> {
        let lock = self.lock_for(code);
        let _guard = lock.lock().await;

        let mut party = self.load_party(code).await?;
        party.record_feeling(listener, uri, feeling)?;
        self.party_repository.save(&mut party).await?;
        Ok(())
    }

    /// Regenerates the queue from recommendations. Seed precedence: explicit
    /// override, then the party's liked-minus-disliked tracks, then the
    /// host's top tracks. Disliked tracks never make it into the new queue.
    /// Transient provider failures keep the old queue for this cycle.
    pub async fn generate_queue(
        &self,
        code: &PartyCode,
        seed_override: Vec<TrackUri>,
    ) -> Result<usize, AppError> {
        let lock = self.lock_for(code);
        let _guard = lock.lock().await;

        let mut party = self.load_party(code).await?;

        let seeds = if !seed_override.is_empty() {
            seed_override.into_iter().take(SEED_TRACK_COUNT).collect()
        } else {
            let liked = party.seed_track_uris(SEED_TRACK_COUNT);
            if liked.is_empty() {
                match self
                    .provider
                    .top_track_uris(party.host.id(), SEED_TRACK_COUNT)
                    .await
                {
                    Ok(top) => top,
                    Err(e) if e.is_transient() => {
                        log::warn!("party {}: seed lookup skipped this cycle: {}", code, e);
                        return Ok(party.queue.len());
                    }
                    Err(e) => return Err(e.into()),
                }
            } else {
                liked
            }
        };

        let request = RecommendationRequest {
            seed_uris: seeds,
            market: party.host.market().to_string(),
            min_energy: None,
        };
        let recommended = match self.provider.recommended_tracks(party.host.id(), request).await {
            Ok(tracks) => tracks,
            Err(e) if e.is_transient() => {
                log::warn!("party {}: queue generation skipped this cycle: {}", code, e);
                return Ok(party.queue.len());
            }
            Err(e) => return Err(e.into()),
        };

        let disliked: HashSet<TrackUri> =
            party.likes_dislikes.disliked_by_party().into_iter().collect();
        let tracks: Vec<Track> = recommended
            .into_iter()
            .filter(|track| !disliked.contains(&track.uri))
            .collect();

        party.replace_queue(tracks);
        self.persist_and_publish(&mut party).await?;

        // Keep the host's device queue aligned with the party queue
        let mut uris = Vec::new();
        let mut position_ms = 0;
        if let Some(current) = &party.current_song {
            uris.push(current.track.uri.clone());
            position_ms = current.progress_ms;
        }
        uris.extend(party.queue.upcoming_uris());
        if !uris.is_empty() {
            if let Err(e) = self
                .provider
                .push_playback(party.host.id(), &uris, position_ms)
                .await
            {
                log::warn!("party {}: queue device push skipped this cycle: {}", code, e);
            }
        }
        Ok(party.queue.len())
    }

    pub async fn get_party(&self, code: &PartyCode) -> Result<Option<Party>, AppError> {
        Ok(self.party_repository.find_by_code(code).await?)
    }

    pub async fn party_for_attendee(&self, goer: &GoerId) -> Result<Option<Party>, AppError> {
        Ok(self.party_repository.find_by_attendee(goer).await?)
    }

    pub async fn party_for_host(&self, goer: &GoerId) -> Result<Option<Party>, AppError> {
        Ok(self.party_repository.find_by_host(goer).await?)
    }

    pub async fn is_user_partying(&self, goer: &GoerId) -> Result<bool, AppError> {
        Ok(self.party_repository.is_hosting(goer).await?
            || self.party_repository.is_attending(goer).await?)
    }

    /// Parties with the most listeners first.
    pub async fn top_parties(&self, count: usize) -> Result<Vec<Party>, AppError> {
        Ok(self.party_repository.most_listeners(count).await?)
    }

    /// This goer's (liked, disliked) track URIs in the party.
    pub async fn likes_dislikes_of(
        &self,
        code: &PartyCode,
        goer: &GoerId,
    ) -> Result<(Vec<TrackUri>, Vec<TrackUri>), AppError> {
        let party = self.load_party(code).await?;
        Ok(party.likes_dislikes.feelings_of(goer))
    }
}
