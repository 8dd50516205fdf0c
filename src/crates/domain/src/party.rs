use crate::event::PartyEvent;
use crate::likes_dislikes::{Feeling, LikesDislikes};
use crate::party_goer::PartyGoer;
use crate::provider::PlaybackState;
use crate::queue::Queue;
use crate::track::{CurrentSong, Track};
use crate::value::{GoerId, PartyCode, TrackUri};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use thiserror::Error;

/// Number of seed tracks a recommendation request carries, by convention.
pub const SEED_TRACK_COUNT: usize = 5;

#[derive(Error, Debug)]
pub enum PartyError {
    #[error("{0} is not a member of this party")]
    NotAMember(GoerId),
    #[error("{0} is already a member of this party")]
    AlreadyMember(GoerId),
    #[error("queue is empty")]
    QueueEmpty,
    #[error("nothing is playing")]
    NothingPlaying,
    #[error("track {0} is currently playing")]
    AlreadyPlaying(TrackUri),
    #[error("the host must end the party rather than leave it")]
    HostMustEndParty,
    #[error("{0}")]
    DbErr(String),
    #[error("{0}")]
    OtherErr(String),
}

/// Corrective seek for one listener's device.
#[derive(Debug, Clone, PartialEq)]
pub struct SeekCommand {
    pub uri: TrackUri,
    pub position_ms: i64,
}

/// Party aggregate root.
///
/// Owns membership (one host, unique listeners), the play queue and history,
/// the canonical now-playing state, and the likes/dislikes ledger. All state
/// transitions go through here; invariant violations come back as typed
/// `PartyError`s and never partially apply. State changes worth fanning out
/// are recorded into `pending_events` for the orchestration layer to drain.
#[derive(Debug, Clone)]
pub struct Party {
    pub code: PartyCode,
    pub host: PartyGoer,
    pub listeners: Vec<PartyGoer>,
    pub queue: Queue,
    pub current_song: Option<CurrentSong>,
    pub is_playing: bool,
    pub likes_dislikes: LikesDislikes,
    pub pending_events: Vec<PartyEvent>,
}

impl Party {
    pub fn new(code: PartyCode, host: PartyGoer) -> Self {
        Self {
            code,
            host,
            listeners: vec![],
            queue: Queue::new(),
            current_song: None,
            is_playing: false,
            likes_dislikes: LikesDislikes::new(),
            pending_events: vec![],
        }
    }

    fn record(&mut self, event: PartyEvent) {
        self.pending_events.push(event);
    }

    pub fn is_listener(&self, goer: &GoerId) -> bool {
        self.listeners.iter().any(|listener| listener.id() == goer)
    }

    pub fn is_member(&self, goer: &GoerId) -> bool {
        self.host.id() == goer || self.is_listener(goer)
    }

    fn ensure_member(&self, goer: &GoerId) -> Result<(), PartyError> {
        if self.is_member(goer) {
            Ok(())
        } else {
            Err(PartyError::NotAMember(goer.clone()))
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Adds a listener. The host and existing listeners cannot join again, so
    /// the listener set stays duplicate-free and never contains the host.
    pub fn join(&mut self, attendee: PartyGoer) -> Result<(), PartyError> {
        if self.is_member(attendee.id()) {
            return Err(PartyError::AlreadyMember(attendee.id().clone()));
        }
        let goer = attendee.id().clone();
        self.listeners.push(attendee);
        self.record(PartyEvent::ListenerJoined { goer });
        Ok(())
    }

    /// Removes a listener. The host takes the end-party path instead; that is
    /// a repository-level effect the aggregate cannot perform on itself.
    pub fn leave(&mut self, goer: &GoerId) -> Result<(), PartyError> {
        if self.host.id() == goer {
            return Err(PartyError::HostMustEndParty);
        }
        let position = self
            .listeners
            .iter()
            .position(|listener| listener.id() == goer)
            .ok_or_else(|| PartyError::NotAMember(goer.clone()))?;
        self.listeners.remove(position);
        self.record(PartyEvent::ListenerLeft { goer: goer.clone() });
        Ok(())
    }

    /// Flips playing/paused. Returns the new playing state.
    ///
    /// Pausing folds the elapsed play time into the stored offset; resuming
    /// restarts the projection clock at `now`. Time spent paused therefore
    /// never leaks into the canonical position `sync_command` projects.
    pub fn toggle_playback(&mut self, requester: &GoerId) -> Result<bool, PartyError> {
        self.ensure_member(requester)?;
        let was_playing = self.is_playing;
        let now = Utc::now();
        match self.current_song.as_mut() {
            Some(current) => {
                if was_playing {
                    let position = current.projected_progress_ms(now, true);
                    current.progress_ms = position;
                }
                current.updated_at = now;
            }
            None => return Err(PartyError::NothingPlaying),
        }
        self.is_playing = !self.is_playing;
        let is_playing = self.is_playing;
        self.record(PartyEvent::PlaybackToggled { is_playing });
        Ok(is_playing)
    }

    /// Advances to the head of the queue, archiving the previous current song
    /// into history. An empty queue changes nothing and reports `QueueEmpty`.
    pub fn request_skip(&mut self, requester: &GoerId) -> Result<Track, PartyError> {
        self.ensure_member(requester)?;
        if self.queue.is_empty() {
            return Err(PartyError::QueueEmpty);
        }
        let previous = self.current_song.take().map(|current| current.track);
        let next = self.queue.advance(previous).ok_or(PartyError::QueueEmpty)?;
        self.queue.remove_uri(&next.uri);
        self.current_song = Some(CurrentSong::new(next.clone(), 0));
        self.record(PartyEvent::SongChanged { track: next.clone() });
        Ok(next)
    }

    /// Appends to the queue. Queueing the currently playing track is refused
    /// so the queue never contains the current song.
    pub fn add_track_to_queue(&mut self, track: Track, requester: &GoerId) -> Result<(), PartyError> {
        self.ensure_member(requester)?;
        if let Some(current) = &self.current_song {
            if current.track.uri == track.uri {
                return Err(PartyError::AlreadyPlaying(track.uri));
            }
        }
        let uri = track.uri.clone();
        self.queue.push(track);
        self.record(PartyEvent::TrackQueued { uri });
        Ok(())
    }

    /// Swaps in a freshly generated queue, keeping the current song out of it.
    pub fn replace_queue(&mut self, tracks: Vec<Track>) {
        self.queue.replace(tracks);
        if let Some(current) = &self.current_song {
            let uri = current.track.uri.clone();
            self.queue.remove_uri(&uri);
        }
        self.record(PartyEvent::QueueUpdated);
    }

    /// Host-driven now-playing refresh from the provider. A changed track
    /// archives the previous current song; `None` (no active device) pauses
    /// the party without touching the current song.
    pub fn apply_playback_state(&mut self, state: Option<PlaybackState>) {
        let Some(state) = state else {
            if self.is_playing {
                self.is_playing = false;
                self.record(PartyEvent::PlaybackToggled { is_playing: false });
            }
            return;
        };

        let track_changed = self
            .current_song
            .as_ref()
            .map(|current| current.track.uri != state.track.uri)
            .unwrap_or(true);

        if track_changed {
            if let Some(previous) = self.current_song.take() {
                self.queue.history.push(previous.track);
            }
            self.record(PartyEvent::SongChanged {
                track: state.track.clone(),
            });
        }

        self.queue.remove_uri(&state.track.uri);
        self.current_song = Some(CurrentSong::new(state.track, state.progress_ms));
        if self.is_playing != state.is_playing {
            self.is_playing = state.is_playing;
            self.record(PartyEvent::PlaybackToggled {
                is_playing: state.is_playing,
            });
        }
    }

    /// The sync primitive: given a listener's reported position, decide
    /// whether their device needs a corrective seek. `None` while paused or
    /// when drift is within tolerance, so redundant polls are free.
    pub fn sync_command(
        &self,
        reported_position_ms: i64,
        now: DateTime<Utc>,
        tolerance_ms: i64,
    ) -> Option<SeekCommand> {
        if !self.is_playing {
            return None;
        }
        let current = self.current_song.as_ref()?;
        let canonical = current.projected_progress_ms(now, true);
        if (canonical - reported_position_ms).abs() <= tolerance_ms {
            return None;
        }
        Some(SeekCommand {
            uri: current.track.uri.clone(),
            position_ms: canonical,
        })
    }

    pub fn record_feeling(
        &mut self,
        listener: &GoerId,
        uri: TrackUri,
        feeling: Feeling,
    ) -> Result<(), PartyError> {
        self.ensure_member(listener)?;
        self.likes_dislikes.record(listener.clone(), uri, feeling);
        Ok(())
    }

    /// Preferred recommendation seeds: tracks the party liked, minus tracks
    /// anyone disliked, capped at `limit`. Empty means the caller should fall
    /// back to the host's top tracks.
    pub fn seed_track_uris(&self, limit: usize) -> Vec<TrackUri> {
        let disliked: HashSet<TrackUri> =
            self.likes_dislikes.disliked_by_party().into_iter().collect();
        self.likes_dislikes
            .liked_by_party()
            .into_iter()
            .filter(|uri| !disliked.contains(uri))
            .take(limit)
            .collect()
    }

    pub fn take_pending_events(&mut self) -> Vec<PartyEvent> {
        std::mem::take(&mut self.pending_events)
    }
}

/// Persistence contract for parties.
///
/// The store is the source of truth for party existence and for the
/// one-party-per-goer invariant: `find_by_attendee` returns at most one
/// party, and `delete` is atomic with respect to concurrent fetches.
#[async_trait]
pub trait PartyRepository: Send + Sync {
    async fn create(&self, party: Party) -> Result<(), PartyError>;
    async fn find_by_code(&self, code: &PartyCode) -> Result<Option<Party>, PartyError>;
    async fn find_by_host(&self, host: &GoerId) -> Result<Option<Party>, PartyError>;
    async fn find_by_attendee(&self, attendee: &GoerId) -> Result<Option<Party>, PartyError>;
    async fn save(&self, party: &mut Party) -> Result<(), PartyError>;
    async fn delete(&self, code: &PartyCode) -> Result<bool, PartyError>;
    /// Parties ordered by listener count, most listeners first.
    async fn most_listeners(&self, count: usize) -> Result<Vec<Party>, PartyError>;
    async fn is_hosting(&self, goer: &GoerId) -> Result<bool, PartyError>;
    async fn is_attending(&self, goer: &GoerId) -> Result<bool, PartyError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn goer(id: &str) -> PartyGoer {
        PartyGoer::with_defaults(GoerId::from(id))
    }

    fn track(uri: &str) -> Track {
        Track::new(TrackUri::from(uri), uri, "artist", "", 180_000)
    }

    fn party() -> Party {
        Party::new(PartyCode::from("AB12"), goer("host"))
    }

    #[test]
    fn join_rejects_duplicates_and_the_host() {
        let mut party = party();
        party.join(goer("alice")).unwrap();

        assert!(matches!(
            party.join(goer("alice")),
            Err(PartyError::AlreadyMember(_))
        ));
        assert!(matches!(
            party.join(goer("host")),
            Err(PartyError::AlreadyMember(_))
        ));
        assert_eq!(party.listener_count(), 1);
        assert!(!party.is_listener(&GoerId::from("host")));
    }

    #[test]
    fn leave_removes_listener_but_refuses_the_host() {
        let mut party = party();
        party.join(goer("alice")).unwrap();

        assert!(matches!(
            party.leave(&GoerId::from("host")),
            Err(PartyError::HostMustEndParty)
        ));
        party.leave(&GoerId::from("alice")).unwrap();
        assert_eq!(party.listener_count(), 0);
        assert!(matches!(
            party.leave(&GoerId::from("alice")),
            Err(PartyError::NotAMember(_))
        ));
    }

    #[test]
    fn toggle_requires_membership_and_a_current_song() {
        let mut party = party();
        assert!(matches!(
            party.toggle_playback(&GoerId::from("host")),
            Err(PartyError::NothingPlaying)
        ));

        party.current_song = Some(CurrentSong::new(track("a"), 0));
        assert!(matches!(
            party.toggle_playback(&GoerId::from("stranger")),
            Err(PartyError::NotAMember(_))
        ));
        assert!(party.toggle_playback(&GoerId::from("host")).unwrap());
        assert!(!party.toggle_playback(&GoerId::from("host")).unwrap());
    }

    #[test]
    fn pause_folds_progress_and_resume_restarts_the_clock() {
        let mut party = party();
        let host = GoerId::from("host");
        let now = Utc::now();
        party.current_song = Some(CurrentSong::observed_at(
            track("a"),
            30_000,
            now - Duration::seconds(10),
        ));
        party.is_playing = true;

        // Pausing captures the position the host's device had reached
        assert!(!party.toggle_playback(&host).unwrap());
        let paused_at = party.current_song.as_ref().unwrap().progress_ms;
        assert!((paused_at - 40_000).abs() < 1_000);

        // A long pause, then resume: the projection clock restarts
        party.current_song.as_mut().unwrap().updated_at = Utc::now() - Duration::seconds(60);
        assert!(party.toggle_playback(&host).unwrap());
        assert_eq!(party.current_song.as_ref().unwrap().progress_ms, paused_at);

        // A listener sitting at the pause position needs no corrective seek
        assert!(party.sync_command(paused_at, Utc::now(), 3_000).is_none());
    }

    #[test]
    fn skip_moves_head_to_current_and_previous_to_history() {
        let mut party = party();
        party.join(goer("alice")).unwrap();
        party.current_song = Some(CurrentSong::new(track("old"), 42_000));
        party
            .add_track_to_queue(track("next"), &GoerId::from("alice"))
            .unwrap();

        let next = party.request_skip(&GoerId::from("alice")).unwrap();
        assert_eq!(next.uri, TrackUri::from("next"));
        assert_eq!(party.queue.len(), 0);
        assert_eq!(party.queue.history.len(), 1);
        assert_eq!(party.queue.history[0].uri, TrackUri::from("old"));
        assert_eq!(
            party.current_song.as_ref().unwrap().track.uri,
            TrackUri::from("next")
        );
    }

    #[test]
    fn skip_on_empty_queue_changes_nothing() {
        let mut party = party();
        party.current_song = Some(CurrentSong::new(track("playing"), 10_000));

        assert!(matches!(
            party.request_skip(&GoerId::from("host")),
            Err(PartyError::QueueEmpty)
        ));
        assert_eq!(
            party.current_song.as_ref().unwrap().track.uri,
            TrackUri::from("playing")
        );
        assert!(party.queue.history.is_empty());
    }

    #[test]
    fn queue_never_contains_the_current_song() {
        let mut party = party();
        party.current_song = Some(CurrentSong::new(track("playing"), 0));

        assert!(matches!(
            party.add_track_to_queue(track("playing"), &GoerId::from("host")),
            Err(PartyError::AlreadyPlaying(_))
        ));

        party.replace_queue(vec![track("playing"), track("other")]);
        assert!(!party.queue.contains_uri(&TrackUri::from("playing")));
        assert_eq!(party.queue.len(), 1);
    }

    #[test]
    fn apply_playback_state_archives_changed_track() {
        let mut party = party();
        party.apply_playback_state(Some(PlaybackState {
            track: track("first"),
            progress_ms: 1_000,
            is_playing: true,
        }));
        assert!(party.is_playing);
        assert!(party.queue.history.is_empty());

        party.take_pending_events();
        party.apply_playback_state(Some(PlaybackState {
            track: track("second"),
            progress_ms: 0,
            is_playing: true,
        }));
        assert_eq!(party.queue.history.len(), 1);
        assert_eq!(party.queue.history[0].uri, TrackUri::from("first"));
        assert!(party
            .pending_events
            .iter()
            .any(|event| matches!(event, PartyEvent::SongChanged { .. })));

        // No active device pauses without dropping the current song
        party.apply_playback_state(None);
        assert!(!party.is_playing);
        assert!(party.current_song.is_some());
    }

    #[test]
    fn sync_command_is_none_within_tolerance() {
        let mut party = party();
        let now = Utc::now();
        party.current_song = Some(CurrentSong::observed_at(track("a"), 30_000, now));
        party.is_playing = true;

        assert!(party.sync_command(29_000, now, 3_000).is_none());
        assert!(party.sync_command(32_500, now, 3_000).is_none());
    }

    #[test]
    fn sync_command_seeks_to_projected_position_beyond_tolerance() {
        let mut party = party();
        let now = Utc::now();
        party.current_song = Some(CurrentSong::observed_at(
            track("a"),
            30_000,
            now - Duration::seconds(5),
        ));
        party.is_playing = true;

        let command = party.sync_command(10_000, now, 3_000).unwrap();
        assert_eq!(command.uri, TrackUri::from("a"));
        assert_eq!(command.position_ms, 35_000);
    }

    #[test]
    fn sync_command_is_none_while_paused() {
        let mut party = party();
        party.current_song = Some(CurrentSong::new(track("a"), 30_000));
        party.is_playing = false;

        assert!(party.sync_command(0, Utc::now(), 3_000).is_none());
    }

    #[test]
    fn seeds_prefer_likes_and_exclude_dislikes() {
        let mut party = party();
        party.join(goer("alice")).unwrap();
        let alice = GoerId::from("alice");
        party
            .record_feeling(&alice, TrackUri::from("liked"), Feeling::Liked)
            .unwrap();
        party
            .record_feeling(&alice, TrackUri::from("both"), Feeling::Liked)
            .unwrap();
        party
            .record_feeling(&GoerId::from("host"), TrackUri::from("both"), Feeling::Disliked)
            .unwrap();

        let seeds = party.seed_track_uris(SEED_TRACK_COUNT);
        assert_eq!(seeds, vec![TrackUri::from("liked")]);
    }

    #[test]
    fn operations_record_events_for_fan_out() {
        let mut party = party();
        party.join(goer("alice")).unwrap();
        party
            .add_track_to_queue(track("a"), &GoerId::from("alice"))
            .unwrap();
        party.request_skip(&GoerId::from("alice")).unwrap();

        let events = party.take_pending_events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], PartyEvent::ListenerJoined { .. }));
        assert!(matches!(events[1], PartyEvent::TrackQueued { .. }));
        assert!(matches!(events[2], PartyEvent::SongChanged { .. }));
        assert!(party.take_pending_events().is_empty());
    }
}
