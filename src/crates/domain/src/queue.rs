use crate::track::Track;
use crate::value::TrackUri;
use std::collections::VecDeque;

/// Ordered play queue plus play history for a party.
///
/// Insertion order is play order. History keeps previously played tracks with
/// the most recent last; it doubles as seed material for recommendations.
#[derive(Debug, Clone, Default)]
pub struct Queue {
    pub upcoming: VecDeque<Track>,
    pub history: Vec<Track>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, track: Track) {
        self.upcoming.push_back(track);
    }

    /// Pops the next track to play. `previous` is the song that was playing;
    /// it is archived into history only when there actually is a next track,
    /// so an empty queue leaves the caller's state untouched.
    pub fn advance(&mut self, previous: Option<Track>) -> Option<Track> {
        let next = self.upcoming.pop_front()?;
        if let Some(track) = previous {
            self.history.push(track);
        }
        Some(next)
    }

    /// Drops the whole upcoming list in favor of a freshly generated one.
    pub fn replace(&mut self, tracks: Vec<Track>) {
        self.upcoming = tracks.into();
    }

    /// Removes every queued copy of `uri`.
    pub fn remove_uri(&mut self, uri: &TrackUri) {
        self.upcoming.retain(|track| &track.uri != uri);
    }

    pub fn contains_uri(&self, uri: &TrackUri) -> bool {
        self.upcoming.iter().any(|track| &track.uri == uri)
    }

    pub fn upcoming_uris(&self) -> Vec<TrackUri> {
        self.upcoming.iter().map(|track| track.uri.clone()).collect()
    }

    /// Most recently played tracks, newest first.
    pub fn recently_played(&self, count: usize) -> Vec<&Track> {
        self.history.iter().rev().take(count).collect()
    }

    pub fn len(&self) -> usize {
        self.upcoming.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upcoming.is_empty()
    }
}
