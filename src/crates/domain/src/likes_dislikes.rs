use crate::value::{GoerId, TrackUri};
use std::collections::HashMap;

/// One feeling per (track, goer); a later feeling replaces the earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feeling {
    Liked,
    Disliked,
}

/// Per-party record of which goer liked or disliked which track.
#[derive(Debug, Clone, Default)]
pub struct LikesDislikes {
    entries: HashMap<TrackUri, HashMap<GoerId, Feeling>>,
}

impl LikesDislikes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert: recording the same feeling twice is a no-op, recording the
    /// opposite feeling replaces the earlier entry.
    pub fn record(&mut self, goer: GoerId, uri: TrackUri, feeling: Feeling) {
        self.entries.entry(uri).or_default().insert(goer, feeling);
    }

    pub fn feeling_of(&self, goer: &GoerId, uri: &TrackUri) -> Option<Feeling> {
        self.entries.get(uri).and_then(|by_goer| by_goer.get(goer)).copied()
    }

    /// This goer's (liked, disliked) track URIs, each list sorted for
    /// deterministic output.
    pub fn feelings_of(&self, goer: &GoerId) -> (Vec<TrackUri>, Vec<TrackUri>) {
        let mut liked = Vec::new();
        let mut disliked = Vec::new();
        for (uri, by_goer) in &self.entries {
            match by_goer.get(goer) {
                Some(Feeling::Liked) => liked.push(uri.clone()),
                Some(Feeling::Disliked) => disliked.push(uri.clone()),
                None => {}
            }
        }
        liked.sort();
        disliked.sort();
        (liked, disliked)
    }

    /// Distinct URIs at least one goer liked, sorted.
    pub fn liked_by_party(&self) -> Vec<TrackUri> {
        self.with_feeling(Feeling::Liked)
    }

    /// Distinct URIs at least one goer disliked, sorted.
    pub fn disliked_by_party(&self) -> Vec<TrackUri> {
        self.with_feeling(Feeling::Disliked)
    }

    fn with_feeling(&self, feeling: Feeling) -> Vec<TrackUri> {
        let mut uris: Vec<TrackUri> = self
            .entries
            .iter()
            .filter(|(_, by_goer)| by_goer.values().any(|f| *f == feeling))
            .map(|(uri, _)| uri.clone())
            .collect();
        uris.sort();
        uris
    }

    pub fn entry_count(&self) -> usize {
        self.entries.values().map(|by_goer| by_goer.len()).sum()
    }
}
