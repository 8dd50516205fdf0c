use crate::value::TrackUri;
use chrono::{DateTime, Utc};

/// Track metadata as served by the music provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub uri: TrackUri,
    pub title: String,
    pub artist: String,
    pub album_image_url: String,
    /// Track length in milliseconds, 0 when unknown
    pub length_ms: i64,
}

impl Track {
    pub fn new(uri: TrackUri, title: &str, artist: &str, album_image_url: &str, length_ms: i64) -> Self {
        Self {
            uri,
            title: title.to_string(),
            artist: artist.to_string(),
            album_image_url: album_image_url.to_string(),
            length_ms,
        }
    }
}

/// The party's canonical now-playing state: a track plus the last observed
/// progress offset and when it was observed.
#[derive(Debug, Clone)]
pub struct CurrentSong {
    pub track: Track,
    pub progress_ms: i64,
    pub updated_at: DateTime<Utc>,
}

impl CurrentSong {
    pub fn new(track: Track, progress_ms: i64) -> Self {
        Self::observed_at(track, progress_ms, Utc::now())
    }

    pub fn observed_at(track: Track, progress_ms: i64, updated_at: DateTime<Utc>) -> Self {
        Self {
            track,
            progress_ms,
            updated_at,
        }
    }

    /// Progress extrapolated to `now`. While paused the last observed offset
    /// stands; while playing the wall-clock time since the observation is
    /// added, clamped to the track length when the length is known.
    pub fn projected_progress_ms(&self, now: DateTime<Utc>, is_playing: bool) -> i64 {
        if !is_playing {
            return self.progress_ms;
        }
        let elapsed = (now - self.updated_at).num_milliseconds().max(0);
        let projected = self.progress_ms + elapsed;
        if self.track.length_ms > 0 {
            projected.min(self.track.length_ms)
        } else {
            projected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn track() -> Track {
        Track::new(TrackUri::from("spotify:track:a"), "A", "Artist", "", 200_000)
    }

    #[test]
    fn paused_progress_does_not_advance() {
        let now = Utc::now();
        let song = CurrentSong::observed_at(track(), 30_000, now - Duration::seconds(10));
        assert_eq!(song.projected_progress_ms(now, false), 30_000);
    }

    #[test]
    fn playing_progress_advances_with_wall_clock() {
        let now = Utc::now();
        let song = CurrentSong::observed_at(track(), 30_000, now - Duration::seconds(10));
        assert_eq!(song.projected_progress_ms(now, true), 40_000);
    }

    #[test]
    fn progress_is_clamped_to_track_length() {
        let now = Utc::now();
        let song = CurrentSong::observed_at(track(), 190_000, now - Duration::seconds(60));
        assert_eq!(song.projected_progress_ms(now, true), 200_000);
    }
}
