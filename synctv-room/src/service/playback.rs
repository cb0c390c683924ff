//! Room playback state
//!
//! Stores the position at the last update and extrapolates on read, so no
//! background ticker is needed and viewers can ask "where should the video
//! be now" at any time.

use parking_lot::RwLock;
use tokio::time::Instant;

use crate::models::{Movie, Status};

#[derive(Debug)]
struct Current {
    movie: Option<Movie>,
    seek: f64,
    rate: f64,
    playing: bool,
    last_update: Instant,
}

impl Current {
    fn is_live(&self) -> bool {
        self.movie.as_ref().is_some_and(Movie::is_live)
    }

    fn pin_live(&mut self) -> Status {
        self.seek = 0.0;
        self.rate = 1.0;
        self.playing = true;
        self.last_update = Instant::now();
        Status::LIVE
    }

    /// Fold elapsed time into `seek` and restart the clock.
    fn normalize(&mut self) -> Status {
        if self.is_live() {
            return self.pin_live();
        }
        let now = Instant::now();
        if self.playing {
            self.seek += now.duration_since(self.last_update).as_secs_f64() * self.rate;
        }
        self.last_update = now;
        self.status()
    }

    const fn status(&self) -> Status {
        Status {
            seek: self.seek,
            rate: self.rate,
            playing: self.playing,
        }
    }
}

/// Playback position, rate and status of a room's current movie
#[derive(Debug)]
pub struct PlaybackState {
    inner: RwLock<Current>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Current {
                movie: None,
                seek: 0.0,
                rate: 1.0,
                playing: false,
                last_update: Instant::now(),
            }),
        }
    }

    /// Snapshot of the active movie.
    #[must_use]
    pub fn movie(&self) -> Option<Movie> {
        self.inner.read().movie.clone()
    }

    /// Extrapolated status at this instant.
    #[must_use]
    pub fn status(&self) -> Status {
        self.inner.write().normalize()
    }

    /// Active movie and its status, read under one lock.
    #[must_use]
    pub fn current(&self) -> (Option<Movie>, Status) {
        let mut current = self.inner.write();
        let status = current.normalize();
        (current.movie.clone(), status)
    }

    /// Switch to `movie` and rewind to the start.
    pub fn set_movie(&self, movie: Movie) -> Status {
        let mut current = self.inner.write();
        current.movie = Some(movie);
        if current.is_live() {
            return current.pin_live();
        }
        current.seek = 0.0;
        current.last_update = Instant::now();
        current.status()
    }

    /// Replace the active movie snapshot if `movie` is the active one,
    /// keeping the position. Returns whether it was replaced.
    pub fn refresh_movie(&self, movie: &Movie) -> bool {
        let mut current = self.inner.write();
        if current.movie.as_ref().map(|m| m.id) != Some(movie.id) {
            return false;
        }
        current.normalize();
        current.movie = Some(movie.clone());
        if current.is_live() {
            current.pin_live();
        }
        true
    }

    /// Apply a full status report from a client.
    ///
    /// `time_diff` is the estimated delay in seconds between the client
    /// capturing `seek` and the server receiving it. It is not clamped.
    pub fn set_status(&self, playing: bool, seek: f64, rate: f64, time_diff: f64) -> Status {
        let mut current = self.inner.write();
        if current.is_live() {
            return current.pin_live();
        }
        current.playing = playing;
        current.rate = rate;
        current.seek = if playing { seek + time_diff * rate } else { seek };
        current.last_update = Instant::now();
        current.status()
    }

    /// Change position and rate, keeping the playing flag.
    pub fn set_seek_rate(&self, seek: f64, rate: f64, time_diff: f64) -> Status {
        let mut current = self.inner.write();
        if current.is_live() {
            return current.pin_live();
        }
        current.seek = if current.playing {
            seek + time_diff * rate
        } else {
            seek
        };
        current.rate = rate;
        current.last_update = Instant::now();
        current.status()
    }

    /// Change position only, compensating with the current rate.
    pub fn set_seek(&self, seek: f64, time_diff: f64) -> Status {
        let mut current = self.inner.write();
        if current.is_live() {
            return current.pin_live();
        }
        current.seek = if current.playing {
            seek + time_diff * current.rate
        } else {
            seek
        };
        current.last_update = Instant::now();
        current.status()
    }
}
