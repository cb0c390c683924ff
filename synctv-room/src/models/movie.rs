use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

use super::id::{MovieId, UserId};
use crate::{Error, Result};

/// Caller supplied part of a movie: where it comes from and how to play it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseMovie {
    pub url: String,
    pub name: String,
    pub live: bool,
    pub proxy: bool,
    pub rtmp_source: bool,
    /// Media type tag passed through to players (e.g. "m3u8", "flv")
    pub media_type: String,
    pub headers: HashMap<String, String>,
}

impl BaseMovie {
    /// Check flag combinations and the url.
    ///
    /// RTMP-sourced movies are pushed to the server, so they carry no url and
    /// are always live.
    pub fn validate(&mut self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::InvalidInput("movie name is empty".to_string()));
        }
        if self.rtmp_source && self.proxy {
            return Err(Error::InvalidInput(
                "rtmp source and proxy are mutually exclusive".to_string(),
            ));
        }
        if self.rtmp_source {
            self.live = true;
            self.url.clear();
            return Ok(());
        }

        let url = Url::parse(&self.url)
            .map_err(|e| Error::InvalidInput(format!("invalid movie url: {e}")))?;

        if self.proxy {
            let allowed = match url.scheme() {
                "http" | "https" => true,
                "rtmp" => self.live,
                _ => false,
            };
            if !allowed {
                return Err(Error::InvalidInput(format!(
                    "scheme {} cannot be proxied",
                    url.scheme()
                )));
            }
        }
        Ok(())
    }

    /// Whether the movie is served through a server-side live channel.
    #[must_use]
    pub const fn needs_live_channel(&self) -> bool {
        self.rtmp_source || (self.live && self.proxy)
    }
}

/// A playlist entry owned by a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub base: BaseMovie,
    /// Opaque stream key, set when the movie needs a live channel
    pub pull_key: Option<String>,
    /// Weak reference, resolved through the owning room's user registry
    pub creator_id: UserId,
    pub created_at: DateTime<Utc>,
    pub last_edit_at: DateTime<Utc>,
}

impl Movie {
    /// Validate `base` and build a movie with the given id.
    pub fn new(id: MovieId, mut base: BaseMovie, creator_id: UserId) -> Result<Self> {
        base.validate()?;
        let now = Utc::now();
        let pull_key = base
            .needs_live_channel()
            .then(|| uuid::Uuid::new_v4().simple().to_string());
        Ok(Self {
            id,
            base,
            pull_key,
            creator_id,
            created_at: now,
            last_edit_at: now,
        })
    }

    /// Replace the base info, keeping id, creator and creation time.
    ///
    /// The pull key is kept when the movie still needs a live channel and
    /// regenerated or dropped otherwise.
    pub fn edit(&mut self, mut base: BaseMovie) -> Result<()> {
        base.validate()?;
        self.pull_key = match (base.needs_live_channel(), self.pull_key.take()) {
            (true, Some(key)) => Some(key),
            (true, None) => Some(uuid::Uuid::new_v4().simple().to_string()),
            (false, _) => None,
        };
        self.base = base;
        self.last_edit_at = Utc::now();
        Ok(())
    }

    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.base.live
    }

    /// Presentation copy for `viewer`.
    ///
    /// Headers of proxied movies may carry upstream credentials, so only the
    /// creator sees them.
    #[must_use]
    pub fn to_info(&self, creator: Option<String>, viewer: Option<&UserId>) -> MovieInfo {
        let mut base = self.base.clone();
        if base.proxy && viewer != Some(&self.creator_id) {
            base.headers.clear();
        }
        MovieInfo {
            id: self.id,
            base,
            pull_key: self.pull_key.clone(),
            creator: creator.unwrap_or_default(),
            creator_id: self.creator_id.clone(),
            created_at: self.created_at,
            last_edit_at: self.last_edit_at,
        }
    }
}

/// Serializable movie view for API and persistence layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieInfo {
    pub id: MovieId,
    #[serde(flatten)]
    pub base: BaseMovie,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_key: Option<String>,
    pub creator: String,
    pub creator_id: UserId,
    pub created_at: DateTime<Utc>,
    pub last_edit_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(url: &str) -> BaseMovie {
        BaseMovie {
            url: url.to_string(),
            name: "movie".to_string(),
            ..BaseMovie::default()
        }
    }

    #[test]
    fn test_url_must_parse() {
        assert!(Movie::new(MovieId(1), base("not a url"), UserId::new()).is_err());
        assert!(Movie::new(MovieId(1), base("https://example.com/a.mp4"), UserId::new()).is_ok());
    }

    #[test]
    fn test_name_required() {
        let mut b = base("https://example.com/a.mp4");
        b.name.clear();
        assert!(matches!(b.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_rtmp_source_is_live_without_url() {
        let b = BaseMovie {
            name: "stream".to_string(),
            rtmp_source: true,
            ..BaseMovie::default()
        };
        let movie = Movie::new(MovieId(3), b, UserId::new()).unwrap();
        assert!(movie.is_live());
        assert!(movie.base.url.is_empty());
        assert!(movie.pull_key.is_some());
    }

    #[test]
    fn test_rtmp_source_and_proxy_rejected() {
        let b = BaseMovie {
            name: "stream".to_string(),
            rtmp_source: true,
            proxy: true,
            ..BaseMovie::default()
        };
        assert!(Movie::new(MovieId(1), b, UserId::new()).is_err());
    }

    #[test]
    fn test_proxy_scheme_rules() {
        let mut b = base("rtmp://example.com/live/a");
        b.proxy = true;
        assert!(b.clone().validate().is_err());

        b.live = true;
        assert!(b.clone().validate().is_ok());

        let mut b = base("ftp://example.com/a.mp4");
        b.proxy = true;
        assert!(b.validate().is_err());
    }

    #[test]
    fn test_live_proxy_gets_pull_key_plain_url_does_not() {
        let mut b = base("https://example.com/live.m3u8");
        b.live = true;
        b.proxy = true;
        assert!(Movie::new(MovieId(1), b, UserId::new()).unwrap().pull_key.is_some());

        let plain = Movie::new(MovieId(2), base("https://example.com/a.mp4"), UserId::new()).unwrap();
        assert!(plain.pull_key.is_none());
    }

    #[test]
    fn test_headers_redacted_for_non_creator_on_proxy() {
        let creator = UserId::new();
        let other = UserId::new();
        let mut b = base("https://example.com/a.mp4");
        b.proxy = true;
        b.headers.insert("Authorization".to_string(), "secret".to_string());
        let movie = Movie::new(MovieId(1), b, creator.clone()).unwrap();

        let own = movie.to_info(Some("alice".to_string()), Some(&creator));
        assert_eq!(own.base.headers.len(), 1);
        assert_eq!(own.creator, "alice");

        let foreign = movie.to_info(Some("alice".to_string()), Some(&other));
        assert!(foreign.base.headers.is_empty());

        let anonymous = movie.to_info(None, None);
        assert!(anonymous.base.headers.is_empty());
        assert!(anonymous.creator.is_empty());
    }

    #[test]
    fn test_edit_keeps_identity_and_reissues_pull_key() {
        let creator = UserId::new();
        let mut movie = Movie::new(MovieId(9), base("https://example.com/a.mp4"), creator.clone()).unwrap();
        let created_at = movie.created_at;

        let mut live = base("https://example.com/live.flv");
        live.live = true;
        live.proxy = true;
        movie.edit(live).unwrap();
        assert_eq!(movie.id, MovieId(9));
        assert_eq!(movie.creator_id, creator);
        assert_eq!(movie.created_at, created_at);
        let key = movie.pull_key.clone().unwrap();

        let mut renamed = movie.base.clone();
        renamed.name = "renamed".to_string();
        movie.edit(renamed).unwrap();
        assert_eq!(movie.pull_key.as_deref(), Some(key.as_str()));

        movie.edit(base("https://example.com/b.mp4")).unwrap();
        assert!(movie.pull_key.is_none());
    }

    #[test]
    fn test_movie_info_serializes_flat() {
        let movie = Movie::new(MovieId(4), base("https://example.com/a.mp4"), UserId::new()).unwrap();
        let json = serde_json::to_value(movie.to_info(Some("bob".to_string()), None)).unwrap();
        assert_eq!(json["id"], 4);
        assert_eq!(json["url"], "https://example.com/a.mp4");
        assert_eq!(json["creator"], "bob");
        assert!(json.get("pull_key").is_none());
    }
}
