//! Client for the remote Podcast Service.
//!
//! The tracker only needs one call, bumping the view counter once a view has
//! been earned. The rest is what a player renders around the video: the
//! podcast's own metadata and the paged listing. The models mirror the JSON the service emits (camelCase keys).

use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task;
use tracing::debug;

use crate::{
    config::RuntimeConfig,
    tracker::{ReportFuture, ViewReporter},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSimple {
    pub id: String,
    #[serde(default)]
    pub fullname: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub follow: bool,
    #[serde(default)]
    pub total_follower: u64,
    #[serde(default)]
    pub total_following: u64,
    #[serde(default)]
    pub total_post: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreSimple {
    pub id: String,
    pub name: String,
}

/// A podcast as returned by the detail endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Podcast {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub video_url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<GenreSimple>,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub total_likes: u64,
    #[serde(default)]
    pub total_comments: u64,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_day: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_edited: Option<NaiveDateTime>,
    pub user: UserSimple,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub liked: bool,
}

/// One page of a podcast listing, as returned by `GET api/v1/podcasts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodcastPage {
    pub podcasts: Vec<Podcast>,
    pub total_pages: u32,
    pub current_page: u32,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid podcast id {0:?}")]
    InvalidId(String),
    #[error("podcast service answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("podcast service unreachable: {0}")]
    Transport(String),
    #[error("decoding podcast service response")]
    Decode(#[source] std::io::Error),
}

impl From<ureq::Error> for ServiceError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, response) => ServiceError::Status {
                status,
                body: response.into_string().unwrap_or_default(),
            },
            ureq::Error::Transport(transport) => ServiceError::Transport(transport.to_string()),
        }
    }
}

/// Blocking HTTP client. Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct PodcastClient {
    base_url: String,
    token: Option<String>,
    agent: ureq::Agent,
}

impl PodcastClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Option<Duration>) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            agent: builder.build(),
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(
            config.api_base_url.clone(),
            config.api_token.clone(),
            config.request_timeout,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Counts one view for `podcast_id`. The response body is ignored.
    pub fn increment_views(&self, podcast_id: &str) -> Result<(), ServiceError> {
        let url = self.podcast_url(podcast_id, "/views")?;
        debug!(%url, "incrementing podcast views");
        self.authorize(self.agent.post(&url)).call()?;
        Ok(())
    }

    pub fn get_podcast(&self, podcast_id: &str) -> Result<Podcast, ServiceError> {
        let url = self.podcast_url(podcast_id, "")?;
        debug!(%url, "fetching podcast");
        let response = self.authorize(self.agent.get(&url)).call()?;
        response.into_json().map_err(ServiceError::Decode)
    }

    /// One page of the podcast listing. Pages are zero-based.
    pub fn list_podcasts(&self, page: u32) -> Result<PodcastPage, ServiceError> {
        let url = format!("{}/api/v1/podcasts", self.base_url);
        debug!(%url, page, "listing podcasts");
        let request = self.agent.get(&url).query("page", &page.to_string());
        let response = self.authorize(request).call()?;
        response.into_json().map_err(ServiceError::Decode)
    }

    fn podcast_url(&self, podcast_id: &str, suffix: &str) -> Result<String, ServiceError> {
        if podcast_id.is_empty() || podcast_id.contains(['/', '?', '#']) {
            return Err(ServiceError::InvalidId(podcast_id.to_string()));
        }
        Ok(format!(
            "{}/api/v1/podcasts/{}{}",
            self.base_url, podcast_id, suffix
        ))
    }

    fn authorize(&self, request: ureq::Request) -> ureq::Request {
        match &self.token {
            Some(token) => request.set("Authorization", &format!("Bearer {token}")),
            None => request,
        }
    }
}

impl ViewReporter for PodcastClient {
    fn report_view(&self, podcast_id: &str) -> ReportFuture {
        let client = self.clone();
        let podcast_id = podcast_id.to_owned();
        Box::pin(async move {
            task::spawn_blocking(move || client.increment_views(&podcast_id))
                .await
                .context("view report task panicked")??;
            Ok(())
        })
    }
}
