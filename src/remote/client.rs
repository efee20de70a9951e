//! REST API client.

use reqwest::header::{AUTHORIZATION, USER_AGENT};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::runtime::Runtime;

use crate::pull::model::{Channel, Guild, Member, Message, PartialGuild, User};
use crate::pull::{DataSource, SourceError, SourceResult};

use super::{runtime, transport};

/// Blocking [`DataSource`] over the REST API.
///
/// `token` is sent verbatim as the `Authorization` header, so bot tokens
/// need their `Bot ` prefix.
pub struct HttpSource {
    runtime: Runtime,
    client: reqwest::Client,
    api_base: Url,
    token: String,
}

/// Error body returned by the API.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: Option<u64>,
    message: Option<String>,
}

impl HttpSource {
    /// # Errors
    ///
    /// Returns an error if `api_base` is not a URL or the runtime cannot
    /// start.
    pub fn new(api_base: &str, token: &str) -> SourceResult<Self> {
        let api_base = Url::parse(api_base)
            .map_err(|e| SourceError::Transport(format!("Invalid API base {api_base}: {e}")))?;
        Ok(Self {
            runtime: runtime()?,
            client: reqwest::Client::new(),
            api_base,
            token: token.to_string(),
        })
    }

    /// API URL for the given path segments. Segments are percent-encoded.
    fn url(&self, segments: &[&str]) -> SourceResult<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| SourceError::Transport(format!("Invalid API base {}", self.api_base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn get<T: DeserializeOwned>(&self, url: Url, query: &[(&str, String)]) -> SourceResult<T> {
        tracing::trace!(%url, ?query, "GET");
        self.runtime.block_on(async {
            let response = self
                .client
                .get(url)
                .header(AUTHORIZATION, &self.token)
                .header(USER_AGENT, concat!("pullcord/", env!("CARGO_PKG_VERSION")))
                .query(query)
                .send()
                .await
                .map_err(|e| transport(&e))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(api_error(status.as_u16(), &body));
            }

            response
                .json::<T>()
                .await
                .map_err(|e| SourceError::Decode(e.to_string()))
        })
    }
}

/// Build an API error from a status and response body.
fn api_error(status: u16, body: &str) -> SourceError {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => SourceError::Api {
            status,
            code: parsed.code,
            message: parsed.message.unwrap_or_else(|| body.to_string()),
        },
        Err(_) => SourceError::Api {
            status,
            code: None,
            message: body.to_string(),
        },
    }
}

fn paging(after: &str, limit: u32) -> [(&'static str, String); 2] {
    [("after", after.to_string()), ("limit", limit.to_string())]
}

impl DataSource for HttpSource {
    fn guilds(&mut self, after: &str, limit: u32) -> SourceResult<Vec<PartialGuild>> {
        self.get(self.url(&["users", "@me", "guilds"])?, &paging(after, limit))
    }

    fn guild(&mut self, guild_id: &str) -> SourceResult<Guild> {
        self.get(self.url(&["guilds", guild_id])?, &[])
    }

    fn channels(&mut self, guild_id: &str) -> SourceResult<Vec<Channel>> {
        self.get(self.url(&["guilds", guild_id, "channels"])?, &[])
    }

    fn members(&mut self, guild_id: &str, after: &str, limit: u32) -> SourceResult<Vec<Member>> {
        self.get(
            self.url(&["guilds", guild_id, "members"])?,
            &paging(after, limit),
        )
    }

    fn messages(&mut self, channel_id: &str, after: &str, limit: u32) -> SourceResult<Vec<Message>> {
        self.get(
            self.url(&["channels", channel_id, "messages"])?,
            &paging(after, limit),
        )
    }

    fn reaction_users(
        &mut self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
        limit: u32,
    ) -> SourceResult<Vec<User>> {
        self.get(
            self.url(&["channels", channel_id, "messages", message_id, "reactions", emoji])?,
            &[("limit", limit.to_string())],
        )
    }
}
