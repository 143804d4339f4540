// Switch management HTTP client
//
// Wraps `reqwest::Client` with interface-scoped URL construction, basic
// auth and the status-code policy shared by every REST-managed switch:
// any response >= 400 that is not explicitly allowed is a fatal switch
// error carrying the raw body and reason text.

use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::{debug, error};
use url::Url;

use crate::auth::Credentials;
use crate::error::Error;
use crate::transport::TransportConfig;

/// Raw HTTP client for one switch's management API.
#[derive(Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
    timeout_secs: u64,
}

impl HttpClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the API root (e.g. `https://10.0.0.2/api/v1/`).
    pub fn new(
        base_url: Url,
        credentials: Credentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, credentials)?.with_timeout_secs(transport.timeout_secs()))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        credentials: Credentials,
    ) -> Result<Self, Error> {
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidUrl(
                url::ParseError::RelativeUrlWithCannotBeABaseBase,
            ));
        }
        Ok(Self {
            http,
            base_url,
            credentials,
            timeout_secs: 0,
        })
    }

    fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/interfaces/{interface}/{rest...}`.
    ///
    /// The interface label is pushed as a single, percent-encoded segment,
    /// so labels such as `gi1/0/4` survive intact.
    pub(crate) fn interface_url(&self, interface: &str, rest: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        {
            let Ok(mut segments) = url.path_segments_mut() else {
                return Err(Error::InvalidUrl(
                    url::ParseError::RelativeUrlWithCannotBeABaseBase,
                ));
            };
            segments.pop_if_empty().push("interfaces").push(interface);
            segments.extend(rest);
        }
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Issue one authenticated request.
    ///
    /// `acceptable` lists error statuses the caller treats as success
    /// (e.g. 404 when removing something already absent).
    pub(crate) async fn request(
        &self,
        method: Method,
        url: Url,
        form: Option<&[(&str, String)]>,
        acceptable: &[u16],
    ) -> Result<reqwest::Response, Error> {
        debug!(%method, %url, "switch request");

        let mut builder = self.credentials.apply(self.http.request(method, url));
        if let Some(form) = form {
            builder = builder.form(form);
        }

        let resp = builder.send().await.map_err(|e| self.map_transport(e))?;
        let status = resp.status();

        if status.as_u16() >= 400 && !acceptable.contains(&status.as_u16()) {
            let reason = status.canonical_reason().unwrap_or("").to_owned();
            let body = resp.text().await.unwrap_or_default();
            error!(
                status = status.as_u16(),
                %body,
                %reason,
                "Bad Request to switch"
            );
            return Err(Error::Switch {
                status: status.as_u16(),
                reason,
                body,
            });
        }

        Ok(resp)
    }

    /// Issue a GET and decode the JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        let resp = self.request(Method::GET, url, None, &[]).await?;
        let body = resp.text().await.map_err(|e| self.map_transport(e))?;
        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })
    }

    fn map_transport(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            Error::Transport(err)
        }
    }
}
