// REST-managed switch driver.
//
// One authenticated request per primitive. Removal primitives tolerate
// 404 so that resets stay idempotent; everything else follows the
// client's fatal-on-error policy.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use tracing::trace;
use url::Url;

use super::client::HttpClient;
use crate::auth::{Credentials, SwitchKind};
use crate::driver::{Switch, SwitchDriver, VlanId, is_valid_vlan_id};
use crate::error::Error;
use crate::transport::TransportConfig;

const NOT_FOUND: u16 = 404;

#[derive(Debug, Deserialize)]
struct NativeVlanResponse {
    vlan: Option<VlanId>,
}

#[derive(Debug, Deserialize)]
struct TrunkResponse {
    #[serde(default)]
    vlans: Vec<VlanId>,
}

// ── Switch ───────────────────────────────────────────────────────────

/// A switch managed through its REST API.
pub struct HttpSwitch {
    name: String,
    client: HttpClient,
    acceptable_error_codes: Vec<u16>,
}

impl HttpSwitch {
    pub fn new(
        name: impl Into<String>,
        base_url: Url,
        credentials: Credentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        Ok(Self::from_client(
            name,
            HttpClient::new(base_url, credentials, transport)?,
        ))
    }

    pub fn from_client(name: impl Into<String>, client: HttpClient) -> Self {
        Self {
            name: name.into(),
            client,
            acceptable_error_codes: Vec::new(),
        }
    }

    /// Extra error statuses every request on this switch treats as success.
    #[must_use]
    pub fn with_acceptable_error_codes(mut self, codes: Vec<u16>) -> Self {
        self.acceptable_error_codes = codes;
        self
    }

    /// A session handle sharing this switch's HTTP client.
    pub fn session(&self) -> HttpSession {
        HttpSession {
            client: self.client.clone(),
            acceptable: self.acceptable_error_codes.clone(),
        }
    }
}

#[async_trait]
impl Switch for HttpSwitch {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SwitchKind {
        SwitchKind::Http
    }

    async fn open(&self) -> Result<Box<dyn SwitchDriver>, Error> {
        Ok(Box::new(self.session()))
    }
}

// ── Session ──────────────────────────────────────────────────────────

/// Stateless driver session: every primitive is an independent request.
pub struct HttpSession {
    client: HttpClient,
    acceptable: Vec<u16>,
}

impl HttpSession {
    fn allowed(&self, extra: &[u16]) -> Vec<u16> {
        let mut codes = self.acceptable.clone();
        codes.extend_from_slice(extra);
        codes
    }

    async fn send(
        &self,
        method: Method,
        interface: &str,
        rest: &[&str],
        form: Option<&[(&str, String)]>,
        extra_ok: &[u16],
    ) -> Result<(), Error> {
        let url = self.client.interface_url(interface, rest)?;
        self.client
            .request(method, url, form, &self.allowed(extra_ok))
            .await?;
        Ok(())
    }
}

fn checked(vlan: VlanId) -> Result<VlanId, Error> {
    if is_valid_vlan_id(vlan) {
        Ok(vlan)
    } else {
        Err(Error::Malformed {
            message: format!("switch reported VLAN id {vlan} outside 1..=4094"),
        })
    }
}

#[async_trait]
impl SwitchDriver for HttpSession {
    async fn set_native_vlan(&self, interface: &str, vlan: VlanId) -> Result<(), Error> {
        let form = [("vlan", vlan.to_string())];
        self.send(Method::PUT, interface, &["native-vlan"], Some(&form), &[])
            .await
    }

    async fn remove_native_vlan(&self, interface: &str) -> Result<(), Error> {
        self.send(Method::DELETE, interface, &["native-vlan"], None, &[NOT_FOUND])
            .await
    }

    async fn add_vlan_to_trunk(&self, interface: &str, vlan: VlanId) -> Result<(), Error> {
        let form = [("vlan", vlan.to_string())];
        self.send(Method::POST, interface, &["trunk"], Some(&form), &[])
            .await
    }

    async fn remove_vlan_from_trunk(&self, interface: &str, vlan: VlanId) -> Result<(), Error> {
        let vlan = vlan.to_string();
        self.send(Method::DELETE, interface, &["trunk", &vlan], None, &[NOT_FOUND])
            .await
    }

    async fn remove_all_vlans_from_trunk(&self, interface: &str) -> Result<(), Error> {
        self.send(Method::DELETE, interface, &["trunk"], None, &[])
            .await
    }

    async fn get_native_vlan(&self, interface: &str) -> Result<Option<VlanId>, Error> {
        let url = self.client.interface_url(interface, &["native-vlan"])?;
        let resp: NativeVlanResponse = self.client.get_json(url).await?;
        trace!(interface, vlan = ?resp.vlan, "native vlan");
        resp.vlan.map(checked).transpose()
    }

    async fn get_vlans(&self, interface: &str) -> Result<Vec<VlanId>, Error> {
        let url = self.client.interface_url(interface, &["trunk"])?;
        let resp: TrunkResponse = self.client.get_json(url).await?;
        trace!(interface, vlans = ?resp.vlans, "trunk members");
        resp.vlans.into_iter().map(checked).collect()
    }

    async fn shutdown_port(&self, interface: &str) -> Result<(), Error> {
        self.send(Method::POST, interface, &["shutdown"], None, &[])
            .await
    }
}
