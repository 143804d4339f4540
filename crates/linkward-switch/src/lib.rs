// linkward-switch: vendor primitive set and drivers for managed switches

pub mod auth;
pub mod driver;
pub mod error;
pub mod http;
pub mod mock;
pub mod transport;

pub use auth::{Credentials, SwitchKind};
pub use driver::{MAX_VLAN_ID, MIN_VLAN_ID, Switch, SwitchDriver, VlanId, is_valid_vlan_id};
pub use error::Error;
pub use http::{HttpClient, HttpSession, HttpSwitch};
pub use mock::{MockCall, MockFailure, MockOp, MockPort, MockSwitch};
pub use transport::{TlsMode, TransportConfig};
