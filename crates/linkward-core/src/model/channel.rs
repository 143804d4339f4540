// ── Channel ──
//
// A channel names the VLAN role a network plays on a port: untagged
// (`vlan/native`) or tagged membership in one VLAN (`vlan/<n>`).

use std::fmt;
use std::str::FromStr;

use linkward_switch::{VlanId, is_valid_vlan_id};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const PREFIX: &str = "vlan/";
const NATIVE: &str = "vlan/native";

/// A port's VLAN role.
///
/// Ordered so that `Native` sorts before every tagged channel, which is
/// the order reconciliation results are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Channel {
    Native,
    Tagged(VlanId),
}

/// A channel string that is not `vlan/native` or `vlan/<1..=4094>`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed channel '{0}': expected 'vlan/native' or 'vlan/<id>'")]
pub struct ChannelParseError(pub String);

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => f.write_str(NATIVE),
            Self::Tagged(id) => write!(f, "{PREFIX}{id}"),
        }
    }
}

impl FromStr for Channel {
    type Err = ChannelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == NATIVE {
            return Ok(Self::Native);
        }
        let err = || ChannelParseError(s.to_owned());
        let digits = s.strip_prefix(PREFIX).ok_or_else(err)?;
        // Canonical decimal only: no sign, no leading zeros.
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) || digits.starts_with('0')
        {
            return Err(err());
        }
        let id: VlanId = digits.parse().map_err(|_| err())?;
        if is_valid_vlan_id(id) {
            Ok(Self::Tagged(id))
        } else {
            Err(err())
        }
    }
}

impl TryFrom<String> for Channel {
    type Error = ChannelParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Channel> for String {
    fn from(c: Channel) -> Self {
        c.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_native_and_tagged() {
        assert_eq!("vlan/native".parse::<Channel>().unwrap(), Channel::Native);
        assert_eq!("vlan/100".parse::<Channel>().unwrap(), Channel::Tagged(100));
    }

    #[test]
    fn rejects_malformed() {
        for bad in [
            "", "vlan/", "vlan/abc", "vlan/12abc", "vlan/-1", "vlan/0", "vlan/4095", "vlan/042",
            "VLAN/100", "trunk/100", "vlan/native ",
        ] {
            assert!(bad.parse::<Channel>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn display_is_canonical() {
        assert_eq!(Channel::Native.to_string(), "vlan/native");
        assert_eq!(Channel::Tagged(4094).to_string(), "vlan/4094");
    }

    #[test]
    fn native_sorts_first() {
        let mut channels = vec![Channel::Tagged(5), Channel::Native, Channel::Tagged(2)];
        channels.sort();
        assert_eq!(
            channels,
            vec![Channel::Native, Channel::Tagged(2), Channel::Tagged(5)]
        );
    }

    #[test]
    fn serializes_as_string_map_key() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(Channel::Tagged(100), "net1".to_owned());
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"vlan/100":"net1"}"#);
        let back: std::collections::BTreeMap<Channel, String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
