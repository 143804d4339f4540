use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::node::NicRef;

/// A physical switch interface: the owning switch's registry name plus
/// the switch-local label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortRef {
    pub switch: String,
    pub label: String,
}

impl PortRef {
    pub fn new(switch: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            switch: switch.into(),
            label: label.into(),
        }
    }

    /// Storage key. Switch names never contain `/`, so the first slash
    /// separates the two parts even when the label has slashes of its own.
    pub fn key(&self) -> String {
        format!("{}/{}", self.switch, self.label)
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.switch, self.label)
    }
}

impl FromStr for PortRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((switch, label)) if !switch.is_empty() && !label.is_empty() => {
                Ok(Self::new(switch, label))
            }
            _ => Err(format!("expected '<switch>/<port>', got '{s}'")),
        }
    }
}

/// A registered switch port and the Nic wired to it, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub port: PortRef,
    pub nic: Option<NicRef>,
}
