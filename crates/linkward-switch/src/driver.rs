// ── Vendor primitive set ──
//
// Concrete switch integrations implement the eight port primitives below
// and nothing else. The vendor-agnostic algorithms (modify / revert /
// inspect) live in `linkward-core` and are built only on this trait, so a
// driver that forgets a primitive fails to compile rather than failing at
// runtime.

use async_trait::async_trait;

use crate::auth::SwitchKind;
use crate::error::Error;

/// IEEE 802.1Q VLAN identifier.
pub type VlanId = u16;

/// Lowest assignable VLAN id.
pub const MIN_VLAN_ID: VlanId = 1;
/// Highest assignable VLAN id (4095 is reserved).
pub const MAX_VLAN_ID: VlanId = 4094;

/// Returns `true` if `id` may be configured on a port.
pub fn is_valid_vlan_id(id: VlanId) -> bool {
    (MIN_VLAN_ID..=MAX_VLAN_ID).contains(&id)
}

/// The port primitives every switch driver must provide.
///
/// Each call targets one interface, identified by its switch-local label
/// (e.g. `gi1/0/4`). An `Err` means the switch rejected the operation or
/// could not be reached; callers must assume no state change occurred.
#[async_trait]
pub trait SwitchDriver: Send + Sync {
    /// Make `vlan` the untagged VLAN of `interface`.
    async fn set_native_vlan(&self, interface: &str, vlan: VlanId) -> Result<(), Error>;

    /// Remove the untagged VLAN from `interface`.
    async fn remove_native_vlan(&self, interface: &str) -> Result<(), Error>;

    /// Add `vlan` to the tagged members of `interface`.
    async fn add_vlan_to_trunk(&self, interface: &str, vlan: VlanId) -> Result<(), Error>;

    /// Remove `vlan` from the tagged members of `interface`.
    async fn remove_vlan_from_trunk(&self, interface: &str, vlan: VlanId) -> Result<(), Error>;

    /// Remove every tagged VLAN from `interface`.
    async fn remove_all_vlans_from_trunk(&self, interface: &str) -> Result<(), Error>;

    /// The untagged VLAN of `interface`, if any.
    async fn get_native_vlan(&self, interface: &str) -> Result<Option<VlanId>, Error>;

    /// Tagged members of `interface` in the order the switch reports them.
    /// Never includes the native VLAN.
    async fn get_vlans(&self, interface: &str) -> Result<Vec<VlanId>, Error>;

    /// Administratively shut `interface` down.
    async fn shutdown_port(&self, interface: &str) -> Result<(), Error>;

    /// Release session-held resources. Stateless drivers have nothing to do.
    async fn disconnect(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// A configured switch that can open management sessions.
#[async_trait]
pub trait Switch: Send + Sync {
    /// Registry name of this switch.
    fn name(&self) -> &str;

    fn kind(&self) -> SwitchKind;

    /// Open a driver session. Connection-oriented vendors log in here;
    /// stateless ones hand back a cheap handle.
    async fn open(&self) -> Result<Box<dyn SwitchDriver>, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vlan_id_bounds() {
        assert!(!is_valid_vlan_id(0));
        assert!(is_valid_vlan_id(1));
        assert!(is_valid_vlan_id(4094));
        assert!(!is_valid_vlan_id(4095));
    }
}
