//! DASH entry types.
//!
//! Each struct is the field set of one APPL_DB entry. Serialized field
//! names match [`crate::tables::fields`].

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::derive;
use crate::tables::{ACTION_TYPE_VNET, ADMIN_STATE_ENABLED, QOS_NAME, ROUTING_TYPE_VNET_ENCAP};

/// Base added to a VNET index to form its VNI.
pub const VNET_VNI_BASE: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplianceEntry {
    pub sip: String,
    pub vm_vni: String,
}

impl ApplianceEntry {
    pub fn new(index: u32) -> Self {
        Self {
            sip: derive::appliance_address(index),
            vm_vni: index.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VnetEntry {
    pub guid: String,
    pub vni: String,
}

impl VnetEntry {
    pub fn new(index: u32, guid: String) -> Self {
        Self {
            guid,
            vni: (VNET_VNI_BASE + index).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VnetMappingEntry {
    pub routing_type: String,
    pub underlay_ip: String,
    pub mac_address: String,
}

impl VnetMappingEntry {
    pub fn new(base_octet: u8, index: u32) -> Self {
        Self {
            routing_type: ROUTING_TYPE_VNET_ENCAP.to_string(),
            underlay_ip: derive::target_address(base_octet, index),
            mac_address: derive::mapping_mac(index),
        }
    }
}

/// The static QoS profile referenced by every ENI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QosEntry {
    pub qos_id: String,
    pub bw: String,
    pub cps: String,
    pub flows: String,
}

impl Default for QosEntry {
    fn default() -> Self {
        Self {
            qos_id: QOS_NAME.to_string(),
            bw: "10000".to_string(),
            cps: "1000".to_string(),
            flows: "10".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EniEntry {
    pub eni_id: String,
    pub mac_address: String,
    pub underlay_ip: String,
    pub admin_state: String,
    pub vnet: String,
    pub qos: String,
}

impl EniEntry {
    pub fn new(base_octet: u8, index: u32, vnet: String, guid: String) -> Self {
        Self {
            eni_id: guid,
            mac_address: derive::eni_mac(index),
            underlay_ip: derive::target_address(base_octet, index),
            admin_state: ADMIN_STATE_ENABLED.to_string(),
            vnet,
            qos: QOS_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub action_type: String,
    pub vnet: String,
}

impl RouteEntry {
    pub fn new(vnet: String) -> Self {
        Self {
            action_type: ACTION_TYPE_VNET.to_string(),
            vnet,
        }
    }
}

/// Source of GUIDs for VNET and ENI entries.
///
/// `Seeded` yields the same sequence for the same seed, which keeps
/// generated documents byte-for-byte reproducible in tests.
#[derive(Debug, Clone)]
pub enum GuidGenerator {
    Random,
    Seeded(StdRng),
}

impl GuidGenerator {
    pub fn random() -> Self {
        GuidGenerator::Random
    }

    pub fn seeded(seed: u64) -> Self {
        GuidGenerator::Seeded(StdRng::seed_from_u64(seed))
    }

    /// Returns the next version 4 GUID in hyphenated form.
    pub fn next_guid(&mut self) -> String {
        match self {
            GuidGenerator::Random => Uuid::new_v4().to_string(),
            GuidGenerator::Seeded(rng) => {
                let mut bytes = [0u8; 16];
                rng.fill_bytes(&mut bytes);
                uuid::Builder::from_random_bytes(bytes)
                    .into_uuid()
                    .to_string()
            }
        }
    }
}

impl Default for GuidGenerator {
    fn default() -> Self {
        GuidGenerator::random()
    }
}
