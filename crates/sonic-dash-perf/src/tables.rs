//! APPL_DB DASH table catalogue.
//!
//! Table names match the DASH schema in swss-common. The gNMI path
//! builders produce the paths understood by the SONiC gNMI server's
//! `sonic-db` origin.

use std::fmt;

/// APPL_DB table for appliances.
pub const APP_DASH_APPLIANCE_TABLE_NAME: &str = "DASH_APPLIANCE_TABLE";

/// APPL_DB table for VNETs.
pub const APP_DASH_VNET_TABLE_NAME: &str = "DASH_VNET_TABLE";

/// APPL_DB table for VNET address mappings.
pub const APP_DASH_VNET_MAPPING_TABLE_NAME: &str = "DASH_VNET_MAPPING_TABLE";

/// APPL_DB table for QoS profiles.
pub const APP_DASH_QOS_TABLE_NAME: &str = "DASH_QOS_TABLE";

/// APPL_DB table for ENIs.
pub const APP_DASH_ENI_TABLE_NAME: &str = "DASH_ENI_TABLE";

/// APPL_DB table for routes.
pub const APP_DASH_ROUTE_TABLE_NAME: &str = "DASH_ROUTE_TABLE";

/// gNMI path prefix for APPL_DB.
pub const GNMI_APPL_DB_PREFIX: &str = "/sonic-db:APPL_DB";

/// Field names used in DASH tables. The entry structs in
/// [`crate::types`] serialize to exactly these names.
pub mod fields {
    /// Appliance source IP.
    pub const SIP: &str = "sip";

    /// Appliance VM VNI.
    pub const VM_VNI: &str = "vm_vni";

    /// Object GUID (VNET).
    pub const GUID: &str = "guid";

    /// VXLAN network identifier.
    pub const VNI: &str = "vni";

    /// Mapping routing type.
    pub const ROUTING_TYPE: &str = "routing_type";

    /// Underlay IP address.
    pub const UNDERLAY_IP: &str = "underlay_ip";

    /// MAC address.
    pub const MAC_ADDRESS: &str = "mac_address";

    /// QoS profile identifier.
    pub const QOS_ID: &str = "qos_id";

    /// QoS bandwidth.
    pub const BW: &str = "bw";

    /// QoS connections per second.
    pub const CPS: &str = "cps";

    /// QoS flow count.
    pub const FLOWS: &str = "flows";

    /// ENI GUID.
    pub const ENI_ID: &str = "eni_id";

    /// ENI admin state.
    pub const ADMIN_STATE: &str = "admin_state";

    /// Owning VNET name.
    pub const VNET: &str = "vnet";

    /// QoS profile reference.
    pub const QOS: &str = "qos";

    /// Route action type.
    pub const ACTION_TYPE: &str = "action_type";
}

/// Routing type of every generated VNET mapping.
pub const ROUTING_TYPE_VNET_ENCAP: &str = "vnet_encap";

/// Action type of every generated route.
pub const ACTION_TYPE_VNET: &str = "vnet";

/// Admin state of every generated ENI.
pub const ADMIN_STATE_ENABLED: &str = "enabled";

/// Name of the single static QoS profile.
pub const QOS_NAME: &str = "qos100";

/// DASH tables written by the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DashTable {
    Appliance,
    Vnet,
    VnetMapping,
    Qos,
    Eni,
    Route,
}

impl DashTable {
    /// All tables in submission order.
    pub const ALL: [DashTable; 6] = [
        DashTable::Appliance,
        DashTable::Vnet,
        DashTable::VnetMapping,
        DashTable::Qos,
        DashTable::Eni,
        DashTable::Route,
    ];

    /// Returns the APPL_DB table name.
    pub fn name(&self) -> &'static str {
        match self {
            DashTable::Appliance => APP_DASH_APPLIANCE_TABLE_NAME,
            DashTable::Vnet => APP_DASH_VNET_TABLE_NAME,
            DashTable::VnetMapping => APP_DASH_VNET_MAPPING_TABLE_NAME,
            DashTable::Qos => APP_DASH_QOS_TABLE_NAME,
            DashTable::Eni => APP_DASH_ENI_TABLE_NAME,
            DashTable::Route => APP_DASH_ROUTE_TABLE_NAME,
        }
    }

    /// Returns the file name stem for documents of this table.
    pub fn file_stem(&self) -> &'static str {
        match self {
            DashTable::Appliance => "appliance",
            DashTable::Vnet => "vnet",
            DashTable::VnetMapping => "vnetmapping",
            DashTable::Qos => "qos",
            DashTable::Eni => "eni",
            DashTable::Route => "vnetroute",
        }
    }

    /// Returns the dependency tier this table is applied in.
    pub fn tier(&self) -> Tier {
        match self {
            DashTable::Appliance | DashTable::Vnet => Tier::Base,
            DashTable::VnetMapping | DashTable::Qos | DashTable::Eni => Tier::Bindings,
            DashTable::Route => Tier::Routes,
        }
    }

    /// Returns the file name for a document, `<stem>_<batch>.json` when
    /// batched and `<stem>.json` otherwise.
    pub fn file_name(&self, batch: Option<usize>) -> String {
        match batch {
            Some(batch) => format!("{}_{}.json", self.file_stem(), batch),
            None => format!("{}.json", self.file_stem()),
        }
    }
}

impl fmt::Display for DashTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Dependency tiers. Every table in a tier must be present on the device
/// before any table of a later tier is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    /// Appliances and VNETs.
    Base,
    /// VNET mappings, QoS profiles and ENIs.
    Bindings,
    /// Routes.
    Routes,
}

impl Tier {
    /// All tiers in dependency order.
    pub const ALL: [Tier; 3] = [Tier::Base, Tier::Bindings, Tier::Routes];

    /// Tables applied in this tier, in submission order.
    pub fn tables(&self) -> &'static [DashTable] {
        match self {
            Tier::Base => &[DashTable::Appliance, DashTable::Vnet],
            Tier::Bindings => &[DashTable::VnetMapping, DashTable::Qos, DashTable::Eni],
            Tier::Routes => &[DashTable::Route],
        }
    }

    /// Returns the tier name for logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Base => "base",
            Tier::Bindings => "bindings",
            Tier::Routes => "routes",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// gNMI update path replacing `table` from a local JSON file.
///
/// ```
/// use sonic_dash_perf::tables::{update_path, DashTable};
///
/// assert_eq!(
///     update_path(DashTable::Route, "vnetroute_1.json"),
///     "/sonic-db:APPL_DB/DASH_ROUTE_TABLE/:@vnetroute_1.json"
/// );
/// ```
pub fn update_path(table: DashTable, local_file: &str) -> String {
    format!("{}/{}/:@{}", GNMI_APPL_DB_PREFIX, table.name(), local_file)
}

/// gNMI delete path for a single entry. `/` inside the key is escaped as
/// `\/` so prefixes stay one path element.
pub fn delete_path(table: DashTable, key: &str) -> String {
    format!(
        "{}/{}/{}",
        GNMI_APPL_DB_PREFIX,
        table.name(),
        key.replace('/', "\\/")
    )
}
