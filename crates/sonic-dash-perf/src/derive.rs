//! Deterministic address and identifier derivation.
//!
//! Every generated DASH object is addressed from a single integer index.
//! The index is split into three base-100 digits which become the low
//! octets of an IPv4 address, so indices `0..MAX_UNIQUE_INDEX` map to
//! distinct addresses within one base octet.
//!
//! Inputs at or above [`MAX_UNIQUE_INDEX`] wrap and alias earlier
//! addresses. The functions here do not reject them; range checks live in
//! [`crate::config::ScenarioConfig::validate`].

/// First index whose derived octets alias index `index - MAX_UNIQUE_INDEX`.
pub const MAX_UNIQUE_INDEX: u32 = 100 * 100 * 100;

/// Offset added to a base octet to produce the underlay (target) range.
pub const TARGET_OCTET_OFFSET: u16 = 100;

/// Largest base octet whose target range still fits in a single octet.
pub const MAX_BASE_OCTET: u8 = 99;

/// Base octet for appliance source addresses.
pub const APPLIANCE_BASE_OCTET: u8 = 10;

/// Fixed 9-character prefix of every ENI identifier.
pub const ENI_ID_PREFIX: &str = "F4939FEFC";

/// Splits an index into `(o1, o2, o3)` base-100 digits, least significant first.
///
/// ```
/// use sonic_dash_perf::derive::derive_octets;
///
/// assert_eq!(derive_octets(1), (1, 0, 0));
/// assert_eq!(derive_octets(123456), (56, 34, 12));
/// ```
pub const fn derive_octets(index: u32) -> (u8, u8, u8) {
    let o1 = (index % 100) as u8;
    let o2 = ((index / 100) % 100) as u8;
    let o3 = ((index / 10_000) % 100) as u8;
    (o1, o2, o3)
}

/// Splits an index into `(d1, d2, d3)` decimal digits, least significant first.
const fn derive_digits(index: u32) -> (u8, u8, u8) {
    let d1 = (index % 10) as u8;
    let d2 = ((index / 10) % 10) as u8;
    let d3 = ((index / 100) % 10) as u8;
    (d1, d2, d3)
}

fn dotted_quad(first: u16, index: u32) -> String {
    let (o1, o2, o3) = derive_octets(index);
    format!("{}.{}.{}.{}", first, o3, o2, o1)
}

/// Host route prefix for a route entry: `<base>.<o3>.<o2>.<o1>/32`.
pub fn route_address(base_octet: u8, index: u32) -> String {
    format!("{}/32", dotted_quad(u16::from(base_octet), index))
}

/// Overlay address of a VNET mapping entry.
pub fn mapping_address(base_octet: u8, index: u32) -> String {
    dotted_quad(u16::from(base_octet), index)
}

/// Underlay address paired with [`mapping_address`], offset by 100 in the
/// first octet.
///
/// The first octet is not clamped: a base above [`MAX_BASE_OCTET`] yields
/// a first component above 255.
pub fn target_address(base_octet: u8, index: u32) -> String {
    dotted_quad(u16::from(base_octet) + TARGET_OCTET_OFFSET, index)
}

/// Source address of an appliance.
pub fn appliance_address(index: u32) -> String {
    dotted_quad(u16::from(APPLIANCE_BASE_OCTET), index)
}

/// 12-character ENI identifier, e.g. `F4939FEFC001` for index 1.
///
/// Only the last three decimal digits of the index participate, so ENI
/// identifiers repeat every 1000 indices.
pub fn eni_id(index: u32) -> String {
    let (d1, d2, d3) = derive_digits(index);
    format!("{}{}{}{}", ENI_ID_PREFIX, d3, d2, d1)
}

/// MAC address of an ENI, e.g. `F4:93:9F:EF:C0:01` for index 1.
pub fn eni_mac(index: u32) -> String {
    let (d1, d2, d3) = derive_digits(index);
    format!("F4:93:9F:EF:C{}:{}{}", d3, d2, d1)
}

/// MAC address of a VNET mapping entry, e.g. `F4:93:9F:00:00:01`.
///
/// Each octet is the zero-padded decimal base-100 digit, which is always a
/// valid hex byte.
pub fn mapping_mac(index: u32) -> String {
    let (o1, o2, o3) = derive_octets(index);
    format!("F4:93:9F:{:02}:{:02}:{:02}", o3, o2, o1)
}

/// Round-robin owner assignment: `(entity_index % count) + 1`.
///
/// Returns a value in `[1, count]`. A `count` of zero is treated as one.
pub const fn vnet_index_for(entity_index: u32, count: u32) -> u32 {
    let count = if count == 0 { 1 } else { count };
    (entity_index % count) + 1
}

/// Name of the VNET with the given 1-based index.
pub fn vnet_name(index: u32) -> String {
    format!("Vnet{}", index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    #[test]
    fn test_derive_octets_scenarios() {
        assert_eq!(derive_octets(1), (1, 0, 0));
        assert_eq!(derive_octets(100), (0, 1, 0));
        assert_eq!(derive_octets(10_000), (0, 0, 1));
        assert_eq!(derive_octets(999_999), (99, 99, 99));
    }

    #[test]
    fn test_derive_octets_wraps_past_range() {
        assert_eq!(derive_octets(MAX_UNIQUE_INDEX), derive_octets(0));
        assert_eq!(derive_octets(MAX_UNIQUE_INDEX + 7), derive_octets(7));
    }

    #[test]
    fn test_octets_unique_over_full_range() {
        let mut seen = HashSet::with_capacity(MAX_UNIQUE_INDEX as usize);
        for index in 1..MAX_UNIQUE_INDEX {
            let octets = derive_octets(index);
            assert!(octets.0 < 100 && octets.1 < 100 && octets.2 < 100);
            assert!(seen.insert(octets), "index {} aliases", index);
        }
    }

    #[test]
    fn test_route_address() {
        assert_eq!(route_address(10, 1), "10.0.0.1/32");
        assert_eq!(route_address(20, 10_203), "20.1.2.3/32");
    }

    #[test]
    fn test_mapping_and_target_address() {
        assert_eq!(mapping_address(30, 42), "30.0.0.42");
        assert_eq!(target_address(30, 42), "130.0.0.42");
        assert_eq!(target_address(MAX_BASE_OCTET, 1), "199.0.0.1");
    }

    #[test]
    fn test_target_range_disjoint_from_mapping_range() {
        let mappings: HashSet<String> = (1..5000).map(|i| mapping_address(40, i)).collect();
        assert!((1..5000).all(|i| !mappings.contains(&target_address(40, i))));
    }

    #[test]
    fn test_appliance_address() {
        assert_eq!(appliance_address(1), "10.0.0.1");
        assert_eq!(appliance_address(250), "10.0.2.50");
    }

    #[test]
    fn test_eni_identifiers() {
        assert_eq!(eni_id(1), "F4939FEFC001");
        assert_eq!(eni_mac(1), "F4:93:9F:EF:C0:01");
        assert_eq!(eni_id(987), "F4939FEFC987");
        assert_eq!(eni_mac(987), "F4:93:9F:EF:C9:87");
        assert_eq!(eni_id(1).len(), 12);
        // Only three digits participate.
        assert_eq!(eni_id(1001), eni_id(1));
    }

    #[test]
    fn test_mapping_mac() {
        assert_eq!(mapping_mac(1), "F4:93:9F:00:00:01");
        assert_eq!(mapping_mac(123_456), "F4:93:9F:12:34:56");
    }

    #[test]
    fn test_vnet_index_for_range_and_period() {
        for count in 1..=7 {
            for i in 0..50 {
                let v = vnet_index_for(i, count);
                assert!((1..=count).contains(&v));
                assert_eq!(v, vnet_index_for(i + count, count));
            }
        }
        assert_eq!(vnet_index_for(5, 0), 1);
    }

    #[test]
    fn test_vnet_name() {
        assert_eq!(vnet_name(vnet_index_for(1, 1)), "Vnet1");
        assert_eq!(vnet_name(12), "Vnet12");
    }
}
