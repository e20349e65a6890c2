//! Batch document assembler.
//!
//! Builds one JSON object per table (or per batch of a table), mapping each
//! generated key to its entry. Documents are always built fresh and written
//! whole; nothing is patched in place.

use crate::config::ScenarioConfig;
use crate::derive::{self, vnet_index_for, vnet_name};
use crate::error::{DashPerfError, DashPerfResult};
use crate::tables::{DashTable, QOS_NAME};
use crate::types::{
    ApplianceEntry, EniEntry, GuidGenerator, QosEntry, RouteEntry, VnetEntry, VnetMappingEntry,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One table document: an object of `key -> entry fields`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDocument {
    table: DashTable,
    batch: Option<usize>,
    entries: Map<String, Value>,
}

impl TableDocument {
    pub fn new(table: DashTable, batch: Option<usize>) -> Self {
        Self {
            table,
            batch,
            entries: Map::new(),
        }
    }

    /// Adds an entry. A key already present is an error.
    pub fn insert<T: Serialize>(&mut self, key: String, entry: &T) -> DashPerfResult<()> {
        let value = serde_json::to_value(entry).map_err(|source| DashPerfError::Serialize {
            table: self.table,
            source,
        })?;
        if self.entries.contains_key(&key) {
            return Err(DashPerfError::DuplicateKey {
                table: self.table,
                key,
            });
        }
        self.entries.insert(key, value);
        Ok(())
    }

    pub fn table(&self) -> DashTable {
        self.table
    }

    pub fn batch(&self) -> Option<usize> {
        self.batch
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn file_name(&self) -> String {
        self.table.file_name(self.batch)
    }

    /// Serializes the document as a JSON object.
    pub fn to_json(&self) -> DashPerfResult<String> {
        serde_json::to_string_pretty(&self.entries).map_err(|source| DashPerfError::Serialize {
            table: self.table,
            source,
        })
    }

    /// Writes the document into `dir`, replacing any previous file.
    pub fn write_to(&self, dir: &Path) -> DashPerfResult<WrittenDocument> {
        let path = dir.join(self.file_name());
        fs::write(&path, self.to_json()?).map_err(|e| DashPerfError::io(&path, e))?;
        debug!(
            table = %self.table,
            path = %path.display(),
            entries = self.len(),
            "Wrote document"
        );
        Ok(WrittenDocument {
            table: self.table,
            batch: self.batch,
            path,
            keys: self.entries.keys().cloned().collect(),
        })
    }
}

/// A document that has been written to disk and is ready to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenDocument {
    pub table: DashTable,
    pub batch: Option<usize>,
    pub path: PathBuf,
    pub keys: Vec<String>,
}

impl WrittenDocument {
    pub fn entry_count(&self) -> usize {
        self.keys.len()
    }
}

/// Splits indices `1..=count` into `batches` contiguous ranges whose sizes
/// differ by at most one. Earlier ranges take the remainder.
///
/// ```
/// use sonic_dash_perf::assembler::batch_ranges;
///
/// assert_eq!(batch_ranges(10, 3), vec![1..5, 5..8, 8..11]);
/// ```
pub fn batch_ranges(count: u32, batches: u32) -> Vec<Range<u32>> {
    if count == 0 || batches == 0 {
        return Vec::new();
    }
    let batches = batches.min(count);
    let size = count / batches;
    let remainder = count % batches;

    let mut ranges = Vec::with_capacity(batches as usize);
    let mut start = 1;
    for b in 0..batches {
        let len = size + u32::from(b < remainder);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}

/// Assembles DASH table documents for a scenario.
#[derive(Debug)]
pub struct DocumentAssembler {
    base_octet: u8,
    appliance_count: u32,
    vnet_count: u32,
    eni_count: u32,
    guids: GuidGenerator,
}

impl DocumentAssembler {
    pub fn new(config: &ScenarioConfig, guids: GuidGenerator) -> Self {
        Self {
            base_octet: config.base_address_offset,
            appliance_count: config.appliance_count,
            vnet_count: config.vnet_count,
            eni_count: config.eni_count,
            guids,
        }
    }

    pub fn appliances(&mut self) -> DashPerfResult<TableDocument> {
        let mut doc = TableDocument::new(DashTable::Appliance, None);
        for index in 1..=self.appliance_count {
            doc.insert(index.to_string(), &ApplianceEntry::new(index))?;
        }
        Ok(doc)
    }

    pub fn vnets(&mut self) -> DashPerfResult<TableDocument> {
        let mut doc = TableDocument::new(DashTable::Vnet, None);
        for index in 1..=self.vnet_count {
            let guid = self.guids.next_guid();
            doc.insert(vnet_name(index), &VnetEntry::new(index, guid))?;
        }
        Ok(doc)
    }

    pub fn qos(&self) -> DashPerfResult<TableDocument> {
        let mut doc = TableDocument::new(DashTable::Qos, None);
        doc.insert(QOS_NAME.to_string(), &QosEntry::default())?;
        Ok(doc)
    }

    pub fn enis(&mut self) -> DashPerfResult<TableDocument> {
        let mut doc = TableDocument::new(DashTable::Eni, None);
        for index in 1..=self.eni_count {
            let vnet = vnet_name(vnet_index_for(index, self.vnet_count));
            let guid = self.guids.next_guid();
            doc.insert(
                derive::eni_id(index),
                &EniEntry::new(self.base_octet, index, vnet, guid),
            )?;
        }
        Ok(doc)
    }

    /// Mapping entries for `indices`, keyed `<vnet>:<overlay address>`.
    pub fn vnet_mappings(
        &self,
        indices: Range<u32>,
        batch: Option<usize>,
    ) -> DashPerfResult<TableDocument> {
        let mut doc = TableDocument::new(DashTable::VnetMapping, batch);
        for index in indices {
            let vnet = vnet_name(vnet_index_for(index, self.vnet_count));
            let key = format!("{}:{}", vnet, derive::mapping_address(self.base_octet, index));
            doc.insert(key, &VnetMappingEntry::new(self.base_octet, index))?;
        }
        Ok(doc)
    }

    /// Route entries for `indices`, keyed `<eni id>:<prefix>`.
    pub fn routes(
        &self,
        indices: Range<u32>,
        batch: Option<usize>,
    ) -> DashPerfResult<TableDocument> {
        let mut doc = TableDocument::new(DashTable::Route, batch);
        for index in indices {
            let eni = derive::eni_id(vnet_index_for(index, self.eni_count));
            let vnet = vnet_name(vnet_index_for(index, self.vnet_count));
            let key = format!("{}:{}", eni, derive::route_address(self.base_octet, index));
            doc.insert(key, &RouteEntry::new(vnet))?;
        }
        Ok(doc)
    }

    /// Builds every document of a scenario in submission order.
    pub fn build_all(&mut self, config: &ScenarioConfig) -> DashPerfResult<Vec<TableDocument>> {
        let mut docs = vec![self.appliances()?, self.vnets()?];

        let mapping_ranges = batch_ranges(config.mapping_count, config.mapping_batches());
        let batched = mapping_ranges.len() > 1;
        for (i, range) in mapping_ranges.into_iter().enumerate() {
            docs.push(self.vnet_mappings(range, batched.then_some(i + 1))?);
        }

        docs.push(self.qos()?);
        docs.push(self.enis()?);

        let route_ranges = batch_ranges(config.route_count, config.route_batches());
        let batched = route_ranges.len() > 1;
        for (i, range) in route_ranges.into_iter().enumerate() {
            docs.push(self.routes(range, batched.then_some(i + 1))?);
        }

        info!(
            scenario = %config.name,
            documents = docs.len(),
            routes = config.route_count,
            mappings = config.mapping_count,
            "Assembled scenario documents"
        );
        Ok(docs)
    }
}

/// Generates every document of `config` and writes them into `dir`.
pub fn generate_scenario(
    config: &ScenarioConfig,
    guids: GuidGenerator,
    dir: &Path,
) -> DashPerfResult<Vec<WrittenDocument>> {
    fs::create_dir_all(dir).map_err(|e| DashPerfError::io(dir, e))?;
    let mut assembler = DocumentAssembler::new(config, guids);
    assembler
        .build_all(config)?
        .iter()
        .map(|doc| doc.write_to(dir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn assembler(vnet_count: u32, eni_count: u32) -> DocumentAssembler {
        let config = ScenarioConfig {
            vnet_count,
            eni_count,
            ..ScenarioConfig::default()
        };
        DocumentAssembler::new(&config, GuidGenerator::seeded(7))
    }

    #[test]
    fn test_batch_ranges_even_and_uneven() {
        assert_eq!(batch_ranges(1000, 1), vec![1..1001]);
        assert_eq!(batch_ranges(9, 3), vec![1..4, 4..7, 7..10]);
        assert_eq!(batch_ranges(10, 4), vec![1..4, 4..7, 7..9, 9..11]);
        assert_eq!(batch_ranges(2, 5), vec![1..2, 2..3]);
        assert!(batch_ranges(0, 3).is_empty());
    }

    #[test]
    fn test_batch_ranges_cover_every_index_once() {
        let ranges = batch_ranges(12_345, 17);
        let total: u32 = ranges.iter().map(|r| r.end - r.start).sum();
        assert_eq!(total, 12_345);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(ranges.first().unwrap().start, 1);
        assert_eq!(ranges.last().unwrap().end, 12_346);
    }

    #[test]
    fn test_route_batch_single_vnet() {
        let doc = assembler(1, 1).routes(1..1001, None).unwrap();
        assert_eq!(doc.len(), 1000);

        let keys: HashSet<&String> = doc.keys().collect();
        assert_eq!(keys.len(), 1000);

        let parsed: Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        let members = parsed.as_object().unwrap();
        assert_eq!(members.len(), 1000);
        assert!(members.values().all(|v| v["vnet"] == "Vnet1"));
        assert_eq!(
            members["F4939FEFC001:10.0.0.1/32"],
            json!({"action_type": "vnet", "vnet": "Vnet1"})
        );
    }

    #[test]
    fn test_routes_round_robin_vnets_and_enis() {
        let doc = assembler(3, 2).routes(1..7, None).unwrap();
        // index 1 -> vnet (1 % 3) + 1 = 2, eni (1 % 2) + 1 = 2
        assert_eq!(doc.get("F4939FEFC002:10.0.0.1/32").unwrap()["vnet"], "Vnet2");
        // index 3 -> vnet 1, eni 2
        assert_eq!(doc.get("F4939FEFC002:10.0.0.3/32").unwrap()["vnet"], "Vnet1");
        // index 4 -> vnet 2, eni 1
        assert_eq!(doc.get("F4939FEFC001:10.0.0.4/32").unwrap()["vnet"], "Vnet2");
    }

    #[test]
    fn test_vnet_mappings() {
        let doc = assembler(2, 1).vnet_mappings(1..101, Some(1)).unwrap();
        assert_eq!(doc.len(), 100);
        assert_eq!(doc.file_name(), "vnetmapping_1.json");
        assert_eq!(
            doc.get("Vnet2:10.0.0.1").unwrap(),
            &json!({
                "routing_type": "vnet_encap",
                "underlay_ip": "110.0.0.1",
                "mac_address": "F4:93:9F:00:00:01"
            })
        );
        assert!(doc.get("Vnet1:10.0.0.2").is_some());
    }

    #[test]
    fn test_vnets_and_enis_reference_each_other() {
        let mut asm = assembler(2, 4);
        let vnets = asm.vnets().unwrap();
        let enis = asm.enis().unwrap();
        let vnet_keys: HashSet<&String> = vnets.keys().collect();
        assert_eq!(vnet_keys.len(), 2);
        for key in enis.keys() {
            let vnet = enis.get(key).unwrap()["vnet"].as_str().unwrap().to_string();
            assert!(vnet_keys.contains(&vnet));
        }
        assert_eq!(enis.get("F4939FEFC003").unwrap()["mac_address"], "F4:93:9F:EF:C0:03");
    }

    #[test]
    fn test_seeded_documents_deterministic() {
        let config = ScenarioConfig::preset("smoke").unwrap();
        let a = DocumentAssembler::new(&config, GuidGenerator::seeded(1))
            .build_all(&config)
            .unwrap();
        let b = DocumentAssembler::new(&config, GuidGenerator::seeded(1))
            .build_all(&config)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut doc = TableDocument::new(DashTable::Route, None);
        let entry = RouteEntry::new("Vnet1".to_string());
        doc.insert("k".to_string(), &entry).unwrap();
        let err = doc.insert("k".to_string(), &entry).unwrap_err();
        assert!(matches!(err, DashPerfError::DuplicateKey { .. }));
    }

    #[test]
    fn test_build_all_order_and_batching() {
        let config = ScenarioConfig {
            mapping_count: 30,
            route_count: 100,
            batch_count: 3,
            ..ScenarioConfig::default()
        };
        let docs = DocumentAssembler::new(&config, GuidGenerator::seeded(3))
            .build_all(&config)
            .unwrap();
        let names: Vec<String> = docs.iter().map(|d| d.file_name()).collect();
        assert_eq!(
            names,
            vec![
                "appliance.json",
                "vnet.json",
                "vnetmapping_1.json",
                "vnetmapping_2.json",
                "vnetmapping_3.json",
                "qos.json",
                "eni.json",
                "vnetroute_1.json",
                "vnetroute_2.json",
                "vnetroute_3.json",
            ]
        );
        let routes: usize = docs
            .iter()
            .filter(|d| d.table() == DashTable::Route)
            .map(|d| d.len())
            .sum();
        assert_eq!(routes, 100);
    }

    #[test]
    fn test_build_all_skips_empty_mapping_table() {
        let config = ScenarioConfig::default();
        let docs = DocumentAssembler::new(&config, GuidGenerator::seeded(3))
            .build_all(&config)
            .unwrap();
        assert!(docs.iter().all(|d| d.table() != DashTable::VnetMapping));
        assert!(docs.iter().all(|d| !d.is_empty()));
    }

    #[test]
    fn test_generate_scenario_writes_files() {
        let dir = TempDir::new().unwrap();
        let config = ScenarioConfig::preset("smoke").unwrap();
        let written = generate_scenario(&config, GuidGenerator::seeded(9), dir.path()).unwrap();
        assert_eq!(written.len(), 6);
        for doc in &written {
            let text = std::fs::read_to_string(&doc.path).unwrap();
            let parsed: Value = serde_json::from_str(&text).unwrap();
            assert_eq!(parsed.as_object().unwrap().len(), doc.entry_count());
        }
        assert!(dir.path().join("vnetroute.json").exists());
    }
}
