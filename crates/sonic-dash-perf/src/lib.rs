//! DASH VNET configuration generator and gNMI push performance driver.
//!
//! This crate measures how quickly a DASH-capable SONiC device ingests VNET
//! routing configuration pushed over gNMI:
//!
//! - [`derive`]: deterministic addresses, MACs and identifiers from indices
//! - [`assembler`]: one JSON document per table or batch, written to disk
//! - [`config`]: scenario parameters, presets and TOML loading
//! - [`orchestrator`]: tiered, fail-fast submission with a per-call report
//! - [`readiness`]: APPL_DB polling between dependency tiers
//! - [`submit`]: the set-request boundary and a command line gNMI submitter
//!
//! # Tables
//!
//! | Tier | APPL_DB table | Key |
//! |------|---------------|-----|
//! | base | DASH_APPLIANCE_TABLE | `<id>` |
//! | base | DASH_VNET_TABLE | `Vnet<N>` |
//! | bindings | DASH_VNET_MAPPING_TABLE | `Vnet<N>:<ip>` |
//! | bindings | DASH_QOS_TABLE | `qos100` |
//! | bindings | DASH_ENI_TABLE | `<eni id>` |
//! | routes | DASH_ROUTE_TABLE | `<eni id>:<prefix>` |
//!
//! # Example
//!
//! ```ignore
//! use sonic_dash_perf::{
//!     generate_scenario, GnmiCliSubmitter, GuidGenerator, Orchestrator, ScenarioConfig,
//!     SettleStrategy,
//! };
//!
//! let config = ScenarioConfig::preset("route-10k-batched").unwrap();
//! let docs = generate_scenario(&config, GuidGenerator::random(), dir.path())?;
//! let orch = Orchestrator::new(
//!     GnmiCliSubmitter::new("gnmi_set").with_args(["-target_addr", "10.0.0.5:50052"]),
//!     SettleStrategy::FixedDelay(config.settle.settle_delay()),
//! );
//! let report = orch.apply(&config.name, &docs).await.into_result()?;
//! ```

pub mod assembler;
pub mod config;
pub mod derive;
pub mod error;
pub mod orchestrator;
pub mod readiness;
pub mod shell;
pub mod submit;
pub mod tables;
pub mod types;

pub use assembler::{
    batch_ranges, generate_scenario, DocumentAssembler, TableDocument, WrittenDocument,
};
pub use config::{ScenarioConfig, SettleConfig, DEFAULT_SCENARIO_FILE, PRESET_NAMES};
pub use error::{DashPerfError, DashPerfResult};
pub use orchestrator::{Orchestrator, RunReport, SettleStrategy};
pub use readiness::{BackoffPolicy, ReadinessProbe, RedisReadinessProbe};
pub use submit::{ConfigSubmitter, GnmiCliSubmitter, SubmitStatus};
pub use tables::{DashTable, Tier};
pub use types::GuidGenerator;
