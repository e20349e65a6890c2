//! dash-perf entry point.
//!
//! Generates DASH VNET documents for a scenario and, for `run` and
//! `teardown`, pushes them to the device under test through an external
//! gNMI set tool.
//!
//! # Usage
//!
//! ```bash
//! # Write the documents of a preset without submitting them
//! dash-perf generate --preset route-10k-batched --out /tmp/dash
//!
//! # Push them, polling APPL_DB between tiers
//! dash-perf run --preset route-10k-batched --out /tmp/dash \
//!     --gnmi-program gnmi_set --gnmi-arg=-target_addr --gnmi-arg=10.0.0.5:50052 \
//!     --redis-host 10.0.0.5
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sonic_dash_perf::{
    generate_scenario, BackoffPolicy, GnmiCliSubmitter, GuidGenerator, Orchestrator,
    RedisReadinessProbe, ScenarioConfig, SettleStrategy, WrittenDocument, DEFAULT_SCENARIO_FILE,
    PRESET_NAMES,
};

#[derive(Parser, Debug)]
#[command(name = "dash-perf")]
#[command(
    about = "Generate DASH VNET configuration and measure gNMI push performance",
    long_about = None
)]
struct Cli {
    /// Default log level when RUST_LOG is unset
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List built-in scenarios
    Presets,
    /// Write scenario documents without submitting them
    Generate(GenerateArgs),
    /// Generate and submit scenario documents
    Run(RunArgs),
    /// Delete every entry a scenario creates
    Teardown(RunArgs),
}

#[derive(Args, Debug)]
struct ScenarioArgs {
    /// Built-in scenario name (see `presets`)
    #[arg(long, conflicts_with = "config")]
    preset: Option<String>,

    /// TOML scenario file; ./dash-perf.toml is used when present and no
    /// preset or file is given
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    routes: Option<u32>,

    #[arg(long)]
    vnets: Option<u32>,

    #[arg(long)]
    enis: Option<u32>,

    #[arg(long)]
    mappings: Option<u32>,

    #[arg(long)]
    batches: Option<u32>,

    /// First octet of route and mapping addresses
    #[arg(long)]
    base_octet: Option<u8>,

    /// Seed for reproducible GUIDs
    #[arg(long)]
    seed: Option<u64>,

    /// Directory the documents are written to
    #[arg(long, default_value = "dash-perf-out")]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    scenario: ScenarioArgs,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    scenario: ScenarioArgs,

    /// gNMI set tool to execute
    #[arg(long, default_value = "gnmi_set")]
    gnmi_program: String,

    /// Fixed argument passed to the gNMI tool (repeatable)
    #[arg(long = "gnmi-arg", allow_hyphen_values = true)]
    gnmi_args: Vec<String>,

    /// Flag preceding each update path
    #[arg(long, default_value = "--update", allow_hyphen_values = true)]
    update_flag: String,

    /// Flag preceding each delete path
    #[arg(long, default_value = "--delete", allow_hyphen_values = true)]
    delete_flag: String,

    /// APPL_DB host to poll between tiers; fixed settle delays otherwise
    #[arg(long)]
    redis_host: Option<String>,

    #[arg(long, default_value = "6379")]
    redis_port: u16,

    /// Override the fixed settle delay in seconds
    #[arg(long)]
    settle_delay_secs: Option<u64>,
}

impl ScenarioArgs {
    fn resolve(&self) -> Result<ScenarioConfig> {
        let mut config = match (&self.preset, &self.config) {
            (Some(name), _) => ScenarioConfig::preset(name).ok_or_else(|| {
                anyhow!("unknown preset '{}', expected one of {:?}", name, PRESET_NAMES)
            })?,
            (None, Some(path)) => ScenarioConfig::from_file(path)?,
            (None, None) => ScenarioConfig::load_or_default(DEFAULT_SCENARIO_FILE)?,
        };

        if let Some(v) = self.routes {
            config.route_count = v;
        }
        if let Some(v) = self.vnets {
            config.vnet_count = v;
        }
        if let Some(v) = self.enis {
            config.eni_count = v;
        }
        if let Some(v) = self.mappings {
            config.mapping_count = v;
        }
        if let Some(v) = self.batches {
            config.batch_count = v;
        }
        if let Some(v) = self.base_octet {
            config.base_address_offset = v;
        }

        config.validate()?;
        Ok(config)
    }

    fn guids(&self) -> GuidGenerator {
        match self.seed {
            Some(seed) => GuidGenerator::seeded(seed),
            None => GuidGenerator::random(),
        }
    }

    fn generate(&self, config: &ScenarioConfig) -> Result<Vec<WrittenDocument>> {
        let docs = generate_scenario(config, self.guids(), &self.out)
            .with_context(|| format!("generating scenario '{}'", config.name))?;
        info!(
            scenario = %config.name,
            documents = docs.len(),
            out = %self.out.display(),
            "Scenario documents written"
        );
        Ok(docs)
    }
}

impl RunArgs {
    fn submitter(&self) -> GnmiCliSubmitter {
        GnmiCliSubmitter::new(&self.gnmi_program)
            .with_args(self.gnmi_args.iter().cloned())
            .with_update_flag(&self.update_flag)
            .with_delete_flag(&self.delete_flag)
    }

    async fn settle(&self, config: &ScenarioConfig) -> Result<SettleStrategy> {
        match &self.redis_host {
            Some(host) => {
                let probe = RedisReadinessProbe::connect(host, self.redis_port).await?;
                Ok(SettleStrategy::Poll {
                    probe: Arc::new(probe),
                    policy: BackoffPolicy::from(&config.settle),
                })
            }
            None => {
                let delay = match self.settle_delay_secs {
                    Some(secs) => std::time::Duration::from_secs(secs),
                    None => config.settle.settle_delay(),
                };
                Ok(SettleStrategy::FixedDelay(delay))
            }
        }
    }

    async fn execute(&self, teardown: bool) -> Result<()> {
        let config = self.scenario.resolve()?;
        let docs = self.scenario.generate(&config)?;
        let orch = Orchestrator::new(self.submitter(), self.settle(&config).await?);

        let report = if teardown {
            orch.teardown(&config.name, &docs).await
        } else {
            orch.apply(&config.name, &docs).await
        };
        println!("{}", report);

        if let Some(tier) = report.failed_tier() {
            error!(tier = %tier, "Scenario stopped");
        }
        report.into_result()?;
        Ok(())
    }
}

fn init_logging(log_level: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow!("failed to set tracing subscriber: {}", e))
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Presets => {
            for name in PRESET_NAMES {
                if let Some(config) = ScenarioConfig::preset(name) {
                    println!("# {}\n{}", name, config.to_toml()?);
                }
            }
            Ok(())
        }
        Command::Generate(args) => {
            let config = args.scenario.resolve()?;
            args.scenario.generate(&config)?;
            Ok(())
        }
        Command::Run(args) => args.execute(false).await,
        Command::Teardown(args) => args.execute(true).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(&cli.log_level) {
        eprintln!("dash-perf: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("dash-perf error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
