//! `delve-sim`: Monte-Carlo balance report for a preset or config file.
//!
//! Usage: `delve-sim [preset] [runs] [seed] [config.json|config.ron]`

use anyhow::{Context, Result};

use delve_core::balance::simulation::{run_balance_simulation, SimConfig};
use delve_core::balance::{BalanceManager, GameBalanceConfig, Preset};
use delve_core::logging::{init_tracing_default, TimingSpan};

fn main() -> Result<()> {
    init_tracing_default();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let preset: Preset = match args.first() {
        Some(name) => name.parse()?,
        None => Preset::Default,
    };

    let mut config = SimConfig::default();
    if let Some(runs) = args.get(1) {
        config.run_count = runs
            .parse()
            .with_context(|| format!("invalid run count: {runs}"))?;
    }
    if let Some(seed) = args.get(2) {
        config.base_seed = seed
            .parse()
            .with_context(|| format!("invalid seed: {seed}"))?;
    }

    let mut balance = BalanceManager::with_preset(preset);
    if let Some(path) = args.get(3) {
        let file_config = GameBalanceConfig::from_file(path)
            .with_context(|| format!("failed to load balance config from {path}"))?;
        balance.import_config(file_config);
    }

    let report = {
        let _span = TimingSpan::new("balance_simulation");
        run_balance_simulation(&balance, &config)
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
