// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use geox_batch::{BatchConfig, JsonLinesSink, RunSink};
use geox_cli::{
    DEFAULT_SEED, DesignOptions, ModelChoice, SimulateOptions, batch, design, error_code,
    resolve_mde, simulate,
};
use geox_core::{ExperimentTemplate, TemplateSet};
use geox_sim::{ConfounderKind, DEFAULT_POST_PERIOD_DAYS, DEFAULT_PRE_PERIOD_DAYS, EffectShape};
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "GEOX_LOG";

#[derive(Parser, Debug)]
#[command(name = "geox", version, about = "Simulate, design, and analyze SEO geo experiments")]
struct Cli {
    /// JSON file with experiment templates (`{"templates": [...]}`).
    #[arg(long, global = true)]
    templates: Option<PathBuf>,

    /// Template name to take the default MDE from.
    #[arg(long, global = true)]
    template: Option<String>,

    /// Write the JSON report here instead of stdout.
    #[arg(long, short, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Simulate one test/control experiment and analyze it.
    Simulate(SimulateArgs),
    /// Rank control markets and size the test.
    Design(DesignArgs),
    /// Run a batch of simulated experiments.
    Batch(BatchArgs),
}

#[derive(Args, Debug)]
struct SimulateArgs {
    #[arg(long, default_value = "Austin, TX")]
    test_market: String,
    #[arg(long, default_value = "Denver, CO")]
    control_market: String,
    #[arg(long, default_value_t = DEFAULT_PRE_PERIOD_DAYS)]
    pre_days: usize,
    #[arg(long, default_value_t = DEFAULT_POST_PERIOD_DAYS)]
    post_days: usize,
    /// MDE as a fraction of the baseline mean, e.g. 0.08.
    #[arg(long)]
    mde: Option<f64>,
    /// step, ramp, or delayed_step.
    #[arg(long, default_value = "step")]
    shape: EffectShape,
    /// Comma-separated: algorithm_update, seasonality_spike, tracking_break.
    #[arg(long, value_delimiter = ',')]
    confounders: Vec<ConfounderKind>,
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,
    /// regression or flat_mean.
    #[arg(long, default_value = "regression")]
    model: ModelChoice,
}

#[derive(Args, Debug)]
struct DesignArgs {
    #[arg(long, default_value = "Austin, TX")]
    test_market: String,
    #[arg(long, default_value_t = DEFAULT_PRE_PERIOD_DAYS)]
    pre_days: usize,
    #[arg(long)]
    mde: Option<f64>,
    #[arg(long, default_value_t = 0.05)]
    alpha: f64,
    #[arg(long, default_value_t = 0.80)]
    power: f64,
    #[arg(long, default_value_t = 5)]
    top_k: usize,
    /// Ridge penalty of the synthetic control.
    #[arg(long, default_value_t = 1.0)]
    ridge_alpha: f64,
    /// Test duration to evaluate; defaults to the required duration.
    #[arg(long)]
    days: Option<usize>,
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,
}

#[derive(Args, Debug)]
struct BatchArgs {
    #[arg(long, default_value_t = 3)]
    experiments: usize,
    #[arg(long, default_value_t = DEFAULT_POST_PERIOD_DAYS)]
    post_days: usize,
    /// Comma-separated effect sizes in percent.
    #[arg(long, value_delimiter = ',', default_values_t = [5.0, 10.0])]
    effects: Vec<f64>,
    #[arg(long)]
    confounders: bool,
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,
    /// Stream every generated run as JSON lines to this file.
    #[arg(long)]
    jsonl: Option<PathBuf>,
    #[arg(long, default_value = "regression")]
    model: ModelChoice,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorPayload,
}

#[derive(Serialize)]
struct ErrorPayload {
    code: String,
    message: String,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        emit_structured_error(&err);
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let template = resolve_template(cli.templates.as_deref(), cli.template.as_deref())?;
    let output = cli.output.as_deref();

    match cli.command {
        Command::Simulate(args) => {
            let options = SimulateOptions {
                test_market: args.test_market,
                control_market: args.control_market,
                pre_period_days: args.pre_days,
                post_period_days: args.post_days,
                mde_fraction: resolve_mde(args.mde, template.as_ref()),
                shape: args.shape,
                confounders: args.confounders,
                seed: args.seed,
                model: args.model,
            };
            write_json_output(&simulate(&options)?, output)
        }
        Command::Design(args) => {
            let options = DesignOptions {
                seed: args.seed,
                test_market: args.test_market,
                pre_period_days: args.pre_days,
                mde_fraction: resolve_mde(args.mde, template.as_ref()),
                alpha: args.alpha,
                power: args.power,
                top_k: args.top_k,
                ridge_alpha: args.ridge_alpha,
                duration_days: args.days,
            };
            write_json_output(&design(&options)?, output)
        }
        Command::Batch(args) => {
            let mut config = BatchConfig {
                num_experiments: args.experiments,
                post_period_days: args.post_days,
                effect_sizes_pct: args.effects,
                include_confounders: args.confounders,
                base_seed: args.seed,
                ..BatchConfig::default()
            };
            if let Some(template) = &template {
                config.template_name = template.name.clone();
            }
            let report = match args.jsonl.as_deref() {
                Some(path) => {
                    let file = File::create(path)
                        .with_context(|| format!("failed to create '{}'", path.display()))?;
                    let mut sink = JsonLinesSink::new(BufWriter::new(file));
                    let report = batch(config, args.model, Some(&mut sink as &mut dyn RunSink))?;
                    tracing::info!(
                        runs = sink.runs_written(),
                        path = %path.display(),
                        "wrote run records"
                    );
                    report
                }
                None => batch(config, args.model, None)?,
            };
            write_json_output(&report, output)
        }
    }
}

fn resolve_template(
    templates: Option<&Path>,
    name: Option<&str>,
) -> Result<Option<ExperimentTemplate>> {
    let (path, name) = match (templates, name) {
        (_, None) => return Ok(None),
        (None, Some(name)) => bail!("--template '{name}' requires --templates <PATH>"),
        (Some(path), Some(name)) => (path, name),
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    let set = TemplateSet::from_json_str(&raw)?;
    match set.find(name) {
        Some(template) => Ok(Some(template.clone())),
        None => bail!("template '{name}' not found in '{}'", path.display()),
    }
}

fn write_json_output<T: Serialize>(payload: &T, output_path: Option<&Path>) -> Result<()> {
    let encoded =
        serde_json::to_string_pretty(payload).context("failed to serialize JSON output")?;

    if let Some(path) = output_path {
        fs::write(path, format!("{encoded}\n"))
            .with_context(|| format!("failed to write '{}'", path.display()))
    } else {
        println!("{encoded}");
        Ok(())
    }
}

fn emit_structured_error(err: &anyhow::Error) {
    let code = error_code(err);
    let envelope = ErrorEnvelope {
        error: ErrorPayload {
            code: code.to_string(),
            message: format!("{err:#}"),
        },
    };

    match serde_json::to_string_pretty(&envelope) {
        Ok(json) => eprintln!("{json}"),
        Err(_) => eprintln!("{{\"error\":{{\"code\":\"{code}\",\"message\":\"{err}\"}}}}"),
    }
}
