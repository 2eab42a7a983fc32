//! Command implementations for the coreir CLI.

use anyhow::{Context, Result};
use log::debug;

use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::PipelineConfig;
use crate::pipeline::Pipeline;

/// Execute a CLI command.
pub fn execute_command(args: CoreirArgs) -> Result<()> {
    match &args.command {
        Command::Run(config_args) => run_pipeline(config_args, &args),
        Command::Fetch(config_args) => fetch_collection(config_args, &args),
        Command::Index(config_args) => build_index(config_args, &args),
        Command::Search(config_args) => search_topics(config_args, &args),
        Command::Evaluate(evaluate_args) => evaluate_run(evaluate_args, &args),
        Command::Sweep(sweep_args) => sweep_parameters(sweep_args, &args),
        Command::Config(config_args) => show_config(config_args, &args),
    }
}

fn pipeline(config_args: &ConfigArgs) -> Result<Pipeline> {
    let config = config_args
        .load()
        .context("could not load configuration")?;
    configured(config)
}

fn configured(config: PipelineConfig) -> Result<Pipeline> {
    let pipeline = Pipeline::new(config).context("invalid configuration")?;
    debug!("effective configuration: {:?}", pipeline.config());
    Ok(pipeline)
}

/// Run every stage.
fn run_pipeline(config_args: &ConfigArgs, cli_args: &CoreirArgs) -> Result<()> {
    let pipeline = pipeline(config_args)?;
    let report = pipeline.run().context("pipeline failed")?;

    output_result("Pipeline finished", &report, cli_args)?;
    if let Some(evaluation) = &report.evaluation {
        output_streams(evaluation, cli_args)?;
    }
    Ok(())
}

/// Download the collection.
fn fetch_collection(config_args: &ConfigArgs, cli_args: &CoreirArgs) -> Result<()> {
    let pipeline = pipeline(config_args)?;
    let report = pipeline.acquire().context("acquisition failed")?;

    let message = if report.downloaded {
        "Collection downloaded"
    } else {
        "Collection already present"
    };
    output_result(message, &report, cli_args)
}

/// Build the index.
fn build_index(config_args: &ConfigArgs, cli_args: &CoreirArgs) -> Result<()> {
    let pipeline = pipeline(config_args)?;
    let report = pipeline.index().context("indexing failed")?;

    let message = if report.skipped {
        "Index already exists"
    } else {
        "Index built"
    };
    output_result(message, &report, cli_args)
}

/// Search the topics.
fn search_topics(config_args: &ConfigArgs, cli_args: &CoreirArgs) -> Result<()> {
    let pipeline = pipeline(config_args)?;
    let report = pipeline.retrieve().context("retrieval failed")?;
    output_result("Run file written", &report, cli_args)
}

/// Evaluate a run file.
fn evaluate_run(evaluate_args: &EvaluateArgs, cli_args: &CoreirArgs) -> Result<()> {
    let config = evaluate_args
        .source
        .load()
        .context("could not load configuration")?;
    let pipeline = configured(config)?;
    let run = match &evaluate_args.run {
        Some(run) => run.clone(),
        None => pipeline.config().retrieval.output.clone(),
    };

    let report = pipeline
        .evaluate_run(&run)
        .with_context(|| format!("evaluation of {} failed", run.display()))?;
    output_result("Evaluation finished", &report, cli_args)?;
    output_streams(&report, cli_args)
}

/// Search the topics once per grid point.
fn sweep_parameters(sweep_args: &SweepArgs, cli_args: &CoreirArgs) -> Result<()> {
    let (config, grid) = sweep_args
        .load()
        .context("could not load configuration")?;
    let pipeline = configured(config)?;

    let report = pipeline
        .sweep(&grid, !sweep_args.no_eval)
        .context("sweep failed")?;

    output_result("Sweep finished", &report, cli_args)?;
    for outcome in &report.outcomes {
        if let Some(evaluation) = &outcome.evaluation {
            if cli_args.output_format == OutputFormat::Human {
                println!();
                println!("== k1={} b={} ==", outcome.k1, outcome.b);
            }
            output_streams(evaluation, cli_args)?;
        }
    }
    Ok(())
}

/// Print the effective configuration.
fn show_config(config_args: &ConfigArgs, cli_args: &CoreirArgs) -> Result<()> {
    let config = config_args
        .load()
        .context("could not load configuration")?;
    config.validate().context("invalid configuration")?;
    println!("{}", config.to_json(cli_args.pretty)?);
    Ok(())
}
