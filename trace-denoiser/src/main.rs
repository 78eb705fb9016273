mod loader;
mod output;
mod parameters;
mod processing;

use anyhow::{Context, Result};
use clap::Parser;
use denoise_common::{
    init_tracer,
    metrics::{
        component_info_metric,
        failures::{self, FailureKind},
        names::{
            BREAKPOINTS_FOUND, CHANNELS_DENOISED, FAILURES, SAMPLES_DENOISED,
            TRACE_EVENTS_PROCESSED,
        },
    },
    tracer::TracerOptions,
};
use loader::load_trace_file;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use output::CsvWriter;
use parameters::{ChannelLambda, load_lambda_table};
use std::{net::SocketAddr, ops::Range, path::PathBuf};
use tracing::{debug, error, info};
use tv_denoise::Real;

#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Digitiser `.traces` file to read.
    #[clap(long)]
    file_name: PathBuf,

    /// CSV file receiving every raw and denoised sample.
    #[clap(long)]
    output: Option<PathBuf>,

    /// Regularisation weight for channels without their own [default: 0].
    #[clap(long)]
    lambda: Option<Real>,

    /// Weight for a single channel, as `<channel>:<lambda>`. May be repeated.
    #[clap(long)]
    channel_lambda: Vec<ChannelLambda>,

    /// JSON file of weights, `{ "default": λ, "channels": { "<channel>": λ } }`.
    #[clap(long)]
    lambda_config: Option<PathBuf>,

    /// Number of leading samples averaged into each channel's baseline, 0 disables.
    #[clap(long, default_value = "0")]
    baseline_length: usize,

    /// Number of trace events to denoise, 0 denoises the rest of the file.
    #[clap(long, default_value = "0")]
    number_of_trace_events: usize,

    #[clap(long, default_value = "0")]
    first_trace_event: usize,

    /// Endpoint on which to serve Prometheus metrics.
    #[clap(long, env = "TRACE_DENOISER_OBSERVABILITY_ADDRESS")]
    observability_address: Option<SocketAddr>,
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let tracer = init_tracer!(TracerOptions::default())?;
    debug!("Started {}", tracer.service_name());

    if let Some(address) = args.observability_address {
        PrometheusBuilder::new()
            .with_http_listener(address)
            .install()
            .context("Prometheus metrics exporter should be set up")?;
    }
    register_metrics();

    let lambdas = load_lambda_table(
        args.lambda_config.as_deref(),
        args.lambda,
        &args.channel_lambda,
    )
    .inspect_err(|e| counter!(FAILURES, &[failures::get_label(e.failure_kind())]).increment(1))?;

    let mut trace_file = load_trace_file(&args.file_name)
        .inspect_err(|_| {
            counter!(FAILURES, &[failures::get_label(FailureKind::FileReadFailed)]).increment(1)
        })
        .with_context(|| format!("Cannot load trace file {}", args.file_name.display()))?;
    let header = trace_file.header();
    info!(
        "Loaded {} ({}): {} trace events of {} channels with {} samples, \
        sample time {}, resolution {}",
        header.prog_version,
        header.run_description,
        trace_file.number_of_trace_events(),
        trace_file.number_of_channels(),
        trace_file.number_of_samples(),
        trace_file.sample_time(),
        header.resolution,
    );

    let trace_events = selected_trace_events(
        trace_file.number_of_trace_events(),
        args.first_trace_event,
        args.number_of_trace_events,
    );
    let num_trace_events = trace_events.len();

    let mut writer = args
        .output
        .as_deref()
        .map(CsvWriter::create)
        .transpose()
        .context("Cannot create output file")?;

    for index in trace_events {
        let event = trace_file.read_trace_event(index).inspect_err(|_| {
            counter!(FAILURES, &[failures::get_label(FailureKind::FileReadFailed)]).increment(1)
        })?;
        let channels = processing::denoise_trace_event(&event, &lambdas, args.baseline_length)
            .inspect_err(|e| {
                error!("Trace event {index}: {e}");
                counter!(
                    FAILURES,
                    &[failures::get_label(FailureKind::DataProcessingFailed)]
                )
                .increment(1)
            })?;

        for channel in &channels {
            let summary = &channel.summary;
            debug!(
                "Channel {}: λ = {}, baseline = {}, {} breakpoints, objective {}",
                summary.channel,
                summary.lambda,
                summary.baseline,
                summary.breakpoints,
                summary.objective
            );
            counter!(SAMPLES_DENOISED).increment(channel.denoised.len() as u64);
            counter!(BREAKPOINTS_FOUND).increment(summary.breakpoints as u64);
            if let Some(writer) = writer.as_mut() {
                writer
                    .write_channel(event.cur_trace_event, channel)
                    .inspect_err(|_| {
                        counter!(FAILURES, &[failures::get_label(FailureKind::FileWriteFailed)])
                            .increment(1)
                    })?;
            }
        }
        counter!(CHANNELS_DENOISED).increment(channels.len() as u64);
        counter!(TRACE_EVENTS_PROCESSED).increment(1);

        let total_breakpoints: usize = channels.iter().map(|c| c.summary.breakpoints).sum();
        info!(
            "Trace event {} (index {index}): {} channels denoised, {total_breakpoints} breakpoints",
            event.cur_trace_event,
            channels.len(),
        );
    }

    if let Some(writer) = writer {
        writer.finish().inspect_err(|_| {
            counter!(FAILURES, &[failures::get_label(FailureKind::FileWriteFailed)]).increment(1)
        })?;
    }
    info!("Denoised {num_trace_events} trace events");
    Ok(())
}

/// Indices of the trace events to denoise. A `count` of zero selects every
/// event from `first` on; the range never extends past `total`.
fn selected_trace_events(total: usize, first: usize, count: usize) -> Range<usize> {
    let start = first.min(total);
    let remaining = total - start;
    let count = if count == 0 {
        remaining
    } else {
        count.min(remaining)
    };
    start..start + count
}

fn register_metrics() {
    component_info_metric("trace-denoiser");

    metrics::describe_counter!(
        TRACE_EVENTS_PROCESSED,
        metrics::Unit::Count,
        "Number of trace events denoised"
    );
    metrics::describe_counter!(
        CHANNELS_DENOISED,
        metrics::Unit::Count,
        "Number of channel traces denoised"
    );
    metrics::describe_counter!(
        SAMPLES_DENOISED,
        metrics::Unit::Count,
        "Number of samples denoised"
    );
    metrics::describe_counter!(
        BREAKPOINTS_FOUND,
        metrics::Unit::Count,
        "Number of breakpoints in the denoised traces"
    );
    metrics::describe_counter!(
        FAILURES,
        metrics::Unit::Count,
        "Number of failures encountered"
    );
}
