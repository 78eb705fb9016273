use crate::{loader::TraceFileEvent, parameters::LambdaTable};
use denoise_common::{Channel, Intensity};
use rayon::prelude::*;
use tracing::instrument;
use tv_denoise::{DenoiseResult, Denoiser, Real, breakpoints, objective};

/// How a channel came out of the solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ChannelSummary {
    pub(crate) channel: Channel,
    pub(crate) lambda: Real,
    pub(crate) baseline: Real,
    pub(crate) breakpoints: usize,
    pub(crate) objective: Real,
}

#[derive(Debug, Clone)]
pub(crate) struct DenoisedChannel {
    /// Samples after baseline subtraction.
    pub(crate) raw: Vec<Real>,
    pub(crate) denoised: Vec<Real>,
    pub(crate) summary: ChannelSummary,
}

/// Mean of the first `length` samples, or zero if `length` is zero.
/// A `length` beyond the trace uses the whole trace.
pub(crate) fn baseline(samples: &[Real], length: usize) -> Real {
    let warm_up = &samples[..length.min(samples.len())];
    if warm_up.is_empty() {
        0.0
    } else {
        warm_up.iter().sum::<Real>() / warm_up.len() as Real
    }
}

fn denoise_channel(
    denoiser: &mut Denoiser,
    channel: Channel,
    trace: &[Intensity],
    lambda: Real,
    baseline_length: usize,
) -> DenoiseResult<DenoisedChannel> {
    let mut raw: Vec<Real> = trace.iter().copied().map(Real::from).collect();
    let baseline = baseline(&raw, baseline_length);
    raw.iter_mut().for_each(|value| *value -= baseline);

    let denoised = denoiser.denoise(&raw, lambda)?;
    let summary = ChannelSummary {
        channel,
        lambda,
        baseline,
        breakpoints: breakpoints(&denoised).len(),
        objective: objective(&raw, &denoised, lambda)?,
    };
    Ok(DenoisedChannel {
        raw,
        denoised,
        summary,
    })
}

/// Denoises every channel of `event` in parallel, keeping channel order.
#[instrument(skip_all, level = "debug", fields(trace_event = event.cur_trace_event))]
pub(crate) fn denoise_trace_event(
    event: &TraceFileEvent,
    lambdas: &LambdaTable,
    baseline_length: usize,
) -> DenoiseResult<Vec<DenoisedChannel>> {
    event
        .channels()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map_init(Denoiser::new, |denoiser, (channel, trace)| {
            denoise_channel(
                denoiser,
                channel,
                trace,
                lambdas.lambda(channel),
                baseline_length,
            )
        })
        .collect()
}
