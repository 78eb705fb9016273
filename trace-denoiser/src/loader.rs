//! Reader for the digitiser's raw `.traces` files.
//!
//! A file is a header followed by fixed size trace events. Scalars are little
//! endian, strings are prefixed by their `i32` length and the ADC samples of
//! each channel are stored as big endian `u16`.
use denoise_common::{Channel, Intensity, TraceEventIndex};
use std::{
    fs::File,
    io::{self, BufReader, Read, Seek, SeekFrom},
    mem::size_of,
    path::Path,
    string::FromUtf8Error,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum TraceFileError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Truncated {field}: expected {expected} bytes, got {found}")]
    Truncated {
        field: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Invalid UTF-8 in {field}: {source}")]
    InvalidString {
        field: &'static str,
        source: FromUtf8Error,
    },
    #[error("Negative {field} in header: {value}")]
    NegativeCount { field: &'static str, value: i32 },
    #[error("File body of {body} bytes is not a whole number of {event_size} byte trace events")]
    PartialTraceEvent { body: u64, event_size: u64 },
    #[error("Trace event {index} requested but the file holds {count}")]
    TraceEventOutOfRange {
        index: TraceEventIndex,
        count: usize,
    },
}

type LoadResult<T> = Result<T, TraceFileError>;

#[derive(Default, Debug)]
pub(crate) struct TraceFileHeader {
    pub(crate) prog_version: String,
    pub(crate) run_description: String,
    pub(crate) resolution: i32,
    pub(crate) number_of_channels: usize,
    pub(crate) _channel_enabled: Vec<bool>,
    pub(crate) _volts_scale_factor: Vec<f64>,
    pub(crate) _channel_offset_volts: Vec<f64>,
    pub(crate) sample_time: f64,
    pub(crate) number_of_samples: usize,
    pub(crate) _trigger_enabled: Vec<bool>,
    pub(crate) _ex_trigger_enabled: bool,
    pub(crate) _trigger_level: Vec<f64>,
    pub(crate) _ex_trigger_level: f64,
    pub(crate) _trigger_slope: Vec<i32>,
    pub(crate) _ex_trigger_slope: i32,
    total_bytes: usize,
}

impl TraceFileHeader {
    pub(crate) fn load<R: Read>(source: &mut R) -> LoadResult<Self> {
        let mut total_bytes = usize::default();
        let prog_version = load_string(source, "program version", &mut total_bytes)?;
        let run_description = load_string(source, "run description", &mut total_bytes)?;
        let resolution = load_i32(source, "resolution", &mut total_bytes)?;
        let number_of_channels = load_count(source, "channel count", &mut total_bytes)?;
        let channels = number_of_channels;
        Ok(TraceFileHeader {
            prog_version,
            run_description,
            resolution,
            number_of_channels,
            _channel_enabled: load_bool_vec(source, channels, &mut total_bytes)?,
            _volts_scale_factor: load_f64_vec(source, channels, &mut total_bytes)?,
            _channel_offset_volts: load_f64_vec(source, channels, &mut total_bytes)?,
            sample_time: load_f64(source, "sample time", &mut total_bytes)?,
            number_of_samples: load_count(source, "sample count", &mut total_bytes)?,
            _trigger_enabled: load_bool_vec(source, channels, &mut total_bytes)?,
            _ex_trigger_enabled: load_bool(source, "trigger flag", &mut total_bytes)?,
            _trigger_level: load_f64_vec(source, channels, &mut total_bytes)?,
            _ex_trigger_level: load_f64(source, "trigger level", &mut total_bytes)?,
            _trigger_slope: load_i32_vec(source, channels, &mut total_bytes)?,
            _ex_trigger_slope: load_i32(source, "trigger slope", &mut total_bytes)?,
            total_bytes,
        })
    }

    fn event_size(&self) -> usize {
        TraceFileEvent::size(self.number_of_channels, self.number_of_samples)
    }
}

#[derive(Default, Debug)]
pub(crate) struct TraceFileEvent {
    pub(crate) cur_trace_event: i32,
    pub(crate) _trace_event_runtime: f64,
    pub(crate) _number_saved_traces: i32,
    pub(crate) _saved_channels: Vec<bool>,
    pub(crate) _trigger_time: f64,
    pub(crate) raw_trace: Vec<Vec<Intensity>>,
}

impl TraceFileEvent {
    fn size(num_channels: usize, num_samples: usize) -> usize {
        size_of::<i32>() + // cur_trace_event
        size_of::<f64>() + // trace_event_runtime
        size_of::<i32>() + // number_saved_traces
        size_of::<bool>() * num_channels + // saved_channels
        size_of::<f64>() + // trigger_time
        size_of::<Intensity>() * num_channels * num_samples // raw_trace
    }

    fn load<R: Read>(source: &mut R, num_channels: usize, num_samples: usize) -> LoadResult<Self> {
        let mut total_bytes = usize::default();
        Ok(TraceFileEvent {
            cur_trace_event: load_i32(source, "event number", &mut total_bytes)?,
            _trace_event_runtime: load_f64(source, "event runtime", &mut total_bytes)?,
            _number_saved_traces: load_i32(source, "saved trace count", &mut total_bytes)?,
            _saved_channels: load_bool_vec(source, num_channels, &mut total_bytes)?,
            _trigger_time: load_f64(source, "trigger time", &mut total_bytes)?,
            raw_trace: (0..num_channels)
                .map(|_| load_raw_trace(source, num_samples, &mut total_bytes))
                .collect::<Result<_, _>>()?,
        })
    }

    pub(crate) fn channels(&self) -> impl Iterator<Item = (Channel, &[Intensity])> {
        self.raw_trace
            .iter()
            .enumerate()
            .map(|(channel, trace)| (channel as Channel, trace.as_slice()))
    }
}

#[derive(Debug)]
pub(crate) struct TraceFile<R> {
    source: R,
    header: TraceFileHeader,
    number_of_trace_events: usize,
}

impl<R: Read + Seek> TraceFile<R> {
    /// Reads the header and checks the remainder of `source` holds whole trace events.
    pub(crate) fn from_reader(mut source: R) -> LoadResult<Self> {
        source.seek(SeekFrom::Start(0))?;
        let header = TraceFileHeader::load(&mut source)?;
        let file_size = source.seek(SeekFrom::End(0))?;
        let body = file_size.saturating_sub(header.total_bytes as u64);
        let event_size = header.event_size() as u64;
        if body % event_size != 0 {
            return Err(TraceFileError::PartialTraceEvent { body, event_size });
        }
        Ok(TraceFile {
            source,
            header,
            number_of_trace_events: (body / event_size) as usize,
        })
    }

    pub(crate) fn read_trace_event(
        &mut self,
        index: TraceEventIndex,
    ) -> LoadResult<TraceFileEvent> {
        if index >= self.number_of_trace_events {
            return Err(TraceFileError::TraceEventOutOfRange {
                index,
                count: self.number_of_trace_events,
            });
        }
        let offset = self.header.total_bytes + index * self.header.event_size();
        self.source.seek(SeekFrom::Start(offset as u64))?;
        TraceFileEvent::load(
            &mut self.source,
            self.header.number_of_channels,
            self.header.number_of_samples,
        )
    }

    pub(crate) fn number_of_trace_events(&self) -> usize {
        self.number_of_trace_events
    }

    pub(crate) fn number_of_channels(&self) -> usize {
        self.header.number_of_channels
    }

    pub(crate) fn number_of_samples(&self) -> usize {
        self.header.number_of_samples
    }

    pub(crate) fn sample_time(&self) -> f64 {
        self.header.sample_time
    }

    pub(crate) fn header(&self) -> &TraceFileHeader {
        &self.header
    }
}

pub(crate) fn load_trace_file(path: &Path) -> LoadResult<TraceFile<BufReader<File>>> {
    TraceFile::from_reader(BufReader::new(File::open(path)?))
}

/// Fills `bytes` unless the source runs dry first.
fn load_scalar<R: Read>(
    source: &mut R,
    field: &'static str,
    bytes: &mut [u8],
    total_bytes: &mut usize,
) -> LoadResult<()> {
    let mut found = 0;
    while found < bytes.len() {
        match source.read(&mut bytes[found..]) {
            Ok(0) => break,
            Ok(n) => found += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    *total_bytes += found;
    if found == bytes.len() {
        Ok(())
    } else {
        Err(TraceFileError::Truncated {
            field,
            expected: bytes.len(),
            found,
        })
    }
}

fn load_i32<R: Read>(
    source: &mut R,
    field: &'static str,
    total_bytes: &mut usize,
) -> LoadResult<i32> {
    let mut bytes = [0; size_of::<i32>()];
    load_scalar(source, field, &mut bytes, total_bytes)?;
    Ok(i32::from_le_bytes(bytes))
}

fn load_f64<R: Read>(
    source: &mut R,
    field: &'static str,
    total_bytes: &mut usize,
) -> LoadResult<f64> {
    let mut bytes = [0; size_of::<f64>()];
    load_scalar(source, field, &mut bytes, total_bytes)?;
    Ok(f64::from_le_bytes(bytes))
}

fn load_bool<R: Read>(
    source: &mut R,
    field: &'static str,
    total_bytes: &mut usize,
) -> LoadResult<bool> {
    let mut bytes = [0; 1];
    load_scalar(source, field, &mut bytes, total_bytes)?;
    Ok(bytes[0] != 0)
}

/// A header count, which the format stores as a signed integer.
fn load_count<R: Read>(
    source: &mut R,
    field: &'static str,
    total_bytes: &mut usize,
) -> LoadResult<usize> {
    let value = load_i32(source, field, total_bytes)?;
    usize::try_from(value).map_err(|_| TraceFileError::NegativeCount { field, value })
}

fn load_bool_vec<R: Read>(
    source: &mut R,
    size: usize,
    total_bytes: &mut usize,
) -> LoadResult<Vec<bool>> {
    (0..size)
        .map(|_| load_bool(source, "channel flag", total_bytes))
        .collect()
}

fn load_f64_vec<R: Read>(
    source: &mut R,
    size: usize,
    total_bytes: &mut usize,
) -> LoadResult<Vec<f64>> {
    (0..size)
        .map(|_| load_f64(source, "channel setting", total_bytes))
        .collect()
}

fn load_i32_vec<R: Read>(
    source: &mut R,
    size: usize,
    total_bytes: &mut usize,
) -> LoadResult<Vec<i32>> {
    (0..size)
        .map(|_| load_i32(source, "channel setting", total_bytes))
        .collect()
}

fn load_string<R: Read>(
    source: &mut R,
    field: &'static str,
    total_bytes: &mut usize,
) -> LoadResult<String> {
    let size = load_count(source, field, total_bytes)?;
    // Grows with the bytes actually read, not with the length claimed by the file.
    let mut string_bytes = Vec::new();
    let found = source
        .by_ref()
        .take(size as u64)
        .read_to_end(&mut string_bytes)?;
    *total_bytes += found;
    if found != size {
        return Err(TraceFileError::Truncated {
            field,
            expected: size,
            found,
        });
    }
    String::from_utf8(string_bytes)
        .map_err(|source| TraceFileError::InvalidString { field, source })
}

fn load_raw_trace<R: Read>(
    source: &mut R,
    size: usize,
    total_bytes: &mut usize,
) -> LoadResult<Vec<Intensity>> {
    let mut trace_bytes = vec![0; size_of::<Intensity>() * size];
    load_scalar(source, "raw trace", &mut trace_bytes, total_bytes)?;
    Ok(trace_bytes
        .chunks_exact(size_of::<Intensity>())
        .map(|pair| Intensity::from_be_bytes([pair[0], pair[1]]))
        .collect())
}
