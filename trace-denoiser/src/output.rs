use crate::processing::DenoisedChannel;
use std::{
    fs::File,
    io::{BufWriter, Error, Write},
    path::Path,
};

const HEADER: &str = "event,channel,sample,raw,denoised";

/// Writes denoised channels as CSV, one line per sample.
pub(crate) struct CsvWriter<W: Write> {
    writer: BufWriter<W>,
}

impl CsvWriter<File> {
    pub(crate) fn create(path: &Path) -> Result<Self, Error> {
        Self::new(File::create(path)?)
    }
}

impl<W: Write> CsvWriter<W> {
    pub(crate) fn new(inner: W) -> Result<Self, Error> {
        let mut writer = BufWriter::new(inner);
        writeln!(writer, "{HEADER}")?;
        Ok(Self { writer })
    }

    pub(crate) fn write_channel(
        &mut self,
        trace_event: i32,
        channel: &DenoisedChannel,
    ) -> Result<(), Error> {
        let id = channel.summary.channel;
        for (sample, (raw, denoised)) in channel.raw.iter().zip(&channel.denoised).enumerate() {
            writeln!(self.writer, "{trace_event},{id},{sample},{raw},{denoised}")?;
        }
        Ok(())
    }

    /// Flushes buffered lines and hands back the underlying writer.
    pub(crate) fn finish(self) -> Result<W, Error> {
        self.writer.into_inner().map_err(|e| e.into_error())
    }
}
