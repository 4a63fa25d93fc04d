//! CSV sink for invalid principals.
//!
//! The header is written as soon as the reporter is created, so a run that
//! finds nothing still leaves a file with just the header row. Rows go through
//! a buffered writer; [`ErrorReporter::finalize`] must be awaited before the
//! process exits or buffered rows are lost.

use crate::types::ErrorRecord;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::warn;

pub const REPORT_HEADER: &str = "principalId,displayName,email,message";

pub struct ErrorReporter<W: AsyncWrite + Unpin> {
    writer: BufWriter<W>,
    rows_written: usize,
}

impl ErrorReporter<File> {
    /// Create (or truncate) the report file at `path` and write the header.
    pub async fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .await
            .with_context(|| format!("Failed to create report file {}", path.display()))?;
        Self::new(file).await
    }
}

impl<W: AsyncWrite + Unpin> ErrorReporter<W> {
    pub async fn new(sink: W) -> Result<Self> {
        let mut writer = BufWriter::new(sink);
        writer
            .write_all(format!("{REPORT_HEADER}\n").as_bytes())
            .await
            .context("Failed to write report header")?;
        Ok(Self {
            writer,
            rows_written: 0,
        })
    }

    pub async fn report(&mut self, record: &ErrorRecord) -> Result<()> {
        warn!(
            principal_id = %record.principal_id,
            email = %record.email,
            "{}",
            record.message
        );

        let line = format!(
            "{},{},{},{}\n",
            csv_escape(&record.principal_id),
            csv_escape(&record.display_name),
            csv_escape(&record.email),
            csv_escape(record.message.message()),
        );
        self.writer
            .write_all(line.as_bytes())
            .await
            .context("Failed to write report row")?;
        self.rows_written += 1;
        Ok(())
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Flush every buffered row and shut the sink down, handing it back.
    pub async fn finalize(mut self) -> Result<W> {
        self.writer
            .flush()
            .await
            .context("Failed to flush report")?;
        self.writer
            .shutdown()
            .await
            .context("Failed to close report")?;
        Ok(self.writer.into_inner())
    }
}

fn csv_escape(raw: &str) -> String {
    if raw.contains(['"', ',', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}
