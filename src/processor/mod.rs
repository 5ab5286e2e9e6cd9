//! Batch conversion engine for livdb files.
//!
//! Discovers input files, converts them concurrently on blocking worker
//! threads and merges the per-file rows, in input order, into the MagIC
//! tables written to the output directory.

pub mod discovery;

#[cfg(test)]
pub mod tests;

use crate::classifier::{ExperimentContext, classify_block};
use crate::collapse::collapse_repeats;
use crate::config::ConverterConfig;
use crate::emitter::{self, SpecimenNames, TableKind};
use crate::error::{MagicError, Result};
use crate::models::{NormalizedRecord, ProcessingStats};
use crate::normalize::normalize_record;
use crate::reader::read_livdb_file;
use crate::table::{MagicTable, Row};

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use tokio::task;
use tracing::{debug, error, info, warn};

/// Rows produced from one livdb file
#[derive(Debug, Default)]
pub struct FileOutput {
    pub measurements: Vec<Row>,
    pub specimens: Vec<Row>,
    pub samples: Vec<Row>,
    pub sites: Vec<Row>,
    pub stats: ProcessingStats,
}

/// Converts a set of livdb files into one set of MagIC tables
#[derive(Debug)]
pub struct LivdbProcessor {
    inputs: Vec<PathBuf>,
    config: ConverterConfig,
    show_progress: bool,
}

impl LivdbProcessor {
    pub fn new(inputs: Vec<PathBuf>, config: ConverterConfig) -> Self {
        Self {
            inputs,
            config,
            show_progress: false,
        }
    }

    /// Show a progress bar while files are converted
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Main processing entry point
    pub async fn process(&self) -> Result<ProcessingStats> {
        let start_time = Instant::now();
        self.config.validate()?;

        let files = discovery::discover_livdb_files(&self.inputs).await?;
        info!("Found {} livdb files", files.len());
        if files.is_empty() {
            warn!("No livdb files found in the given inputs");
            return Ok(ProcessingStats {
                processing_time_ms: start_time.elapsed().as_millis(),
                ..Default::default()
            });
        }

        fs::create_dir_all(&self.config.output_dir).await?;

        let progress = self.progress_bar(files.len());
        let workers = self.config.workers.max(1);

        let results = stream::iter(files.into_iter())
            .map(|path| {
                let config = self.config.clone();
                let progress = progress.clone();
                async move {
                    let task_path = path.clone();
                    let result = task::spawn_blocking(move || convert_file(&task_path, &config))
                        .await
                        .map_err(|e| MagicError::ProcessingFailed {
                            path: path.clone(),
                            reason: format!("worker task failed: {}", e),
                        })
                        .and_then(|result| result);
                    if let Some(pb) = &progress {
                        pb.inc(1);
                        pb.set_message(file_label(&path));
                    }
                    (path, result)
                }
            })
            .buffered(workers)
            .collect::<Vec<_>>()
            .await;

        if let Some(pb) = &progress {
            pb.finish_with_message("Conversion complete");
        }

        let mut stats = ProcessingStats::default();
        let mut outputs = Vec::with_capacity(results.len());
        for (path, result) in results {
            match result {
                Ok(output) => {
                    stats.merge(&output.stats);
                    outputs.push(output);
                }
                Err(e) => {
                    error!("Failed to convert {}: {}", path.display(), e);
                    stats.files_failed += 1;
                }
            }
        }

        for table in self.assemble_tables(outputs) {
            let path = self
                .config
                .output_dir
                .join(format!("{}.txt", table.table_type));
            table.write_file(&path)?;
            debug!("Wrote {} rows to {}", table.len(), path.display());
            stats.output_paths.push(path);
        }

        stats.processing_time_ms = start_time.elapsed().as_millis();
        info!(
            "Converted {} measurements from {} specimens",
            stats.measurements_written,
            stats.specimens_converted
        );
        Ok(stats)
    }

    /// Merge per-file rows; specimens, samples and sites keep their first row
    fn assemble_tables(&self, outputs: Vec<FileOutput>) -> Vec<MagicTable> {
        let model = self.config.data_model;
        let columns = emitter::columns(model);

        let mut measurements = MagicTable::new(TableKind::Measurements.table_type(model));
        let mut specimens = UniqueRows::new(TableKind::Specimens.table_type(model), columns.specimen);
        let mut samples = UniqueRows::new(TableKind::Samples.table_type(model), columns.sample);
        let mut sites = UniqueRows::new(TableKind::Sites.table_type(model), columns.site);

        for output in outputs {
            measurements.extend(output.measurements);
            specimens.extend(output.specimens);
            samples.extend(output.samples);
            sites.extend(output.sites);
        }

        let mut result = vec![measurements, specimens.table, samples.table, sites.table];
        if !self.config.location.is_empty() {
            let mut locations = MagicTable::new(TableKind::Locations.table_type(model));
            locations.push(
                Row::new()
                    .with(columns.location, self.config.location.as_str())
                    .with(columns.citations, self.config.citation.as_str()),
            );
            result.push(locations);
        }
        result
    }

    fn progress_bar(&self, total: usize) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Some(pb)
    }
}

struct UniqueRows {
    table: MagicTable,
    key: &'static str,
    seen: HashSet<String>,
}

impl UniqueRows {
    fn new(table_type: &str, key: &'static str) -> Self {
        Self {
            table: MagicTable::new(table_type),
            key,
            seen: HashSet::new(),
        }
    }

    fn extend(&mut self, rows: Vec<Row>) {
        for row in rows {
            let name = row.get(self.key).unwrap_or_default().to_string();
            if self.seen.insert(name) {
                self.table.push(row);
            }
        }
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Convert every specimen block of one livdb file
pub fn convert_file(path: &Path, config: &ConverterConfig) -> Result<FileOutput> {
    let source = path.display().to_string();
    let blocks = read_livdb_file(path)?;
    let model = config.data_model;
    let mut output = FileOutput::default();

    for block in blocks {
        let specimen = block.specimen().to_string();
        let protocol = match ExperimentContext::for_experiment(&specimen, block.experiment_type()) {
            Ok(context) => context.protocol,
            Err(e) => {
                error!("{}: {}; dropping the block", source, e);
                output.stats.specimens_skipped += 1;
                continue;
            }
        };

        let record_count = block.records.len();
        let records = collapse_repeats(&specimen, block.records);
        output.stats.repeats_collapsed += record_count - records.len();

        let normalized: Vec<NormalizedRecord> = records
            .into_iter()
            .map(|raw| {
                let (record, warnings) = normalize_record(raw, protocol.energy);
                for warning in warnings {
                    warn!("{}: specimen {}: {}", source, specimen, warning);
                    output.stats.warnings += 1;
                }
                record
            })
            .collect();

        let steps = classify_block(&specimen, protocol, normalized);
        for warning in steps.iter().flat_map(|step| step.warnings.iter()) {
            warn!("{}: {}", source, warning);
            output.stats.warnings += 1;
        }

        let sample = config.sample_naming.apply(&specimen);
        let site = config.site_naming.apply(&sample);
        let names = SpecimenNames {
            specimen,
            sample,
            site,
            location: config.location.clone(),
            citation: config.citation.clone(),
        };

        output.measurements.extend(
            steps
                .iter()
                .map(|step| emitter::measurement_row(model, &names, &block.header, protocol, step)),
        );
        output
            .specimens
            .push(emitter::specimen_row(model, &names, &block.header));
        output.samples.push(emitter::sample_row(model, &names));
        output
            .sites
            .push(emitter::site_row(model, &names, &block.header));

        debug!(
            "{}: specimen {} ({}) gave {} measurements",
            source,
            names.specimen,
            protocol.name,
            steps.len()
        );
        output.stats.specimens_converted += 1;
        output.stats.measurements_written += steps.len();
    }

    output.stats.files_processed = 1;
    Ok(output)
}
