use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use log::info;
use peakgroup_core::spectrum::{ProcessedScan, RawScan, Scan, SpectrumProcessor};
use rayon::prelude::*;

use crate::input::Search;

pub struct Runner {
    pub parameters: Search,
    start: Instant,
}

/// Scans read from a single input file
pub struct ScanFile {
    pub file_id: usize,
    pub scans: Vec<Scan>,
}

/// All processed scans, tagged with the index of the file they came from
#[derive(Default)]
pub struct Processed {
    pub scans: Vec<(usize, ProcessedScan)>,
}

impl Processed {
    pub fn group_count(&self) -> usize {
        self.scans.iter().map(|(_, s)| s.groups.len()).sum()
    }

    pub fn peak_count(&self) -> usize {
        self.scans.iter().map(|(_, s)| s.scan.peaks.len()).sum()
    }
}

/// Read a JSON array of [`RawScan`]s, and validate them into [`Scan`]s
pub fn read_scans<S: AsRef<str>>(path: S) -> anyhow::Result<Vec<Scan>> {
    let raw: Vec<RawScan> = peakgroup_core::read_json(path.as_ref())?;
    raw.into_iter()
        .map(|raw| Scan::try_from(raw).map_err(anyhow::Error::from))
        .collect()
}

impl Runner {
    pub fn new(parameters: Search) -> Self {
        Self {
            parameters,
            start: Instant::now(),
        }
    }

    // Create a path for `file_name` in the output directory
    pub(crate) fn make_path<S: AsRef<str>>(&self, file_name: S) -> PathBuf {
        self.parameters.output_directory.join(file_name.as_ref())
    }

    /// File names (without directories) of every input path, used in outputs
    pub fn filenames(&self) -> Vec<String> {
        self.parameters
            .scan_paths
            .iter()
            .map(|s| {
                Path::new(s)
                    .file_name()
                    .map(|f| f.to_string_lossy().to_string())
                    .unwrap_or_else(|| s.clone())
            })
            .collect()
    }

    /// Read all input files in parallel. Files that fail to load are logged
    /// and skipped.
    pub fn read_files(&self) -> Vec<ScanFile> {
        let start = Instant::now();
        let files = self
            .parameters
            .scan_paths
            .par_iter()
            .enumerate()
            .filter_map(|(file_id, path)| match read_scans(path) {
                Ok(scans) => {
                    log::trace!("- {}: read {} scans", path, scans.len());
                    Some(ScanFile { file_id, scans })
                }
                Err(e) => {
                    log::error!("- {}: {:#}", path, e);
                    None
                }
            })
            .collect::<Vec<_>>();

        info!(
            "- file IO: {:8} ms ({} of {} files)",
            start.elapsed().as_millis(),
            files.len(),
            self.parameters.scan_paths.len()
        );
        files
    }

    pub fn process(&self, files: Vec<ScanFile>) -> Processed {
        let sp = SpectrumProcessor::new(self.parameters.settings);
        let start = Instant::now();

        let mut scans = Vec::new();
        for file in files {
            let n = file.scans.len();
            let processed = sp.process_many(file.scans);
            debug_assert_eq!(processed.len(), n);
            scans.extend(processed.into_iter().map(|scan| (file.file_id, scan)));
        }

        let duration = start.elapsed().as_millis() as usize;
        let rate = scans.len() * 1000 / (duration + 1);
        info!("- process: {:8} ms ({} scans/s)", duration, rate);
        Processed { scans }
    }

    pub fn run(mut self) -> anyhow::Result<Search> {
        let files = self.read_files();
        anyhow::ensure!(!files.is_empty(), "no input files could be read");

        let processed = self.process(files);
        info!(
            "discovered {} isotope groups in {} scans, {} peaks remaining",
            processed.group_count(),
            processed.scans.len(),
            processed.peak_count()
        );

        log::trace!("writing outputs");
        let filenames = self.filenames();
        let groups = self.write_groups(&processed, &filenames)?;
        self.parameters.output_paths.push(groups);
        let peaks = self.write_peaks(&processed, &filenames)?;
        self.parameters.output_paths.push(peaks);

        let path = self.make_path("results.json");
        self.parameters
            .output_paths
            .push(path.display().to_string());
        println!("{}", serde_json::to_string_pretty(&self.parameters)?);

        let bytes = serde_json::to_vec_pretty(&self.parameters)?;
        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to write `{}`", path.display()))?;

        info!("finished in {}s", self.start.elapsed().as_secs());
        Ok(self.parameters)
    }
}
