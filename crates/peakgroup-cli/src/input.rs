use std::path::PathBuf;

use anyhow::{ensure, Context};
use clap::ArgMatches;
use peakgroup_core::background::BackgroundStrategy;
use peakgroup_core::spectrum::ProcessingSettings;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Clone, Debug)]
/// Actual processing parameters - may include overrides or default values not set by user
pub struct Search {
    pub version: String,
    pub settings: ProcessingSettings,
    pub scan_paths: Vec<String>,
    pub output_paths: Vec<String>,

    #[serde(skip_serializing)]
    pub output_directory: PathBuf,
}

#[derive(Deserialize, Default, Debug)]
/// Input parameters deserialized from JSON file
pub struct Input {
    ms1_ppm: Option<f64>,
    ms2_ppm: Option<f64>,
    charges: Option<(u8, u8)>,
    min_isotope_peaks: Option<usize>,
    max_isotope_peaks: Option<usize>,
    bin_threshold: Option<f32>,
    background: Option<BackgroundStrategy>,
    remove_background: Option<bool>,
    output_directory: Option<String>,
    scan_paths: Option<Vec<String>>,
}

impl Input {
    pub fn from_arguments(matches: ArgMatches) -> anyhow::Result<Self> {
        let path = matches
            .get_one::<String>("parameters")
            .expect("required parameters");
        let mut input = Input::load(path)
            .with_context(|| format!("Failed to read parameters from `{path}`"))?;

        // Handle JSON configuration overrides
        if let Some(output_directory) = matches.get_one::<String>("output_directory") {
            log::trace!("overriding `output_directory` parameter.");
            input.output_directory = Some(output_directory.into());
        }
        if let Some(scan_paths) = matches.get_many::<String>("scan_paths") {
            log::trace!("overriding `scan_paths` parameter.");
            input.scan_paths = Some(scan_paths.into_iter().map(|p| p.into()).collect());
        }

        ensure!(
            input.scan_paths.as_ref().map_or(false, |p| !p.is_empty()),
            "`scan_paths` must be set. For more information try '--help'"
        );

        Ok(input)
    }

    pub fn load<S: AsRef<str>>(path: S) -> anyhow::Result<Self> {
        peakgroup_core::read_json(path).map_err(anyhow::Error::from)
    }

    fn check_tolerance(name: &str, ppm: f64) -> f64 {
        if ppm < 0.0 {
            log::warn!("`{}` is negative ({}), using its absolute value", name, ppm);
        }
        if ppm.abs() > 50.0 {
            log::warn!("`{}` is higher than expected: {} ppm", name, ppm.abs());
        }
        ppm.abs()
    }

    /// Resolve missing values to their defaults, and sanity check the rest
    pub fn build(self) -> anyhow::Result<Search> {
        let default = ProcessingSettings::default();

        let (start_charge, end_charge) = self
            .charges
            .unwrap_or((default.start_charge, default.end_charge));
        ensure!(
            start_charge >= 1,
            "`charges` must start at 1 or higher, got {}",
            start_charge
        );
        ensure!(
            start_charge <= end_charge,
            "Minimum charge greater than maximum! Typical usage: `charges: [1, 5]`"
        );

        let min_isotope_peaks = self.min_isotope_peaks.unwrap_or(default.min_isotope_peaks);
        let max_isotope_peaks = self.max_isotope_peaks.unwrap_or(default.max_isotope_peaks);
        if min_isotope_peaks > max_isotope_peaks {
            log::warn!(
                "`min_isotope_peaks` ({}) is greater than `max_isotope_peaks` ({}), no isotope groups will be reported",
                min_isotope_peaks,
                max_isotope_peaks
            );
        }
        if min_isotope_peaks <= 1 {
            log::warn!("`min_isotope_peaks` <= 1: every peak will be reported as an isotope group");
        }

        let remove_background = self.remove_background.unwrap_or(false);
        if remove_background && self.background.is_none() {
            log::warn!("`remove_background: true` has no effect without a `background` strategy");
        }

        let settings = ProcessingSettings {
            ms1_ppm: Self::check_tolerance("ms1_ppm", self.ms1_ppm.unwrap_or(default.ms1_ppm)),
            ms2_ppm: Self::check_tolerance("ms2_ppm", self.ms2_ppm.unwrap_or(default.ms2_ppm)),
            start_charge,
            end_charge,
            min_isotope_peaks,
            max_isotope_peaks,
            bin_threshold: self.bin_threshold.unwrap_or(default.bin_threshold),
            background: self.background,
            remove_background,
        };

        let scan_paths = self.scan_paths.unwrap_or_default();

        let output_directory = match self.output_directory {
            Some(path) => {
                let path = PathBuf::from(path);
                std::fs::create_dir_all(&path).with_context(|| {
                    format!("Failed to create output directory `{}`", path.display())
                })?;
                path
            }
            None => std::env::current_dir()?,
        };

        Ok(Search {
            version: clap::crate_version!().into(),
            settings,
            scan_paths,
            output_paths: Vec::new(),
            output_directory,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() -> anyhow::Result<()> {
        let input: Input = serde_json::from_str(r#"{ "scan_paths": ["a.json"] }"#)?;
        let search = input.build()?;
        assert_eq!(search.settings, ProcessingSettings::default());
        assert_eq!(search.scan_paths, vec!["a.json".to_string()]);
        Ok(())
    }

    #[test]
    fn overrides() -> anyhow::Result<()> {
        let input: Input = serde_json::from_str(
            r#"{
                "ms1_ppm": -5.0,
                "charges": [2, 3],
                "max_isotope_peaks": 4,
                "background": { "dynamic": { "boundary": 200.0 } },
                "remove_background": true
            }"#,
        )?;
        let search = input.build()?;
        assert_eq!(search.settings.ms1_ppm, 5.0);
        assert_eq!(search.settings.ms2_ppm, 20.0);
        assert_eq!((search.settings.start_charge, search.settings.end_charge), (2, 3));
        assert_eq!(search.settings.max_isotope_peaks, 4);
        assert_eq!(
            search.settings.background,
            Some(BackgroundStrategy::Dynamic { boundary: 200.0 })
        );
        assert!(search.settings.remove_background);
        Ok(())
    }

    #[test]
    fn invalid_charges() {
        let input: Input = serde_json::from_str(r#"{ "charges": [4, 2] }"#).unwrap();
        assert!(input.build().is_err());
        let input: Input = serde_json::from_str(r#"{ "charges": [0, 2] }"#).unwrap();
        assert!(input.build().is_err());
    }
}
