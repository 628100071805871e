use fnv::FnvHashSet;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::background::BackgroundStrategy;
use crate::binning;
use crate::deisotope::{Deisotoper, IsotopeGroup};
use crate::sorted::{SegmentedList, SortKey};
use crate::Error;

/// A centroided peak
#[derive(PartialEq, PartialOrd, Copy, Clone, Default, Debug, Serialize, Deserialize)]
pub struct Peak {
    pub mz: f64,
    pub intensity: f32,
}

impl SortKey for Peak {
    fn sort_key(&self) -> f64 {
        self.mz
    }
}

#[derive(Default, Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Precursor {
    pub mz: f64,
    pub charge: Option<u8>,
}

/// A scan as delivered by a file parser, with parallel m/z and intensity
/// arrays
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct RawScan {
    pub id: String,
    pub ms_level: u8,
    /// Retention time
    pub retention_time: f32,
    #[serde(default)]
    pub precursor_mz: Option<f64>,
    #[serde(default)]
    pub precursor_charge: Option<u8>,
    /// m/z values, sorted in ascending order
    pub mz: Vec<f64>,
    pub intensity: Vec<f32>,
}

#[derive(Clone, Debug)]
pub struct Scan {
    pub id: String,
    /// MSn level
    pub ms_level: u8,
    /// Retention time
    pub retention_time: f32,
    /// Selected ion, if `ms_level > 1`
    pub precursor: Option<Precursor>,
    /// Estimated noise floor, 0.0 until a [`BackgroundStrategy`] has run
    pub background: f32,
    /// MS peaks, sorted by m/z in ascending order
    pub peaks: SegmentedList<Peak>,
}

impl Scan {
    /// Create a new [`Scan`]. Peaks must already be sorted by m/z, the first
    /// out-of-order peak is reported as [`Error::Unsorted`]
    pub fn new<S: Into<String>>(
        id: S,
        ms_level: u8,
        retention_time: f32,
        peaks: Vec<Peak>,
    ) -> Result<Self, Error> {
        let id = id.into();
        if let Some(index) = peaks.windows(2).position(|w| w[0].mz > w[1].mz) {
            return Err(Error::Unsorted {
                id,
                index: index + 1,
                mz: peaks[index + 1].mz,
            });
        }
        Ok(Scan {
            id,
            ms_level,
            retention_time,
            precursor: None,
            background: 0.0,
            peaks: SegmentedList::from_sorted(peaks),
        })
    }

    pub fn with_precursor(mut self, precursor: Precursor) -> Self {
        self.precursor = Some(precursor);
        self
    }

    pub fn intensities(&self) -> Vec<f32> {
        self.peaks.iter().map(|peak| peak.intensity).collect()
    }

    /// Remove all peaks with intensity below `threshold`, returning the
    /// number of peaks removed
    pub fn remove_below(&mut self, threshold: f32) -> usize {
        let before = self.peaks.len();
        self.peaks.retain(|peak| peak.intensity >= threshold);
        self.peaks.finalize();
        before - self.peaks.len()
    }

    pub fn total_ion_current(&self) -> f32 {
        self.peaks.iter().map(|peak| peak.intensity).sum()
    }

    /// Most intense peak
    pub fn base_peak(&self) -> Option<Peak> {
        self.peaks
            .iter()
            .copied()
            .max_by(|a, b| a.intensity.total_cmp(&b.intensity))
    }

    /// Peaks on the fixed 0.1 m/z grid, see [`binning::bin`]
    pub fn binned(&self, threshold: f32, exclude: &FnvHashSet<usize>) -> Vec<Peak> {
        binning::bin(&self.peaks.to_vec(), threshold, exclude)
    }
}

impl TryFrom<RawScan> for Scan {
    type Error = Error;

    fn try_from(raw: RawScan) -> Result<Self, Self::Error> {
        if raw.mz.len() != raw.intensity.len() {
            return Err(Error::Length {
                id: raw.id,
                mz: raw.mz.len(),
                intensity: raw.intensity.len(),
            });
        }
        let peaks = raw
            .mz
            .iter()
            .zip(raw.intensity.iter())
            .map(|(&mz, &intensity)| Peak { mz, intensity })
            .collect();
        let scan = Scan::new(raw.id, raw.ms_level, raw.retention_time, peaks)?;
        Ok(match raw.precursor_mz {
            Some(mz) => scan.with_precursor(Precursor {
                mz,
                charge: raw.precursor_charge,
            }),
            None => scan,
        })
    }
}

/// Per-scan processing parameters
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessingSettings {
    /// Isotope tolerance for MS1 scans (ppm)
    pub ms1_ppm: f64,
    /// Isotope tolerance for MSn scans (ppm)
    pub ms2_ppm: f64,
    pub start_charge: u8,
    pub end_charge: u8,
    pub min_isotope_peaks: usize,
    pub max_isotope_peaks: usize,
    /// Intensity threshold used when binning scans for comparison
    pub bin_threshold: f32,
    pub background: Option<BackgroundStrategy>,
    /// Strip peaks below the estimated background
    pub remove_background: bool,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            ms1_ppm: 10.0,
            ms2_ppm: 20.0,
            start_charge: 1,
            end_charge: 5,
            min_isotope_peaks: 2,
            max_isotope_peaks: 5,
            bin_threshold: 0.0,
            background: None,
            remove_background: false,
        }
    }
}

/// A scan collapsed to monoisotopic peaks, and the isotope groups that were
/// removed from it
#[derive(Clone, Debug)]
pub struct ProcessedScan {
    pub scan: Scan,
    pub groups: Vec<IsotopeGroup>,
}

pub struct SpectrumProcessor {
    pub settings: ProcessingSettings,
}

impl SpectrumProcessor {
    pub fn new(settings: ProcessingSettings) -> Self {
        Self { settings }
    }

    /// Build the [`Deisotoper`] for a scan. MSn scans use the MS2 tolerance,
    /// and never consider charges above the precursor charge, if known.
    pub fn deisotoper(&self, scan: &Scan) -> Deisotoper {
        let s = &self.settings;
        let (ppm, end_charge) = match scan.ms_level {
            1 => (s.ms1_ppm, s.end_charge),
            _ => {
                let end = scan
                    .precursor
                    .and_then(|p| p.charge)
                    .map(|z| z.min(s.end_charge))
                    .unwrap_or(s.end_charge);
                (s.ms2_ppm, end)
            }
        };
        Deisotoper::new(
            s.start_charge..=end_charge,
            s.min_isotope_peaks,
            s.max_isotope_peaks,
            ppm,
        )
    }

    /// Run the full per-scan pipeline: background estimation (optional) and
    /// deisotoping
    pub fn process(&self, mut scan: Scan) -> ProcessedScan {
        if let Some(strategy) = self.settings.background {
            let background = strategy.estimate(&mut scan);
            if self.settings.remove_background && background > 0.0 {
                scan.remove_below(background);
            }
        }
        let groups = self.deisotoper(&scan).apply(&mut scan);
        ProcessedScan { scan, groups }
    }

    /// Process many scans in parallel on the current rayon thread pool.
    /// Output order matches input order.
    pub fn process_many(&self, scans: Vec<Scan>) -> Vec<ProcessedScan> {
        scans
            .into_par_iter()
            .map(|scan| self.process(scan))
            .collect()
    }

    /// Bin a processed scan onto the fixed grid, using `bin_threshold`
    pub fn bin(&self, scan: &Scan) -> Vec<Peak> {
        scan.binned(self.settings.bin_threshold, &FnvHashSet::default())
    }
}
