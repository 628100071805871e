//! Noise floor estimation for a single scan.
//!
//! Three strategies are available, see [`BackgroundStrategy`]. The dynamic and
//! constant estimators only report a value, and the caller decides whether to
//! strip peaks below it ([`Scan::remove_below`]). The adjacent-peak estimator
//! applies itself.

use serde::{Deserialize, Serialize};

use crate::mass::NEUTRON;
use crate::spectrum::{Peak, Scan};

/// The dynamic estimator never lets the run-length window drop below this
const MIN_WINDOW: usize = 200;

/// Minimum number of peaks for the adjacent-peak estimator
pub const MIN_ADJACENT_PEAKS: usize = 10;
/// Number of candidate thresholds swept by the adjacent-peak estimator
const SWEEP_STEPS: usize = 20;
/// Adopt a threshold once noise pairs < structured pairs * NOISE_RATIO
const NOISE_RATIO: f32 = 2.0;
/// Consecutive peaks closer than this are counted as noise
const NOISE_SPACING: f64 = 0.23;
/// Maximum deviation (m/z) from an isotope spacing
const SPACING_TOLERANCE: f64 = 0.01;
/// Charge states tested by the adjacent-peak estimator
const MAX_SPACING_CHARGE: u8 = 4;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundStrategy {
    /// Percentile/plateau scan over sorted intensities
    Dynamic { boundary: f32 },
    /// Highest repeated low intensity value
    Constant,
    /// Sweep thresholds until isotope-like spacings dominate noise-like ones
    AdjacentPeak,
}

impl BackgroundStrategy {
    /// Estimate the noise floor of `scan`, and store it in `scan.background`.
    ///
    /// Only [`BackgroundStrategy::AdjacentPeak`] removes peaks.
    pub fn estimate(&self, scan: &mut Scan) -> f32 {
        let background = match self {
            BackgroundStrategy::Dynamic { boundary } => {
                dynamic_background(&scan.intensities(), *boundary)
            }
            BackgroundStrategy::Constant => constant_background(&scan.intensities()),
            BackgroundStrategy::AdjacentPeak => {
                return adjacent_peak_background(scan).unwrap_or(scan.background)
            }
        };
        scan.background = background;
        background
    }
}

fn sorted_intensities(intensities: &[f32]) -> Vec<f32> {
    let mut sorted = intensities.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Length of the run of values equal to `sorted[start]`
fn run_length(sorted: &[f32], start: usize) -> usize {
    sorted[start..]
        .iter()
        .take_while(|&&x| x == sorted[start])
        .count()
}

/// Nearest-rank percentile of already sorted values, `q` in `[0, 1]`
fn percentile(sorted: &[f32], q: f32) -> f32 {
    let idx = ((sorted.len() - 1) as f32 * q).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Walk runs of identical intensities from the bottom up. A run becomes the
/// new background if it is longer than a fifth of the current window, or if it
/// is a plateau (run of at least two) below the 60th percentile. Every adopted
/// value shrinks the window to `max(200, peaks left above the run)`, which
/// makes later plateaus easier to qualify.
///
/// The walk stops as soon as an adopted value exceeds `boundary`.
pub fn dynamic_background(intensities: &[f32], boundary: f32) -> f32 {
    if intensities.is_empty() {
        return 0.0;
    }
    let sorted = sorted_intensities(intensities);
    let n = sorted.len();
    let percentile_60 = sorted[(n * 6 / 10).min(n - 1)];

    let mut window = n;
    let mut background = 0.0;
    let mut idx = 0;
    while idx < n {
        let value = sorted[idx];
        let run = run_length(&sorted, idx);
        let end = idx + run;

        let large_plateau = run as f32 > window as f32 / 5.0;
        let low_plateau = run > 1 && value < percentile_60;
        if large_plateau || low_plateau {
            background = value;
            window = MIN_WINDOW.max(n - end);
            if background > boundary {
                break;
            }
        }
        idx = end;
    }
    background
}

/// Sentinel added to the intensities before the constant background walk
const CONSTANT_SENTINEL: f32 = 1.0;

/// Highest value of the contiguous block of repeated values at the bottom of
/// the intensity distribution. The sentinel `1.0` is added to the values
/// before sorting, and is returned as-is when no value repeats.
///
/// Values below the first repeated value are skipped, and the walk stops at
/// the first value above it that does not repeat.
pub fn constant_background(intensities: &[f32]) -> f32 {
    let mut values = intensities.to_vec();
    values.push(CONSTANT_SENTINEL);
    let sorted = sorted_intensities(&values);

    let mut background = None;
    let mut idx = 0;
    while idx < sorted.len() {
        let run = run_length(&sorted, idx);
        match (run > 1, background) {
            (true, _) => background = Some(sorted[idx]),
            (false, Some(_)) => break,
            (false, None) => {}
        }
        idx += run;
    }
    background.unwrap_or(CONSTANT_SENTINEL)
}

/// Count (structured, noise) consecutive pairs among peaks with
/// `intensity >= threshold`
fn spacing_counts(peaks: &[Peak], threshold: f32) -> (usize, usize) {
    let survivors = peaks
        .iter()
        .filter(|peak| peak.intensity >= threshold)
        .collect::<Vec<_>>();

    let mut structured = 0;
    let mut noise = 0;
    for pair in survivors.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let delta = b.mz - a.mz;
        if delta < NOISE_SPACING {
            noise += 1;
        } else if a.intensity > b.intensity
            && (1..=MAX_SPACING_CHARGE)
                .any(|z| (delta - NEUTRON / z as f64).abs() <= SPACING_TOLERANCE)
        {
            structured += 1;
        }
    }
    (structured, noise)
}

/// Sweep 20 thresholds between the minimum and the 70th percentile intensity
/// and adopt the first one where noise-like spacings no longer outnumber
/// isotope-like spacings two to one. A positive adopted threshold is written
/// to `scan.background`, and all peaks below it are removed.
///
/// Returns `None` if the scan has fewer than 10 peaks, or if no threshold
/// qualifies.
pub fn adjacent_peak_background(scan: &mut Scan) -> Option<f32> {
    if scan.peaks.len() < MIN_ADJACENT_PEAKS {
        return None;
    }
    let peaks = scan.peaks.to_vec();
    let sorted = sorted_intensities(&scan.intensities());
    let lo = sorted[0];
    let hi = percentile(&sorted, 0.7);
    let step = (hi - lo) / SWEEP_STEPS as f32;

    for i in 0..SWEEP_STEPS {
        let threshold = lo + step * i as f32;
        let (structured, noise) = spacing_counts(&peaks, threshold);
        if (noise as f32) < structured as f32 * NOISE_RATIO {
            if threshold > 0.0 {
                scan.background = threshold;
                scan.remove_below(threshold);
            }
            return Some(threshold);
        }
    }
    None
}
