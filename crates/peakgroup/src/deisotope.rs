//! Charge-resolved isotope envelope detection.
//!
//! Deisotoping is done in two steps. First, isotope chains are planned for
//! every charge state over an immutable snapshot of the scan's peaks - the
//! charge passes are independent of each other, and the same peak may take
//! part in envelopes of several charge states. Then all non-monoisotopic
//! members of every envelope are removed from the scan in a single batch.

use std::ops::RangeInclusive;

use fnv::FnvHashSet;
use serde::Serialize;

use crate::mass::{ppm_error, Tolerance, PROTON};
use crate::spectrum::{Peak, Scan};

/// A set of peaks spaced ~1/charge m/z apart, originating from the
/// isotopologues of a single ion
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IsotopeGroup {
    charge: u8,
    /// Sorted by m/z, the monoisotopic peak is first
    peaks: Vec<Peak>,
}

impl IsotopeGroup {
    pub fn charge(&self) -> u8 {
        self.charge
    }

    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    pub fn monoisotopic(&self) -> &Peak {
        &self.peaks[0]
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    /// Neutral mass of the monoisotopic peak
    pub fn neutral_mass(&self) -> f64 {
        (self.monoisotopic().mz - PROTON) * self.charge as f64
    }

    pub fn total_intensity(&self) -> f32 {
        self.peaks.iter().map(|peak| peak.intensity).sum()
    }
}

/// Indices (into the planning snapshot) of an isotope chain
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chain {
    pub charge: u8,
    pub indices: Vec<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Deisotoper {
    pub charges: RangeInclusive<u8>,
    /// Minimum number of peaks for a chain to be reported
    pub min_peaks: usize,
    /// Maximum number of peaks in a chain, including the monoisotopic peak
    pub max_peaks: usize,
    /// Base ppm tolerance, the `k`-th isotope is allowed `ppm * (1 + 0.5k)`
    pub ppm: f64,
}

/// Deisotope `scan` in place, returning the detected isotope groups.
///
/// See [`Deisotoper`]
pub fn deisotope(
    scan: &mut Scan,
    charges: RangeInclusive<u8>,
    min_peaks: usize,
    max_peaks: usize,
    ppm: f64,
) -> Vec<IsotopeGroup> {
    Deisotoper::new(charges, min_peaks, max_peaks, ppm).apply(scan)
}

impl Deisotoper {
    pub fn new(charges: RangeInclusive<u8>, min_peaks: usize, max_peaks: usize, ppm: f64) -> Self {
        Self {
            charges,
            min_peaks,
            max_peaks,
            ppm,
        }
    }

    /// Find isotope chains for every charge state in `self.charges`.
    ///
    /// # Invariants
    /// * `peaks` must be sorted by m/z in ascending order
    pub fn plan(&self, peaks: &[Peak]) -> Vec<Chain> {
        let mut chains = Vec::new();
        for charge in self.charges.clone() {
            if charge == 0 {
                continue;
            }

            // Peaks claimed by a chain of this charge state cannot start or
            // join another chain of the same charge
            let mut consumed = vec![false; peaks.len()];
            for start in 0..peaks.len() {
                if consumed[start] {
                    continue;
                }
                let indices = self.extend(peaks, start, charge, &consumed);
                if indices.len() >= self.min_peaks {
                    for &ix in &indices {
                        consumed[ix] = true;
                    }
                    chains.push(Chain { charge, indices });
                }
            }
        }
        chains
    }

    /// Greedily extend a chain starting at `start`. Extension stops at the
    /// first missing isotope.
    fn extend(&self, peaks: &[Peak], start: usize, charge: u8, consumed: &[bool]) -> Vec<usize> {
        let mz = peaks[start].mz;
        let mut indices = vec![start];
        for k in 1..self.max_peaks {
            let target = mz + k as f64 / charge as f64;
            let tolerance = Tolerance::symmetric_ppm(self.ppm) * (1.0 + 0.5 * k as f64);
            let last = indices[indices.len() - 1];
            match closest_peak(peaks, last + 1, target, tolerance, consumed) {
                Some(ix) => indices.push(ix),
                None => break,
            }
        }
        indices
    }

    /// Deisotope `scan` in place: every peak that is a non-monoisotopic member
    /// of an isotope group (of any charge state) is removed.
    pub fn apply(&self, scan: &mut Scan) -> Vec<IsotopeGroup> {
        if scan.peaks.is_empty() {
            return Vec::new();
        }

        let snapshot = scan.peaks.to_vec();
        let mut remove = FnvHashSet::default();
        let groups = self
            .plan(&snapshot)
            .into_iter()
            .map(|chain| {
                remove.extend(chain.indices.iter().skip(1).copied());
                IsotopeGroup {
                    charge: chain.charge,
                    peaks: chain.indices.iter().map(|&ix| snapshot[ix]).collect(),
                }
            })
            .collect::<Vec<_>>();

        let mut remove = remove.into_iter().collect::<Vec<_>>();
        remove.sort_unstable();
        for ix in remove {
            scan.peaks.remove(&snapshot[ix]);
        }
        scan.peaks.finalize();
        groups
    }
}

/// Among the unconsumed peaks at index >= `from`, select the one closest to
/// `target`, with a ppm error strictly inside `tolerance`. An exact hit is
/// always accepted.
fn closest_peak(
    peaks: &[Peak],
    from: usize,
    target: f64,
    tolerance: Tolerance,
    consumed: &[bool],
) -> Option<usize> {
    let ppm = tolerance.max_ppm();
    let (lo, hi) = tolerance.bounds(target);
    let start = from + peaks[from..].partition_point(|peak| peak.mz < lo);

    let mut best = None;
    let mut min_err = f64::MAX;
    for (ix, peak) in peaks
        .iter()
        .enumerate()
        .skip(start)
        .take_while(|(_, peak)| peak.mz <= hi)
    {
        if consumed[ix] {
            continue;
        }
        let err = ppm_error(peak.mz, target);
        if (err < ppm || err == 0.0) && err < min_err {
            min_err = err;
            best = Some(ix);
        }
    }
    best
}
