use fnv::FnvHashSet;

use crate::spectrum::Peak;

/// Width of a single m/z bin
pub const BIN_WIDTH: f64 = 0.1;

/// Re-quantize `peaks` onto a fixed grid of [`BIN_WIDTH`] m/z.
///
/// See [`bin_with_width`]
pub fn bin(peaks: &[Peak], threshold: f32, exclude: &FnvHashSet<usize>) -> Vec<Peak> {
    bin_with_width(peaks, BIN_WIDTH, threshold, exclude)
}

/// Re-quantize `peaks` onto a grid of `width` m/z, starting at 0.
///
/// Each peak with `intensity > threshold` is split linearly between the two
/// bin edges surrounding it: the closer edge receives the larger share, and
/// the two shares sum to the original intensity. Overlapping contributions
/// to the same bin are resolved by taking the maximum, not the sum.
///
/// The grid starts at m/z 0, so peaks with a negative m/z are skipped.
///
/// The returned peaks are sorted, with `mz` holding the bin *index*: bins
/// at or below `threshold`, or listed in `exclude`, are skipped. Since every
/// binned spectrum lives on the same integer grid, two of them can be compared
/// with an exact-match merge (see [`crate::similarity::dot_product`])
pub fn bin_with_width(
    peaks: &[Peak],
    width: f64,
    threshold: f32,
    exclude: &FnvHashSet<usize>,
) -> Vec<Peak> {
    let max_mz = match peaks
        .iter()
        .map(|peak| peak.mz)
        .filter(|mz| *mz >= 0.0)
        .reduce(f64::max)
    {
        Some(mz) => mz,
        None => return Vec::new(),
    };

    let mut bins = vec![0.0f32; (max_mz / width).ceil() as usize + 2];
    for peak in peaks
        .iter()
        .filter(|peak| peak.mz >= 0.0 && peak.intensity > threshold)
    {
        let lo = (peak.mz / width).floor() as usize;
        let dist_lo = peak.mz - lo as f64 * width;
        let dist_hi = width - dist_lo;

        let intensity = peak.intensity as f64;
        let share_lo = (intensity * (width - dist_lo) / width) as f32;
        let share_hi = (intensity * (width - dist_hi) / width) as f32;

        bins[lo] = bins[lo].max(share_lo);
        bins[lo + 1] = bins[lo + 1].max(share_hi);
    }

    bins.into_iter()
        .enumerate()
        .filter(|(idx, intensity)| *intensity > threshold && !exclude.contains(idx))
        .map(|(idx, intensity)| Peak {
            mz: idx as f64,
            intensity,
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn peaks(data: &[(f64, f32)]) -> Vec<Peak> {
        data.iter()
            .map(|&(mz, intensity)| Peak { mz, intensity })
            .collect()
    }

    #[test]
    fn empty() {
        assert!(bin(&[], 0.0, &FnvHashSet::default()).is_empty());
    }

    #[test]
    fn split_is_a_partition() {
        let binned = bin(&peaks(&[(500.03, 100.0)]), 0.0, &FnvHashSet::default());
        assert_eq!(binned.len(), 2);
        assert_eq!(binned[0].mz, 5000.0);
        assert_eq!(binned[1].mz, 5001.0);
        let total = binned.iter().map(|peak| peak.intensity).sum::<f32>();
        assert!((total - 100.0).abs() < 1e-3);
        // Closer edge gets the larger share
        assert!((binned[0].intensity - 70.0).abs() < 1e-2);
        assert!((binned[1].intensity - 30.0).abs() < 1e-2);
    }

    #[test]
    fn collisions_take_max() {
        let binned = bin(
            &peaks(&[(500.02, 100.0), (500.02, 60.0), (500.08, 50.0)]),
            0.0,
            &FnvHashSet::default(),
        );
        assert_eq!(binned.len(), 2);
        // 500.02 -> 80 into bin 5000, 20 into 5001
        // 500.08 -> 10 into bin 5000, 40 into 5001
        assert!((binned[0].intensity - 80.0).abs() < 1e-2);
        assert!((binned[1].intensity - 40.0).abs() < 1e-2);
    }

    #[test]
    fn threshold_and_exclusions() {
        let data = peaks(&[(100.05, 4.0), (200.01, 100.0), (300.0, 1.0)]);
        let binned = bin(&data, 5.0, &FnvHashSet::default());
        // 100.05 and 300.0 are at or below threshold, 200.01 -> (90, 10)
        assert_eq!(
            binned.iter().map(|peak| peak.mz).collect::<Vec<_>>(),
            vec![2000.0, 2001.0]
        );

        let exclude = [2000].into_iter().collect::<FnvHashSet<usize>>();
        let binned = bin(&data, 5.0, &exclude);
        assert_eq!(binned.len(), 1);
        assert_eq!(binned[0].mz, 2001.0);
    }

    #[test]
    fn negative_mz_is_skipped() {
        let binned = bin(&peaks(&[(-0.05, 100.0), (0.02, 10.0)]), 0.0, &FnvHashSet::default());
        // Only 0.02 contributes: 8 into bin 0, 2 into bin 1
        assert_eq!(binned.len(), 2);
        assert!((binned[0].intensity - 8.0).abs() < 1e-4);
        assert!((binned[1].intensity - 2.0).abs() < 1e-4);

        assert!(bin(&peaks(&[(-3.0, 100.0)]), 0.0, &FnvHashSet::default()).is_empty());
    }

    #[test]
    fn custom_width() {
        let binned = bin_with_width(&peaks(&[(10.25, 8.0)]), 0.5, 0.0, &FnvHashSet::default());
        assert_eq!(binned.len(), 2);
        assert_eq!(binned[0].mz, 20.0);
        assert!((binned[0].intensity - 4.0).abs() < 1e-4);
        assert!((binned[1].intensity - 4.0).abs() < 1e-4);
    }
}
