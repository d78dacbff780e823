/// Convert a frequency-domain magnitude buffer into a decibel-like volume
/// level: `20 * log10(mean + 1)` over the arithmetic mean of all bins.
///
/// The `+ 1` clamps the zero-signal case (log of zero is undefined), so a
/// fully silent buffer reads as 0.0 rather than negative infinity.
pub fn volume_db(magnitudes: &[f32]) -> f64 {
    if magnitudes.is_empty() {
        return 0.0;
    }

    let mean =
        magnitudes.iter().map(|&m| f64::from(m)).sum::<f64>() / magnitudes.len() as f64;

    20.0 * (mean + 1.0).log10()
}
