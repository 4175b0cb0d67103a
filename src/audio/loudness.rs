use super::REFERENCE_LEVEL;

/// Root mean square of the samples. Empty input has no energy.
pub fn rms<'a, I>(samples: I) -> f64
where
    I: IntoIterator<Item = &'a f32>,
{
    let mut energy = 0.0f64;
    let mut count = 0usize;
    for sample in samples {
        let value = f64::from(*sample);
        energy += value * value;
        count += 1;
    }
    if count == 0 {
        return 0.0;
    }
    (energy / count as f64).sqrt()
}

/// Loudness of the samples in dB relative to [`REFERENCE_LEVEL`].
///
/// Silence maps to negative infinity so it can never cross a threshold.
pub fn loudness_db<'a, I>(samples: I) -> f64
where
    I: IntoIterator<Item = &'a f32>,
{
    let level = rms(samples);
    if level == 0.0 {
        return f64::NEG_INFINITY;
    }
    20.0 * (level / REFERENCE_LEVEL).log10()
}
