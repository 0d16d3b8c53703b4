use serde::{Deserialize, Serialize};

/// Envelope hops per second (hop = sample_rate / 200, about 5ms).
const HOPS_PER_SECOND: u32 = 200;
/// Half-width of the moving-average window (21 hops total).
const AVERAGE_RADIUS: usize = 10;
/// Energy must exceed this multiple of the local background.
const THRESHOLD_MULTIPLIER: f32 = 1.25;
/// Absolute novelty floor, in raw amplitude units.
const NOVELTY_FLOOR: f32 = 0.005;
/// Minimum spacing between accepted peaks, in hops.
const MIN_PEAK_DISTANCE: usize = 8;

/// Result of one beat-detection run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BeatAnalysis {
    /// Onset timestamps in seconds, strictly increasing
    pub beats: Vec<f64>,
    /// Estimated tempo, absent when fewer than two beats were found
    pub bpm: Option<u32>,
}

/// Detect onsets in a single channel and estimate the tempo.
///
/// The pipeline is: mean-absolute energy per hop, a 21-hop clamped moving
/// average as adaptive background, a novelty curve of the energy above 125%
/// of that background, then local-maximum peak picking with a minimum
/// distance of 8 hops.
pub fn detect_beats(samples: &[f32], sample_rate: u32) -> BeatAnalysis {
    if samples.is_empty() || sample_rate == 0 {
        return BeatAnalysis::default();
    }

    let hop = hop_size(sample_rate);
    let envelope = energy_envelope(samples, hop);
    let average = moving_average(&envelope, AVERAGE_RADIUS);
    let novelty = novelty_curve(&envelope, &average);
    let peaks = pick_peaks(&novelty);

    let seconds_per_hop = hop as f64 / sample_rate as f64;
    let beats: Vec<f64> = peaks.iter().map(|&p| p as f64 * seconds_per_hop).collect();
    let bpm = estimate_tempo(&beats);

    log::info!(
        "Beat detection: {} hops, {} beats, tempo={}",
        envelope.len(),
        beats.len(),
        bpm.map_or_else(|| "n/a".to_string(), |b| format!("{} BPM", b))
    );

    BeatAnalysis { beats, bpm }
}

pub fn hop_size(sample_rate: u32) -> usize {
    ((sample_rate / HOPS_PER_SECOND) as usize).max(1)
}

/// Mean absolute amplitude per hop. A trailing partial hop is still divided
/// by the full hop length.
pub fn energy_envelope(samples: &[f32], hop: usize) -> Vec<f32> {
    samples
        .chunks(hop)
        .map(|chunk| chunk.iter().map(|s| s.abs()).sum::<f32>() / hop as f32)
        .collect()
}

/// Centered moving average; out-of-range indices clamp to the nearest edge.
pub fn moving_average(envelope: &[f32], radius: usize) -> Vec<f32> {
    if envelope.is_empty() {
        return Vec::new();
    }

    let last = envelope.len() as isize - 1;
    let width = (2 * radius + 1) as f32;

    (0..envelope.len() as isize)
        .map(|i| {
            let sum: f32 = (i - radius as isize..=i + radius as isize)
                .map(|w| envelope[w.clamp(0, last) as usize])
                .sum();
            sum / width
        })
        .collect()
}

pub fn novelty_curve(envelope: &[f32], average: &[f32]) -> Vec<f32> {
    envelope
        .iter()
        .zip(average)
        .map(|(&e, &m)| (e - m * THRESHOLD_MULTIPLIER).max(0.0))
        .collect()
}

/// Strict local maxima above the floor, at least `MIN_PEAK_DISTANCE` hops
/// after the previously accepted peak. First and last hops are never peaks.
pub fn pick_peaks(novelty: &[f32]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if novelty.len() < 3 {
        return peaks;
    }

    let mut last: Option<usize> = None;
    for i in 1..novelty.len() - 1 {
        let is_peak = novelty[i] > novelty[i - 1]
            && novelty[i] > novelty[i + 1]
            && novelty[i] > NOVELTY_FLOOR;
        let far_enough = last.map_or(true, |l| i - l >= MIN_PEAK_DISTANCE);

        if is_peak && far_enough {
            peaks.push(i);
            last = Some(i);
        }
    }

    peaks
}

/// Tempo from the median inter-onset interval.
pub fn estimate_tempo(beats: &[f64]) -> Option<u32> {
    let intervals: Vec<f64> = beats.windows(2).map(|w| w[1] - w[0]).collect();
    let interval = median(&intervals)?;
    if interval <= 0.0 {
        return None;
    }
    Some((60.0 / interval).round() as u32)
}

/// Sorted midpoint; mean of the two middle values for even counts.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;

    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One-hop bursts of constant amplitude starting at the given times.
    fn bursts(sample_rate: u32, seconds: f64, onsets: &[f64]) -> Vec<f32> {
        let hop = hop_size(sample_rate);
        let mut samples = vec![0.0f32; (seconds * sample_rate as f64) as usize];
        for &t in onsets {
            let start = (t * sample_rate as f64).round() as usize;
            for s in samples.iter_mut().skip(start).take(hop) {
                *s = 0.8;
            }
        }
        samples
    }

    #[test]
    fn silent_signal_has_no_beats() {
        let analysis = detect_beats(&vec![0.0; 44_100 * 2], 44_100);
        assert!(analysis.beats.is_empty());
        assert_eq!(analysis.bpm, None);

        let empty = detect_beats(&[], 44_100);
        assert_eq!(empty, BeatAnalysis::default());
    }

    #[test]
    fn envelope_divides_partial_hop_by_full_hop() {
        let envelope = energy_envelope(&[1.0, -1.0, 0.5, 0.5, -1.0], 2);
        assert_eq!(envelope, vec![1.0, 0.5, 0.5]);
    }

    #[test]
    fn moving_average_clamps_at_edges() {
        let average = moving_average(&[3.0, 0.0, 0.0], 1);
        // window for index 0 is [0, 0, 1] after clamping
        assert!((average[0] - 2.0).abs() < 1e-6);
        assert!((average[1] - 1.0).abs() < 1e-6);
        assert!((average[2] - 0.0).abs() < 1e-6);
    }

    #[test]
    fn novelty_is_never_negative() {
        let novelty = novelty_curve(&[0.1, 1.0, 0.1], &[0.4, 0.4, 0.4]);
        assert_eq!(novelty[0], 0.0);
        assert!((novelty[1] - 0.5).abs() < 1e-6);
        assert_eq!(novelty[2], 0.0);
    }

    #[test]
    fn finds_each_impulse_within_one_hop() {
        let sample_rate = 44_100;
        let onsets = [0.25, 0.75, 1.3, 1.9];
        let samples = bursts(sample_rate, 2.5, &onsets);

        let analysis = detect_beats(&samples, sample_rate);
        let hop_seconds = hop_size(sample_rate) as f64 / sample_rate as f64;

        assert_eq!(analysis.beats.len(), onsets.len());
        for (found, expected) in analysis.beats.iter().zip(onsets) {
            assert!(
                (found - expected).abs() <= hop_seconds + 1e-9,
                "beat at {found} too far from {expected}"
            );
        }
    }

    #[test]
    fn dense_onsets_respect_minimum_distance() {
        let sample_rate = 44_100;
        // a burst every 20ms, twice as dense as the detector allows
        let onsets: Vec<f64> = (1..100).map(|i| i as f64 * 0.02).collect();
        let samples = bursts(sample_rate, 2.2, &onsets);

        let analysis = detect_beats(&samples, sample_rate);
        let min_gap = MIN_PEAK_DISTANCE as f64 * hop_size(sample_rate) as f64 / sample_rate as f64;

        assert!(analysis.beats.len() > 1);
        for pair in analysis.beats.windows(2) {
            assert!(pair[1] - pair[0] >= min_gap - 1e-9);
        }
    }

    #[test]
    fn periodic_beats_give_matching_tempo() {
        // 44 kHz keeps every onset hop-aligned: 100 hops = 0.5s
        let sample_rate = 44_000;
        let onsets = [0.5, 1.0, 1.5, 2.0, 2.5];
        let samples = bursts(sample_rate, 3.0, &onsets);

        let analysis = detect_beats(&samples, sample_rate);
        assert_eq!(analysis.beats.len(), onsets.len());
        for (found, expected) in analysis.beats.iter().zip(onsets) {
            assert!((found - expected).abs() < 1e-9);
        }
        assert_eq!(analysis.bpm, Some(120));
    }

    #[test]
    fn tempo_uses_median_interval() {
        assert_eq!(estimate_tempo(&[0.0, 0.5, 1.0, 1.5]), Some(120));
        // intervals 0.4, 0.6, 0.5, 0.5 -> median 0.5
        assert_eq!(estimate_tempo(&[0.0, 0.4, 1.0, 1.5, 2.0]), Some(120));
        assert_eq!(median(&[0.4, 0.6]), Some(0.5));
        assert_eq!(median(&[0.9, 0.1, 0.3]), Some(0.3));
    }

    #[test]
    fn single_beat_has_no_tempo() {
        assert_eq!(estimate_tempo(&[1.25]), None);
        assert_eq!(estimate_tempo(&[]), None);
    }
}
