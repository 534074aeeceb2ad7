//! Outlier-rejecting mode filter for rangefinder samples.
//!
//! The time-of-flight sensor occasionally returns wild values (multipath,
//! ambient light, the turntable edge).  A point is only emitted from the
//! most frequent in-window reading among `count` accepted samples.

use heapless::Vec;

use crate::app::ports::RangeSensor;

/// Upper bound on accepted samples per point.
pub const MAX_CHECKS: usize = 64;

/// Raw samples tried per requested accepted sample before giving up.
pub const MAX_ATTEMPTS_PER_SAMPLE: usize = 16;

/// Collect `count` in-window samples and return their mode.
///
/// Returns 0 when `count` is 0, when the sensor is not ready, or when no
/// sample at all landed inside `window` (inclusive) before the attempt
/// budget ran out.  A partial collection yields the mode of what was
/// accepted.
pub fn collect_mode(
    sensor: &mut (impl RangeSensor + ?Sized),
    count: u16,
    window: (u16, u16),
) -> u16 {
    let wanted = usize::from(count).min(MAX_CHECKS);
    if wanted == 0 || !sensor.is_ready() {
        return 0;
    }

    let (lo, hi) = (u32::from(window.0), u32::from(window.1));
    let mut accepted: Vec<u16, MAX_CHECKS> = Vec::new();
    let mut attempts = wanted * MAX_ATTEMPTS_PER_SAMPLE;

    while accepted.len() < wanted && attempts > 0 {
        attempts -= 1;
        match sensor.sample() {
            Some(d) if (lo..=hi).contains(&d) => {
                // Capacity is MAX_CHECKS and wanted <= MAX_CHECKS.
                let _ = accepted.push(d as u16);
            }
            Some(d) => log::trace!("mode_filter: rejected {} outside [{}, {}]", d, lo, hi),
            None => {}
        }
    }

    if accepted.len() < wanted {
        log::warn!(
            "mode_filter: only {}/{} samples accepted",
            accepted.len(),
            wanted
        );
    }

    find_mode(&accepted).unwrap_or(0)
}

/// Most frequent value; ties go to the value seen first.
pub fn find_mode(samples: &[u16]) -> Option<u16> {
    let mut best: Option<(u16, usize)> = None;
    for (i, &v) in samples.iter().enumerate() {
        // Only count each distinct value at its first occurrence.
        if samples[..i].contains(&v) {
            continue;
        }
        let n = samples[i..].iter().filter(|&&s| s == v).count();
        if best.is_none_or(|(_, best_n)| n > best_n) {
            best = Some((v, n));
        }
    }
    best.map(|(v, _)| v)
}
