//! Fuzz target: `collect_mode`
//!
//! Feeds arbitrary sample streams, counts and windows through the mode
//! filter and asserts the result is 0 or an in-window sample.
//!
//! cargo fuzz run fuzz_mode_filter

#![no_main]

use libfuzzer_sys::fuzz_target;
use scanrig::app::ports::RangeSensor;
use scanrig::control::mode_filter::collect_mode;

struct Replay<'a>(core::slice::ChunksExact<'a, u8>);

impl RangeSensor for Replay<'_> {
    fn is_ready(&self) -> bool {
        true
    }

    fn sample(&mut self) -> Option<u32> {
        let c = self.0.next()?;
        // 0xFFFF marks a missed measurement.
        let v = u16::from_le_bytes([c[0], c[1]]);
        (v != u16::MAX).then_some(u32::from(v))
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 6 {
        return;
    }
    let count = u16::from(data[0]);
    let lo = u16::from_le_bytes([data[1], data[2]]);
    let hi = u16::from_le_bytes([data[3], data[4]]);
    let mut sensor = Replay(data[5..].chunks_exact(2));

    let mode = collect_mode(&mut sensor, count, (lo, hi));
    assert!(mode == 0 || (lo..=hi).contains(&mode));
});
