//! Polar → Cartesian mapping for turntable scans.

/// Project a sample taken at `angle_deg` on the turntable at `radius` from
/// its axis onto the horizontal plane.
pub fn project(angle_deg: f64, radius: f64) -> (f64, f64) {
    let a = angle_deg.to_radians();
    (radius * a.cos(), radius * a.sin())
}

/// Turntable angle reached after `progress` microsteps.
pub fn angle_for(progress: u32, degrees_per_microstep: f64) -> f64 {
    f64::from(progress) * degrees_per_microstep
}

/// Distance from the turntable axis for a filtered reading.  A zero reading
/// means the filter had nothing usable.
pub fn radius_for(center: u16, filtered: u16, fallback: f64) -> f64 {
    if filtered == 0 {
        fallback
    } else {
        f64::from(center.abs_diff(filtered))
    }
}
