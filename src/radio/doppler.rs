pub const SPEED_OF_LIGHT_KM_S: f64 = 299_792.458;

/// Non-relativistic Doppler correction. `range_rate_km_s` is positive while
/// the satellite recedes, which pulls the frequency down.
pub fn doppler_corrected(nominal_hz: f64, range_rate_km_s: f64) -> f64 {
    nominal_hz - (range_rate_km_s / SPEED_OF_LIGHT_KM_S) * nominal_hz
}
