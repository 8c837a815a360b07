//! API gravity and volume correction for crude oil.
//!
//! Converts observed gravity and temperature to the 60 °F reference using the
//! crude oil thermal expansion relation (K0 = 341.0957, K1 = 0). Density at
//! 60 °F is solved iteratively because the expansion coefficient depends on it.

use super::models::{MeasurementInput, MeasurementResult};

/// Density of water at 60 °F, kg/m³.
pub const WATER_DENSITY_60F: f64 = 999.016;
/// Reference temperature, °F.
pub const REFERENCE_TEMPERATURE_F: f64 = 60.0;

const K0: f64 = 341.0957;
const MAX_ITERATIONS: u32 = 20;
/// Convergence tolerance on density, kg/m³.
const DENSITY_TOLERANCE: f64 = 0.05;

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Temperature to correct at.
///
/// Open and close readings together win over the single observed reading.
/// Each reading is rounded to a tenth before use; the mean is not re-rounded.
pub fn effective_temperature(input: &MeasurementInput) -> Option<f64> {
    match (input.open_temperature_f, input.close_temperature_f) {
        (Some(open), Some(close)) => Some((round_tenth(open) + round_tenth(close)) / 2.0),
        _ => input.observed_temperature_f.map(round_tenth),
    }
}

fn api_to_density(api: f64) -> f64 {
    141.5 * WATER_DENSITY_60F / (api + 131.5)
}

fn density_to_api(density: f64) -> f64 {
    141.5 * WATER_DENSITY_60F / density - 131.5
}

fn correction_factor(alpha: f64, delta_t: f64) -> f64 {
    (-alpha * delta_t * (1.0 + 0.8 * alpha * delta_t)).exp()
}

/// Compute corrected gravity and standard volumes.
///
/// Returns `None` when any required reading is missing, which callers render
/// as blank fields. Stops after 20 iterations even without reaching the
/// tolerance and uses the last density.
pub fn compute(input: &MeasurementInput) -> Option<MeasurementResult> {
    let gravity = round_tenth(input.observed_gravity_api?);
    let gross_observed_volume = input.gross_observed_volume?;
    let bsw_percent = input.bsw_percent?;
    let temperature = effective_temperature(input)?;

    let delta_t = temperature - REFERENCE_TEMPERATURE_F;
    let observed_density = api_to_density(gravity);
    if !(observed_density.is_finite() && observed_density > 0.0) {
        return None;
    }

    let mut density60 = observed_density;
    let mut alpha = K0 / (density60 * density60);
    let mut iterations = 0;
    let mut converged = false;

    while iterations < MAX_ITERATIONS {
        iterations += 1;
        alpha = K0 / (density60 * density60);
        let next = observed_density / correction_factor(alpha, delta_t);
        let settled = (next - density60).abs() < DENSITY_TOLERANCE;
        density60 = next;
        if settled {
            converged = true;
            break;
        }
    }

    if !converged {
        tracing::debug!(
            gravity,
            temperature,
            density60,
            "density did not settle within {} iterations",
            MAX_ITERATIONS
        );
    }

    let volume_correction_factor = correction_factor(alpha, delta_t);
    let sediment_water_correction_factor = (100.0 - bsw_percent) / 100.0;
    let gross_standard_volume = gross_observed_volume * volume_correction_factor;
    let net_standard_volume = gross_standard_volume * sediment_water_correction_factor;

    let result = MeasurementResult {
        corrected_gravity_api60: density_to_api(density60),
        volume_correction_factor,
        gross_standard_volume,
        sediment_water_correction_factor,
        net_standard_volume,
        effective_temperature_f: temperature,
        iterations,
        converged,
    };

    let finite = [
        result.corrected_gravity_api60,
        result.volume_correction_factor,
        result.gross_standard_volume,
        result.net_standard_volume,
    ]
    .iter()
    .all(|v| v.is_finite());

    finite.then_some(result)
}
