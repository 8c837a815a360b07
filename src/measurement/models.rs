//! Data types for crude oil measurement.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize};

/// Unit the gross observed volume is recorded in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum UnitOfMeasure {
    #[default]
    #[serde(alias = "barrel", alias = "bbl")]
    Barrel,
    #[serde(alias = "gallon", alias = "gal")]
    Gallon,
    #[serde(alias = "liter", alias = "litre", alias = "l")]
    Liter,
}

/// Raw field readings as entered on a ticket.
///
/// Every numeric field accepts a JSON number, a numeric string, an empty
/// string or null. Anything that is not a finite number reads as missing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MeasurementInput {
    #[serde(rename = "unitOfMeasure", default)]
    pub unit_of_measure: UnitOfMeasure,
    #[serde(rename = "observedGravityAPI", default, deserialize_with = "lenient_number")]
    pub observed_gravity_api: Option<f64>,
    #[serde(rename = "observedTemperatureF", default, deserialize_with = "lenient_number")]
    pub observed_temperature_f: Option<f64>,
    #[serde(rename = "openTemperatureF", default, deserialize_with = "lenient_number")]
    pub open_temperature_f: Option<f64>,
    #[serde(rename = "closeTemperatureF", default, deserialize_with = "lenient_number")]
    pub close_temperature_f: Option<f64>,
    /// Basic sediment and water, percent. Absent means 0.
    #[serde(rename = "bswPercent", default = "default_bsw", deserialize_with = "lenient_number")]
    pub bsw_percent: Option<f64>,
    #[serde(rename = "grossObservedVolume", default, deserialize_with = "lenient_number")]
    pub gross_observed_volume: Option<f64>,
}

fn default_bsw() -> Option<f64> {
    Some(0.0)
}

/// Accept numbers and numeric strings; treat everything else as missing.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let number = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(number.filter(|n| n.is_finite()))
}

/// Standardized volumes at full floating-point precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementResult {
    pub corrected_gravity_api60: f64,
    pub volume_correction_factor: f64,
    pub gross_standard_volume: f64,
    pub sediment_water_correction_factor: f64,
    pub net_standard_volume: f64,
    /// Temperature the correction was computed at (°F)
    pub effective_temperature_f: f64,
    /// Density iterations performed
    pub iterations: u32,
    /// Whether the density tolerance was reached before the iteration cap
    pub converged: bool,
}

impl MeasurementResult {
    /// Round each field to its display precision.
    pub fn display(&self) -> MeasurementDisplay {
        MeasurementDisplay {
            corrected_gravity_api60: fixed(self.corrected_gravity_api60, 1),
            volume_correction_factor: fixed(self.volume_correction_factor, 5),
            gross_standard_volume: fixed(self.gross_standard_volume, 2),
            sediment_water_correction_factor: fixed(self.sediment_water_correction_factor, 5),
            net_standard_volume: fixed(self.net_standard_volume, 2),
        }
    }
}

/// Fixed-scale decimal text, half away from zero. Blank if not representable.
fn fixed(value: f64, places: u32) -> String {
    match Decimal::from_f64(value) {
        Some(d) => {
            let mut rounded = d.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero);
            rounded.rescale(places);
            rounded.to_string()
        }
        None => String::new(),
    }
}

/// Display-precision result; every field is blank when input is incomplete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MeasurementDisplay {
    #[serde(rename = "correctedGravityAPI60")]
    pub corrected_gravity_api60: String,
    #[serde(rename = "volumeCorrectionFactor")]
    pub volume_correction_factor: String,
    #[serde(rename = "grossStandardVolume")]
    pub gross_standard_volume: String,
    #[serde(rename = "sedimentWaterCorrectionFactor")]
    pub sediment_water_correction_factor: String,
    #[serde(rename = "netStandardVolume")]
    pub net_standard_volume: String,
}

impl MeasurementDisplay {
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn is_blank(&self) -> bool {
        *self == Self::blank()
    }
}

/// Response payload from the compute endpoint.
#[derive(Debug, Serialize)]
pub struct ComputeResponse {
    /// Tool identifier
    pub tool: &'static str,
    /// Tool version
    pub tool_version: &'static str,
    /// Correction method used
    pub method: &'static str,
    #[serde(rename = "unitOfMeasure")]
    pub unit_of_measure: UnitOfMeasure,

    #[serde(flatten)]
    pub display: MeasurementDisplay,

    /// Temperature used for the correction (°F)
    #[serde(rename = "effectiveTemperatureF")]
    pub effective_temperature_f: Option<f64>,
    /// Density iterations performed
    pub iterations: Option<u32>,
    /// Whether the density tolerance was reached
    pub converged: Option<bool>,

    /// SHA256 hash of input
    pub input_hash: String,
}
