//! `squareRoot`: square root rounded to a requested number of decimal places.
//!
//! Negative input is rejected. The input schema declares `minimum: 0`, so the
//! registry refuses it before execution; `compute` checks again for callers
//! that bypass the registry.

use crate::tools::{Tool, ToolResult};
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

/// Largest accepted `decimalPlaces`
pub const MAX_DECIMAL_PLACES: u32 = 10;

pub struct SquareRootTool;

impl SquareRootTool {
    /// `round(sqrt(number), decimal_places)`
    pub fn compute(number: f64, decimal_places: u32) -> Result<f64, String> {
        if !number.is_finite() {
            return Err(format!("{} is not a finite number", number));
        }
        if number < 0.0 {
            return Err(format!(
                "Cannot take the square root of a negative number ({})",
                number
            ));
        }
        if decimal_places > MAX_DECIMAL_PLACES {
            return Err(format!(
                "decimalPlaces must be between 0 and {}, got {}",
                MAX_DECIMAL_PLACES, decimal_places
            ));
        }
        Ok(round_to_places(number.sqrt(), decimal_places))
    }
}

/// Round half away from zero at `places` decimal digits
pub fn round_to_places(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}

#[async_trait]
impl Tool for SquareRootTool {
    fn name(&self) -> &str {
        "squareRoot"
    }

    fn description(&self) -> &str {
        "Calculate the square root of a non-negative number, rounded to the given \
         number of decimal places (0-10)."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "number": {
                    "type": "number",
                    "minimum": 0,
                    "description": "The number to take the square root of"
                },
                "decimalPlaces": {
                    "type": "integer",
                    "minimum": 0,
                    "maximum": MAX_DECIMAL_PLACES,
                    "description": "How many decimal places to round the result to"
                }
            },
            "required": ["number", "decimalPlaces"]
        })
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "result": { "type": "number" }
            },
            "required": ["result"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Params {
            number: f64,
            // Accepts 4.0 as well as 4; the schema only checks integrality
            decimal_places: f64,
        }

        let params: Params = serde_json::from_value(params)?;
        if params.decimal_places.fract() != 0.0 || params.decimal_places < 0.0 {
            return Ok(ToolResult::error(format!(
                "decimalPlaces must be a whole number, got {}",
                params.decimal_places
            )));
        }

        match Self::compute(params.number, params.decimal_places as u32) {
            Ok(result) => Ok(ToolResult::success(json!({ "result": result }))),
            Err(message) => Ok(ToolResult::error(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_compute_examples() {
        assert_eq!(SquareRootTool::compute(2.0, 4), Ok(1.4142));
        assert_eq!(SquareRootTool::compute(0.0, 2), Ok(0.0));
        assert_eq!(SquareRootTool::compute(16.0, 0), Ok(4.0));
        assert_eq!(SquareRootTool::compute(2.0, 0), Ok(1.0));
        assert_eq!(SquareRootTool::compute(10.0, 3), Ok(3.162));
    }

    #[test]
    fn test_compute_rejects_negative() {
        let err = SquareRootTool::compute(-1.0, 2).unwrap_err();
        assert!(err.contains("negative"));
    }

    #[test]
    fn test_compute_rejects_too_many_places() {
        assert!(SquareRootTool::compute(2.0, 11).is_err());
    }

    #[tokio::test]
    async fn test_execute_outputs_result_object() {
        let result = SquareRootTool
            .execute(json!({"number": 2, "decimalPlaces": 4}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, json!({"result": 1.4142}));
    }

    #[tokio::test]
    async fn test_execute_negative_is_error_not_nan() {
        let result = SquareRootTool
            .execute(json!({"number": -1, "decimalPlaces": 2}))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.error_text().unwrap().contains("negative"));
    }

    #[tokio::test]
    async fn test_execute_accepts_integral_float_places() {
        let result = SquareRootTool
            .execute(json!({"number": 9, "decimalPlaces": 1.0}))
            .await
            .unwrap();
        assert_eq!(result.output, json!({"result": 3.0}));
    }

    #[tokio::test]
    async fn test_execute_missing_field_is_err() {
        assert!(SquareRootTool.execute(json!({"number": 9})).await.is_err());
    }

    proptest! {
        #[test]
        fn prop_result_has_at_most_requested_places(
            number in 0.0f64..1.0e6,
            places in 0u32..=MAX_DECIMAL_PLACES,
        ) {
            let result = SquareRootTool::compute(number, places).unwrap();
            let exact = number.sqrt();
            // Rounding moves the value by at most half a unit in the last place
            let half_unit = 0.5 / 10f64.powi(places as i32);
            prop_assert!((result - exact).abs() <= half_unit + 1e-9);
            prop_assert!(result >= 0.0);
        }
    }
}
