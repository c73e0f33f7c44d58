use super::AggregationRule;

/// Arithmetic mean.
pub struct Average;

impl AggregationRule for Average {
    fn key(&self) -> &'static str {
        "Average"
    }

    fn name(&self) -> &'static str {
        "Average"
    }

    fn description(&self) -> &'static str {
        "Average value"
    }

    fn calculate_value(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub struct Minimum;

impl AggregationRule for Minimum {
    fn key(&self) -> &'static str {
        "Minimum"
    }

    fn name(&self) -> &'static str {
        "Minimum"
    }

    fn description(&self) -> &'static str {
        "Minimum value"
    }

    fn calculate_value(&self, values: &[f64]) -> Option<f64> {
        values.iter().copied().reduce(f64::min)
    }
}
