//! Per-model token pricing used for usage cost estimates.

/// USD per million tokens
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

const OPUS: ModelPricing = ModelPricing {
    input_per_million: 15.0,
    output_per_million: 75.0,
};
const SONNET: ModelPricing = ModelPricing {
    input_per_million: 3.0,
    output_per_million: 15.0,
};
const HAIKU: ModelPricing = ModelPricing {
    input_per_million: 0.8,
    output_per_million: 4.0,
};

/// Pricing for a model id, matched on family name. Unknown models are priced as Sonnet.
pub fn pricing_for(model: &str) -> ModelPricing {
    let model = model.to_ascii_lowercase();
    if model.contains("opus") {
        OPUS
    } else if model.contains("haiku") {
        HAIKU
    } else {
        SONNET
    }
}

pub fn estimate_cost(model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
    let pricing = pricing_for(model);
    (f64::from(input_tokens) * pricing.input_per_million
        + f64::from(output_tokens) * pricing.output_per_million)
        / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_cost_by_family() {
        let sonnet = estimate_cost("claude-sonnet-4-20250514", 1_000_000, 1_000_000);
        assert!((sonnet - 18.0).abs() < 1e-9);

        let opus = estimate_cost("claude-opus-4-1", 1_000, 2_000);
        assert!((opus - 0.165).abs() < 1e-9);

        let haiku = estimate_cost("claude-3-5-haiku-latest", 10_000, 0);
        assert!((haiku - 0.008).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_model_priced_as_sonnet() {
        assert_eq!(pricing_for("some-new-model"), pricing_for("claude-sonnet-4"));
    }
}
