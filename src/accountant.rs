use crate::error::{ChatError, ChatResult};
use crate::store::PriceConfig;
use crate::types::Cost;

/// Convert a token count into money against a captured price snapshot.
///
/// Pure, deterministic, integer fixed-point throughout:
/// `price = tokens / 1_000_000 * per_million`, truncated. Prices must be
/// non-negative; the Err path is a configuration problem, not a user error.
pub fn compute_cost(price: &PriceConfig, input_tokens: u64, output_tokens: u64) -> ChatResult<Cost> {
    if price.input_per_million.is_negative() || price.output_per_million.is_negative() {
        return Err(ChatError::InvalidConfig(
            "negative price table entry".into(),
        ));
    }
    Ok(Cost {
        input_price: price.input_per_million.per_million(input_tokens),
        output_price: price.output_per_million.per_million(output_tokens),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;

    fn price(input: &str, output: &str) -> PriceConfig {
        PriceConfig {
            input_per_million: Money::parse(input).unwrap(),
            output_per_million: Money::parse(output).unwrap(),
        }
    }

    #[test]
    fn zero_tokens_cost_nothing() {
        let cost = compute_cost(&price("2.00", "6.00"), 0, 0).unwrap();
        assert_eq!(cost, Cost::ZERO);
        assert!(cost.total().is_zero());
    }

    #[test]
    fn metered_scenario() {
        // 500 input at 2.00/M plus 300 output at 6.00/M.
        let cost = compute_cost(&price("2.00", "6.00"), 500, 300).unwrap();
        assert_eq!(cost.input_price, Money::parse("0.001").unwrap());
        assert_eq!(cost.output_price, Money::parse("0.0018").unwrap());
        assert_eq!(cost.total(), Money::parse("0.0028").unwrap());
    }

    #[test]
    fn monotonic_in_token_count() {
        let cfg = price("2.00", "6.00");
        let mut last = Money::ZERO;
        for tokens in [0u64, 1, 10, 999, 1_000, 50_000, 1_000_000] {
            let cost = compute_cost(&cfg, tokens, tokens).unwrap();
            assert!(cost.total() >= last);
            last = cost.total();
        }
    }

    #[test]
    fn deterministic() {
        let cfg = price("0.15", "0.60");
        let a = compute_cost(&cfg, 123_456, 7_890).unwrap();
        let b = compute_cost(&cfg, 123_456, 7_890).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn negative_price_rejected() {
        let cfg = PriceConfig {
            input_per_million: Money::parse("-1").unwrap(),
            output_per_million: Money::ZERO,
        };
        assert!(matches!(
            compute_cost(&cfg, 1, 1),
            Err(ChatError::InvalidConfig(_))
        ));
    }
}
