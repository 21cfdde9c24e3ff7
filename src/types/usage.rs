//! Token usage accounting and cross-step aggregation.

use serde::{Deserialize, Serialize};

/// Token usage reported by a provider for one response.
///
/// Every field is optional: providers differ in what they report, and an
/// absent count is distinct from a reported zero. Counts are unsigned, so
/// they can never go negative.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    /// Tokens in the prompt sent to the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    /// Tokens generated by the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    /// Total tokens as reported by the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    /// Tokens spent on internal reasoning, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u64>,
    /// Prompt tokens served from the provider's cache, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_input_tokens: Option<u64>,
}

fn add_opt(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (None, None) => None,
        _ => Some(a.unwrap_or(0) + b.unwrap_or(0)),
    }
}

impl Usage {
    /// Elementwise sum. Absent counts as zero, but a field stays absent when
    /// both operands leave it absent.
    pub fn merge(&self, other: &Usage) -> Usage {
        Usage {
            input_tokens: add_opt(self.input_tokens, other.input_tokens),
            output_tokens: add_opt(self.output_tokens, other.output_tokens),
            total_tokens: add_opt(self.total_tokens, other.total_tokens),
            reasoning_tokens: add_opt(self.reasoning_tokens, other.reasoning_tokens),
            cached_input_tokens: add_opt(self.cached_input_tokens, other.cached_input_tokens),
        }
    }

    /// Merge usage from every step in execution order.
    ///
    /// Merging zero steps yields all-absent usage.
    pub fn merge_all<'a>(items: impl IntoIterator<Item = &'a Usage>) -> Usage {
        items
            .into_iter()
            .fold(Usage::default(), |acc, u| acc.merge(u))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(input: u64, output: u64) -> Usage {
        Usage {
            input_tokens: Some(input),
            output_tokens: Some(output),
            ..Default::default()
        }
    }

    #[test]
    fn merge_sums_elementwise() {
        let merged = usage(10, 5).merge(&usage(3, 0));
        assert_eq!(merged.input_tokens, Some(13));
        assert_eq!(merged.output_tokens, Some(5));
        assert_eq!(merged.total_tokens, None);
    }

    #[test]
    fn merge_preserves_absent_when_all_absent() {
        let merged = Usage::default().merge(&Usage::default());
        assert_eq!(merged, Usage::default());
    }

    #[test]
    fn merge_treats_absent_as_zero_when_one_side_reports() {
        let a = Usage {
            reasoning_tokens: Some(7),
            ..Default::default()
        };
        let merged = a.merge(&Usage::default());
        assert_eq!(merged.reasoning_tokens, Some(7));
    }

    #[test]
    fn merge_is_commutative() {
        let a = usage(10, 5);
        let b = Usage {
            input_tokens: Some(3),
            cached_input_tokens: Some(2),
            ..Default::default()
        };
        assert_eq!(a.merge(&b), b.merge(&a));
    }

    #[test]
    fn merge_is_associative() {
        let a = usage(1, 2);
        let b = usage(4, 8);
        let c = Usage {
            total_tokens: Some(100),
            ..Default::default()
        };
        assert_eq!(a.merge(&b).merge(&c), a.merge(&b.merge(&c)));
    }

    #[test]
    fn merge_all_over_empty_iterator_is_all_absent() {
        let merged = Usage::merge_all(std::iter::empty());
        assert_eq!(merged, Usage::default());
    }

    #[test]
    fn merge_all_over_steps_matches_pairwise_merge() {
        let steps = [usage(10, 5), usage(3, 0)];
        let merged = Usage::merge_all(steps.iter());
        assert_eq!(merged.input_tokens, Some(13));
        assert_eq!(merged.output_tokens, Some(5));
    }

    #[test]
    fn usage_serializes_camel_case_and_skips_absent() {
        let u = Usage {
            input_tokens: Some(10),
            output_tokens: Some(5),
            ..Default::default()
        };
        let json = serde_json::to_value(&u).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "inputTokens": 10, "outputTokens": 5 })
        );
    }
}
