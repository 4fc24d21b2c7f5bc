//! Extended thinking budget

use chatstream_config::ReasoningConfig;

/// Smallest thinking budget the vendor accepts
pub const MIN_THINKING_BUDGET: u32 = 1024;

/// Largest budget derived automatically from `max_tokens`
pub const MAX_DERIVED_THINKING_BUDGET: u32 = 8192;

/// Thinking budget for one call, or `None` when thinking stays off
///
/// An explicit budget is floored at [`MIN_THINKING_BUDGET`]. Otherwise a
/// quarter of `max_tokens` is used, clamped to
/// `MIN_THINKING_BUDGET..=MAX_DERIVED_THINKING_BUDGET`. The budget must stay
/// below `max_tokens`, so a budget that does not fit disables thinking.
pub fn thinking_budget(config: &ReasoningConfig, reasoning_disabled: bool, max_tokens: u32) -> Option<u32> {
    if !config.enabled || reasoning_disabled {
        return None;
    }

    let budget = match config.thinking_budget {
        Some(budget) if budget > 0 => budget.max(MIN_THINKING_BUDGET),
        _ => (max_tokens / 4).clamp(MIN_THINKING_BUDGET, MAX_DERIVED_THINKING_BUDGET),
    };

    if budget >= max_tokens {
        tracing::debug!(budget, max_tokens, "thinking budget does not fit, disabling thinking");
        return None;
    }

    Some(budget)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled(budget: Option<u32>) -> ReasoningConfig {
        ReasoningConfig {
            enabled: true,
            thinking_budget: budget,
            ..ReasoningConfig::default()
        }
    }

    #[test]
    fn derived_budget_is_clamped() {
        assert_eq!(thinking_budget(&enabled(None), false, 8192), Some(2048));
        assert_eq!(thinking_budget(&enabled(None), false, 64_000), Some(8192));
        assert_eq!(thinking_budget(&enabled(None), false, 2048), Some(1024));
    }

    #[test]
    fn explicit_budget_is_floored() {
        assert_eq!(thinking_budget(&enabled(Some(500)), false, 8192), Some(1024));
        assert_eq!(thinking_budget(&enabled(Some(4000)), false, 8192), Some(4000));
    }

    #[test]
    fn budget_must_fit_below_max_tokens() {
        assert_eq!(thinking_budget(&enabled(None), false, 1024), None);
        assert_eq!(thinking_budget(&enabled(Some(9000)), false, 8192), None);
    }

    #[test]
    fn disabled_reasoning_sends_no_budget() {
        assert_eq!(thinking_budget(&ReasoningConfig::default(), false, 8192), None);
        assert_eq!(thinking_budget(&enabled(None), true, 8192), None);
    }
}
