use patchflow_core::{IntentResult, IntentType, RiskTier};

struct IntentRule {
    keywords: &'static [&'static str],
    intent: IntentType,
    confidence: f32,
    risk: RiskTier,
}

/// Evaluated top to bottom; the first rule with a keyword hit wins, so
/// "refactor the tests" classifies as a refactor, not add_tests.
const RULES: &[IntentRule] = &[
    IntentRule {
        keywords: &["refactor"],
        intent: IntentType::Refactor,
        confidence: 0.92,
        risk: RiskTier::Medium,
    },
    IntentRule {
        keywords: &["fix", "bug"],
        intent: IntentType::Bugfix,
        confidence: 0.88,
        risk: RiskTier::Low,
    },
    IntentRule {
        keywords: &["add", "create", "new"],
        intent: IntentType::FeatureAddition,
        confidence: 0.85,
        risk: RiskTier::Medium,
    },
    IntentRule {
        keywords: &["delete", "remove"],
        intent: IntentType::RemoveCode,
        confidence: 0.90,
        risk: RiskTier::High,
    },
    IntentRule {
        keywords: &["test"],
        intent: IntentType::AddTests,
        confidence: 0.87,
        risk: RiskTier::Low,
    },
    IntentRule {
        keywords: &["style", "css", "ui"],
        intent: IntentType::UiUpdate,
        confidence: 0.83,
        risk: RiskTier::Low,
    },
    IntentRule {
        keywords: &["config"],
        intent: IntentType::ConfigChange,
        confidence: 0.80,
        risk: RiskTier::High,
    },
];

/// Deterministic, case-insensitive classification. Never fails: unmatched
/// (or blank) input falls back to a general edit.
pub fn classify(text: &str) -> IntentResult {
    let lower = text.to_lowercase();
    for rule in RULES {
        if rule.keywords.iter().any(|needle| lower.contains(needle)) {
            return IntentResult {
                intent: rule.intent,
                confidence: rule.confidence,
                risk: rule.risk,
            };
        }
    }
    IntentResult {
        intent: IntentType::GeneralEdit,
        confidence: 0.70,
        risk: RiskTier::Medium,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_matching_rule_wins() {
        let result = classify("Please refactor and add tests");
        assert_eq!(result.intent, IntentType::Refactor);
        assert_eq!(result.confidence, 0.92);
        assert_eq!(result.risk, RiskTier::Medium);
    }

    #[test]
    fn blank_input_falls_back_to_general_edit() {
        let result = classify("");
        assert_eq!(result.intent, IntentType::GeneralEdit);
        assert_eq!(result.confidence, 0.70);
        assert_eq!(result.risk, RiskTier::Medium);
    }

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(classify("FIX the login BUG").intent, IntentType::Bugfix);
        assert_eq!(classify("DELETE old handlers").intent, IntentType::RemoveCode);
    }

    #[test]
    fn every_rule_row_classifies_as_documented() {
        let cases: &[(&str, IntentType, f32, RiskTier)] = &[
            ("refactor the parser", IntentType::Refactor, 0.92, RiskTier::Medium),
            ("fix the crash", IntentType::Bugfix, 0.88, RiskTier::Low),
            ("create a settings page", IntentType::FeatureAddition, 0.85, RiskTier::Medium),
            ("remove dead code", IntentType::RemoveCode, 0.90, RiskTier::High),
            ("more unit tests please", IntentType::AddTests, 0.87, RiskTier::Low),
            ("tweak the css spacing", IntentType::UiUpdate, 0.83, RiskTier::Low),
            ("change the config defaults", IntentType::ConfigChange, 0.80, RiskTier::High),
            ("do something useful", IntentType::GeneralEdit, 0.70, RiskTier::Medium),
        ];
        for (text, intent, confidence, risk) in cases {
            let result = classify(text);
            assert_eq!(result.intent, *intent, "{text}");
            assert_eq!(result.confidence, *confidence, "{text}");
            assert_eq!(result.risk, *risk, "{text}");
        }
    }

    #[test]
    fn bugfix_outranks_add_tests_for_mixed_prompts() {
        // "fix" (rule 2) is matched before "test" (rule 5).
        assert_eq!(classify("fix the failing test").intent, IntentType::Bugfix);
    }
}
