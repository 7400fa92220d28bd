/// Property-based tests using proptest
/// Tests invariants and properties that should hold for all inputs
use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use lead_capture_api::dedupe::{dedupe_key, phone_last4};
use lead_capture_api::scoring::{category_for, compute_score, ScoringInput};
use lead_capture_api::validation::is_valid_email;

// Property: Scoring is deterministic and bounded
proptest! {
    #[test]
    fn scoring_is_deterministic(selling in any::<bool>(), buying in any::<bool>(), timeframe in "\\PC{0,20}") {
        let input = ScoringInput { selling_interest: selling, buying_interest: buying, timeframe: &timeframe };
        prop_assert_eq!(compute_score(&input), compute_score(&input));
    }

    #[test]
    fn score_is_sum_of_factors_and_bounded(selling in any::<bool>(), buying in any::<bool>(), timeframe in "\\PC{0,20}") {
        let result = compute_score(&ScoringInput { selling_interest: selling, buying_interest: buying, timeframe: &timeframe });
        let f = &result.factors;
        prop_assert_eq!(result.total_score, f.selling_interest + f.buying_interest + f.timeframe);
        prop_assert!((0..=100).contains(&result.total_score));
        prop_assert_eq!(result.category.as_str(), category_for(result.total_score));
    }

    #[test]
    fn adding_selling_interest_raises_score(buying in any::<bool>(), timeframe in "(asap|1-3 months|3-6 months|6-12 months|not sure)") {
        let without = compute_score(&ScoringInput { selling_interest: false, buying_interest: buying, timeframe: &timeframe });
        let with = compute_score(&ScoringInput { selling_interest: true, buying_interest: buying, timeframe: &timeframe });
        prop_assert!(with.total_score > without.total_score);
    }
}

// Property: Dedupe keys are stable within a day and ignore email case
proptest! {
    #[test]
    fn dedupe_key_stable_within_day(
        local in "[a-zA-Z]{1,10}",
        digits in "[0-9]{4,12}",
        secs_a in 0i64..86_400,
        secs_b in 0i64..86_400
    ) {
        let midnight = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let email = format!("{}@example.com", local);
        let a = dedupe_key(&email, &digits, midnight + Duration::seconds(secs_a));
        let b = dedupe_key(&email.to_uppercase(), &digits, midnight + Duration::seconds(secs_b));
        prop_assert_eq!(a, b);
    }

    #[test]
    fn dedupe_key_only_uses_last_four_digits(prefix in "[0-9]{0,8}", last4 in "[0-9]{4}") {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let phone = format!("{}{}", prefix, last4);
        prop_assert_eq!(phone_last4(&phone), last4.clone());
        prop_assert_eq!(dedupe_key("a@b.co", &phone, at), dedupe_key("a@b.co", &last4, at));
    }

    #[test]
    fn email_validation_never_panics(email in "\\PC*") {
        let _ = is_valid_email(&email);
    }
}
