//! Property tests for expectation matching.

use fixsim_core::{BROKER_PROFILE, CLIENT_PROFILE, matches};
use fixsim_proto::{Message, MsgType, tags};
use proptest::prelude::*;

fn report(fields: &[(u32, &str)]) -> Message {
    let mut message = Message::new(MsgType::ExecutionReport);
    for &(tag, value) in fields {
        message.set(tag, value);
    }
    message
}

fn id() -> impl Strategy<Value = String> {
    "[A-Za-z0-9]{1,12}"
}

proptest! {
    #[test]
    fn prefixed_correlation_matches_its_suffix(prefix in "[a-z0-9]{1,6}(-[A-Z0-9]{1,8})?", cl_ord_id in id()) {
        let expected = report(&[(tags::CL_ORD_ID, &cl_ord_id)]);
        let rewritten = format!("{prefix}-{cl_ord_id}");
        let actual = report(&[(tags::CL_ORD_ID, &rewritten)]);

        prop_assert!(matches(&CLIENT_PROFILE, &expected, &actual));
    }

    #[test]
    fn different_suffix_never_matches(a in id(), b in id()) {
        prop_assume!(a != b);
        let expected = report(&[(tags::CL_ORD_ID, &a)]);
        let actual = report(&[(tags::CL_ORD_ID, &format!("sim1-CLIENT-{b}"))]);

        prop_assert!(!matches(&CLIENT_PROFILE, &expected, &actual));
    }

    #[test]
    fn superset_of_template_matches(symbol in id(), extra in id()) {
        let expected = report(&[(tags::SYMBOL, &symbol)]);
        let actual = report(&[(tags::SYMBOL, &symbol), (tags::TEXT, &extra), (tags::ORDER_ID, &extra)]);

        prop_assert!(matches(&CLIENT_PROFILE, &expected, &actual));
        prop_assert!(matches(&BROKER_PROFILE, &expected, &actual));
    }

    #[test]
    fn suffix_rule_is_only_for_correlation(symbol in id()) {
        let expected = report(&[(tags::SYMBOL, &symbol)]);
        let actual = report(&[(tags::SYMBOL, &format!("X-{symbol}"))]);

        prop_assert!(!matches(&CLIENT_PROFILE, &expected, &actual));
    }
}

proptest! {
    #[test]
    fn compound_correlation_is_compared_by_suffix_only(prefix in "[a-z0-9]{1,6}", cl_ord_id in id()) {
        let compound = format!("{prefix}-{cl_ord_id}");
        let expected = report(&[(tags::CL_ORD_ID, &compound)]);
        let actual = report(&[(tags::CL_ORD_ID, &compound)]);

        prop_assert!(!matches(&CLIENT_PROFILE, &expected, &actual));
    }
}
