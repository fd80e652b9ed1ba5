//! Expectation matching.
//!
//! A template matches an inbound message when the MsgTypes agree and every
//! mandatory tag the template carries has the same value in the inbound
//! message. Tags the template leaves out are never looked at.
//!
//! The correlation tag (ClOrdID) is compared rewrite-aware: the sending
//! client prefixes it (`sim1-CLIENT-123`) and the hub may relabel it, so the
//! logical value is whatever follows the last `-`. A missing correlation
//! value on the inbound side is tolerated; any other missing mandatory tag is
//! a mismatch.

use fixsim_proto::{Message, Tag, tags};

/// Tags a role checks and how it finds the correlation value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchProfile {
    /// Tags compared when present in the template.
    pub mandatory_tags: &'static [Tag],
    /// Tag compared with suffix-aware equality.
    pub correlation_tag: Tag,
    /// Inbound tags consulted before `correlation_tag` for the actual value.
    pub correlation_aliases: &'static [Tag],
}

/// Client side: checks execution reports.
pub const CLIENT_PROFILE: MatchProfile = MatchProfile {
    mandatory_tags: &[
        tags::CL_ORD_ID,
        tags::ORIG_CL_ORD_ID,
        tags::SYMBOL,
        tags::SIDE,
        tags::EXEC_TYPE,
        tags::ORD_STATUS,
        tags::ORDER_ID,
        tags::EXEC_ID,
    ],
    correlation_tag: tags::CL_ORD_ID,
    correlation_aliases: &[],
};

/// Broker side: checks order requests. Behind a hub the client's ClOrdID
/// arrives stashed in SecondaryClOrdID, so that is read first.
pub const BROKER_PROFILE: MatchProfile = MatchProfile {
    mandatory_tags: &[
        tags::CL_ORD_ID,
        tags::ORIG_CL_ORD_ID,
        tags::SYMBOL,
        tags::SIDE,
        tags::ORDER_QTY,
        tags::ORD_TYPE,
        tags::PRICE,
    ],
    correlation_tag: tags::CL_ORD_ID,
    correlation_aliases: &[tags::SECONDARY_CL_ORD_ID],
};

/// Logical correlation value: the part after the last `-`.
pub fn correlation_suffix(value: &str) -> &str {
    value.rsplit_once('-').map_or(value, |(_, suffix)| suffix)
}

/// Whether `actual` satisfies the `expected` template under `profile`.
pub fn matches(profile: &MatchProfile, expected: &Message, actual: &Message) -> bool {
    let (Some(expected_type), Some(actual_type)) = (expected.msg_type_str(), actual.msg_type_str())
    else {
        return false;
    };
    if expected_type != actual_type {
        return false;
    }

    profile.mandatory_tags.iter().all(|&tag| {
        let Some(want) = expected.get(tag) else {
            return true;
        };

        if tag == profile.correlation_tag {
            let actual_value = profile
                .correlation_aliases
                .iter()
                .chain(std::iter::once(&profile.correlation_tag))
                .find_map(|&t| actual.get(t));
            // A compound actual value is compared by its suffix only.
            actual_value.is_none_or(|got| correlation_suffix(got) == want)
        } else {
            actual.get(tag) == Some(want)
        }
    })
}
