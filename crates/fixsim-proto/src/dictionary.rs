//! Message dictionary.
//!
//! The dictionary decides which section a tag belongs to and supplies the
//! BeginString used when encoding. It is deliberately permissive about
//! message types: unknown types parse fine and are left for the caller to
//! classify.

use std::collections::BTreeSet;

use crate::tags::{self, Tag};

/// BeginString used when a message does not carry one.
pub const DEFAULT_BEGIN_STRING: &str = "FIX.4.4";

/// Message section a tag is placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// Standard header
    Header,
    /// Application body
    Body,
    /// Standard trailer
    Trailer,
}

/// Tag placement rules for one protocol version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dictionary {
    begin_string: String,
    header_tags: BTreeSet<Tag>,
    trailer_tags: BTreeSet<Tag>,
}

impl Dictionary {
    /// FIX 4.4 standard header and trailer.
    pub fn fix44() -> Self {
        let header_tags = [
            tags::BEGIN_STRING,
            tags::BODY_LENGTH,
            tags::MSG_TYPE,
            tags::SENDER_COMP_ID,
            tags::TARGET_COMP_ID,
            tags::MSG_SEQ_NUM,
            tags::SENDING_TIME,
            tags::POSS_DUP_FLAG,
            tags::POSS_RESEND,
            tags::ON_BEHALF_OF_COMP_ID,
            tags::DELIVER_TO_COMP_ID,
            tags::SENDER_SUB_ID,
            tags::TARGET_SUB_ID,
            tags::ORIG_SENDING_TIME,
        ]
        .into_iter()
        .collect();

        Self {
            begin_string: DEFAULT_BEGIN_STRING.to_string(),
            header_tags,
            trailer_tags: BTreeSet::from([tags::CHECK_SUM]),
        }
    }

    /// Treat an additional tag as a header field.
    #[must_use]
    pub fn with_header_tag(mut self, tag: Tag) -> Self {
        self.trailer_tags.remove(&tag);
        self.header_tags.insert(tag);
        self
    }

    /// Override the BeginString.
    #[must_use]
    pub fn with_begin_string(mut self, begin_string: impl Into<String>) -> Self {
        self.begin_string = begin_string.into();
        self
    }

    /// BeginString for this dictionary.
    pub fn begin_string(&self) -> &str {
        &self.begin_string
    }

    /// Section the tag belongs to.
    pub fn section(&self, tag: Tag) -> Section {
        if self.header_tags.contains(&tag) {
            Section::Header
        } else if self.trailer_tags.contains(&tag) {
            Section::Trailer
        } else {
            Section::Body
        }
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::fix44()
    }
}

/// Human-readable name of a well-known tag, for log output.
pub fn field_name(tag: Tag) -> Option<&'static str> {
    let name = match tag {
        tags::AVG_PX => "AvgPx",
        tags::BEGIN_STRING => "BeginString",
        tags::BODY_LENGTH => "BodyLength",
        tags::CHECK_SUM => "CheckSum",
        tags::CL_ORD_ID => "ClOrdID",
        tags::CUM_QTY => "CumQty",
        tags::EXEC_ID => "ExecID",
        tags::MSG_SEQ_NUM => "MsgSeqNum",
        tags::MSG_TYPE => "MsgType",
        tags::ORDER_ID => "OrderID",
        tags::ORDER_QTY => "OrderQty",
        tags::ORD_STATUS => "OrdStatus",
        tags::ORD_TYPE => "OrdType",
        tags::ORIG_CL_ORD_ID => "OrigClOrdID",
        tags::PRICE => "Price",
        tags::REF_SEQ_NUM => "RefSeqNum",
        tags::REF_TAG_ID => "RefTagID",
        tags::SENDER_COMP_ID => "SenderCompID",
        tags::SENDING_TIME => "SendingTime",
        tags::SIDE => "Side",
        tags::SYMBOL => "Symbol",
        tags::TARGET_COMP_ID => "TargetCompID",
        tags::TEXT => "Text",
        tags::HEART_BT_INT => "HeartBtInt",
        tags::TEST_REQ_ID => "TestReqID",
        tags::EXEC_TYPE => "ExecType",
        tags::LEAVES_QTY => "LeavesQty",
        tags::SECONDARY_CL_ORD_ID => "SecondaryClOrdID",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fix44_sections() {
        let dd = Dictionary::fix44();
        assert_eq!(dd.section(tags::MSG_TYPE), Section::Header);
        assert_eq!(dd.section(tags::SENDER_COMP_ID), Section::Header);
        assert_eq!(dd.section(tags::CHECK_SUM), Section::Trailer);
        assert_eq!(dd.section(tags::CL_ORD_ID), Section::Body);
        assert_eq!(dd.section(9999), Section::Body);
    }

    #[test]
    fn custom_header_tag() {
        let dd = Dictionary::fix44().with_header_tag(1128);
        assert_eq!(dd.section(1128), Section::Header);
    }

    #[test]
    fn names() {
        assert_eq!(field_name(tags::CL_ORD_ID), Some("ClOrdID"));
        assert_eq!(field_name(4242), None);
    }
}
