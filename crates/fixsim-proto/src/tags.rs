//! Field tags and message types.
//!
//! Only the tags the harness reads or writes get a constant here. Anything
//! else in a script is carried through untouched as an opaque `(tag, value)`
//! pair.

/// Numeric field tag.
pub type Tag = u32;

/// `8` BeginString
pub const BEGIN_STRING: Tag = 8;
/// `9` BodyLength
pub const BODY_LENGTH: Tag = 9;
/// `10` CheckSum
pub const CHECK_SUM: Tag = 10;
/// `11` ClOrdID, the client correlation identifier
pub const CL_ORD_ID: Tag = 11;
/// `14` CumQty
pub const CUM_QTY: Tag = 14;
/// `17` ExecID
pub const EXEC_ID: Tag = 17;
/// `34` MsgSeqNum
pub const MSG_SEQ_NUM: Tag = 34;
/// `35` MsgType
pub const MSG_TYPE: Tag = 35;
/// `37` OrderID
pub const ORDER_ID: Tag = 37;
/// `38` OrderQty
pub const ORDER_QTY: Tag = 38;
/// `39` OrdStatus
pub const ORD_STATUS: Tag = 39;
/// `40` OrdType
pub const ORD_TYPE: Tag = 40;
/// `41` OrigClOrdID
pub const ORIG_CL_ORD_ID: Tag = 41;
/// `43` PossDupFlag
pub const POSS_DUP_FLAG: Tag = 43;
/// `44` Price
pub const PRICE: Tag = 44;
/// `45` RefSeqNum
pub const REF_SEQ_NUM: Tag = 45;
/// `49` SenderCompID
pub const SENDER_COMP_ID: Tag = 49;
/// `50` SenderSubID
pub const SENDER_SUB_ID: Tag = 50;
/// `52` SendingTime
pub const SENDING_TIME: Tag = 52;
/// `54` Side
pub const SIDE: Tag = 54;
/// `55` Symbol
pub const SYMBOL: Tag = 55;
/// `56` TargetCompID
pub const TARGET_COMP_ID: Tag = 56;
/// `57` TargetSubID
pub const TARGET_SUB_ID: Tag = 57;
/// `58` Text
pub const TEXT: Tag = 58;
/// `6` AvgPx
pub const AVG_PX: Tag = 6;
/// `371` RefTagID
pub const REF_TAG_ID: Tag = 371;
/// `97` PossResend
pub const POSS_RESEND: Tag = 97;
/// `98` EncryptMethod
pub const ENCRYPT_METHOD: Tag = 98;
/// `108` HeartBtInt
pub const HEART_BT_INT: Tag = 108;
/// `112` TestReqID
pub const TEST_REQ_ID: Tag = 112;
/// `115` OnBehalfOfCompID
pub const ON_BEHALF_OF_COMP_ID: Tag = 115;
/// `122` OrigSendingTime
pub const ORIG_SENDING_TIME: Tag = 122;
/// `128` DeliverToCompID
pub const DELIVER_TO_COMP_ID: Tag = 128;
/// `150` ExecType
pub const EXEC_TYPE: Tag = 150;
/// `151` LeavesQty
pub const LEAVES_QTY: Tag = 151;
/// `526` SecondaryClOrdID, used by the hub to stash the client's ClOrdID
pub const SECONDARY_CL_ORD_ID: Tag = 526;

/// Message type discriminator (tag 35).
///
/// Unknown discriminators are not an error at this layer: scripts may carry
/// message types the harness does not act on, so callers get `None` from
/// [`MsgType::from_wire`] and decide for themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgType {
    /// `0`
    Heartbeat,
    /// `1`
    TestRequest,
    /// `2`
    ResendRequest,
    /// `3`
    Reject,
    /// `4`
    SequenceReset,
    /// `5`
    Logout,
    /// `A`
    Logon,
    /// `D`
    NewOrderSingle,
    /// `F`
    OrderCancelRequest,
    /// `G`
    OrderCancelReplaceRequest,
    /// `8`
    ExecutionReport,
    /// `9`
    OrderCancelReject,
}

impl MsgType {
    /// Parse a tag 35 value.
    pub fn from_wire(value: &str) -> Option<Self> {
        let msg_type = match value {
            "0" => Self::Heartbeat,
            "1" => Self::TestRequest,
            "2" => Self::ResendRequest,
            "3" => Self::Reject,
            "4" => Self::SequenceReset,
            "5" => Self::Logout,
            "A" => Self::Logon,
            "D" => Self::NewOrderSingle,
            "F" => Self::OrderCancelRequest,
            "G" => Self::OrderCancelReplaceRequest,
            "8" => Self::ExecutionReport,
            "9" => Self::OrderCancelReject,
            _ => return None,
        };
        Some(msg_type)
    }

    /// The tag 35 value for this type.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Heartbeat => "0",
            Self::TestRequest => "1",
            Self::ResendRequest => "2",
            Self::Reject => "3",
            Self::SequenceReset => "4",
            Self::Logout => "5",
            Self::Logon => "A",
            Self::NewOrderSingle => "D",
            Self::OrderCancelRequest => "F",
            Self::OrderCancelReplaceRequest => "G",
            Self::ExecutionReport => "8",
            Self::OrderCancelReject => "9",
        }
    }

    /// Session-level (admin) messages never reach application callbacks.
    pub const fn is_admin(self) -> bool {
        matches!(
            self,
            Self::Heartbeat
                | Self::TestRequest
                | Self::ResendRequest
                | Self::Reject
                | Self::SequenceReset
                | Self::Logout
                | Self::Logon
        )
    }

    /// Client requests that open or amend an order.
    pub const fn is_order_request(self) -> bool {
        matches!(
            self,
            Self::NewOrderSingle | Self::OrderCancelRequest | Self::OrderCancelReplaceRequest
        )
    }
}

impl std::fmt::Display for MsgType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values_roundtrip() {
        for msg_type in [
            MsgType::Heartbeat,
            MsgType::Logon,
            MsgType::NewOrderSingle,
            MsgType::OrderCancelRequest,
            MsgType::OrderCancelReplaceRequest,
            MsgType::ExecutionReport,
        ] {
            assert_eq!(MsgType::from_wire(msg_type.as_str()), Some(msg_type));
        }
    }

    #[test]
    fn unknown_discriminator_is_none() {
        assert_eq!(MsgType::from_wire("ZZ"), None);
        assert_eq!(MsgType::from_wire(""), None);
    }

    #[test]
    fn order_requests() {
        assert!(MsgType::NewOrderSingle.is_order_request());
        assert!(MsgType::OrderCancelReplaceRequest.is_order_request());
        assert!(!MsgType::ExecutionReport.is_order_request());
        assert!(MsgType::Logon.is_admin());
        assert!(!MsgType::NewOrderSingle.is_admin());
    }
}
