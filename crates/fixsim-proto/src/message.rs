//! Tag/value message model.
//!
//! A [`Message`] is three ordered field lists: header, body and trailer.
//! Order is kept exactly as parsed or inserted so that a message re-encodes
//! the way it was written, which matters when scripts are replayed.

use crate::{
    dictionary::{Dictionary, Section},
    errors::ParseError,
    tags::{self, MsgType, Tag},
};

/// Field delimiter (SOH).
pub const SOH: char = '\u{1}';

/// Ordered list of `(tag, value)` fields.
///
/// Lookups return the first occurrence of a tag. Repeated tags are kept
/// because repeating groups legitimately reuse them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    fields: Vec<(Tag, String)>,
}

impl FieldMap {
    /// Create an empty field map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of the first field with this tag.
    pub fn get(&self, tag: Tag) -> Option<&str> {
        self.fields.iter().find(|(t, _)| *t == tag).map(|(_, v)| v.as_str())
    }

    /// Whether a field with this tag is present.
    pub fn contains(&self, tag: Tag) -> bool {
        self.fields.iter().any(|(t, _)| *t == tag)
    }

    /// Replace the first field with this tag in place, or append it.
    pub fn set(&mut self, tag: Tag, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(t, _)| *t == tag) {
            Some(field) => field.1 = value,
            None => self.fields.push((tag, value)),
        }
    }

    /// Append a field even if the tag is already present.
    pub fn push(&mut self, tag: Tag, value: impl Into<String>) {
        self.fields.push((tag, value.into()));
    }

    /// Remove every field with this tag, returning the first value.
    pub fn remove(&mut self, tag: Tag) -> Option<String> {
        let first = self.fields.iter().position(|(t, _)| *t == tag)?;
        let (_, value) = self.fields.remove(first);
        self.fields.retain(|(t, _)| *t != tag);
        Some(value)
    }

    /// Iterate fields in order.
    pub fn iter(&self) -> impl Iterator<Item = (Tag, &str)> {
        self.fields.iter().map(|(t, v)| (*t, v.as_str()))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether there are no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A protocol message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    header: FieldMap,
    body: FieldMap,
    trailer: FieldMap,
}

impl Message {
    /// Create a message with only MsgType set.
    pub fn new(msg_type: MsgType) -> Self {
        let mut message = Self::default();
        message.header.set(tags::MSG_TYPE, msg_type.as_str());
        message
    }

    /// Parse SOH-delimited text using the given dictionary for section
    /// placement.
    ///
    /// A first field without `=` is shorthand for `35=<field>`, so
    /// `D|11=1|55=FOO` (after pipe normalisation) is a NewOrderSingle.
    /// Body length and checksum are not validated here.
    pub fn parse(text: &str, dictionary: &Dictionary) -> Result<Self, ParseError> {
        let mut message = Self::default();
        let mut saw_field = false;

        for (index, field) in text.split(SOH).enumerate() {
            if field.is_empty() {
                continue;
            }
            let position = index + 1;
            saw_field = true;

            let Some((raw_tag, value)) = field.split_once('=') else {
                if index == 0 && !message.header.contains(tags::MSG_TYPE) {
                    message.header.set(tags::MSG_TYPE, field.trim());
                    continue;
                }
                return Err(ParseError::MalformedField { position, field: field.to_string() });
            };

            let tag = match raw_tag.trim().parse::<Tag>() {
                Ok(tag) if tag > 0 => tag,
                _ => {
                    return Err(ParseError::InvalidTag { position, tag: raw_tag.to_string() });
                },
            };
            if value.is_empty() {
                return Err(ParseError::EmptyValue(tag));
            }

            match dictionary.section(tag) {
                Section::Header => {
                    if message.header.contains(tag) {
                        return Err(ParseError::DuplicateTag(tag));
                    }
                    message.header.push(tag, value);
                },
                Section::Trailer => {
                    if message.trailer.contains(tag) {
                        return Err(ParseError::DuplicateTag(tag));
                    }
                    message.trailer.push(tag, value);
                },
                Section::Body => message.body.push(tag, value),
            }
        }

        if !saw_field {
            return Err(ParseError::Empty);
        }
        if !message.header.contains(tags::MSG_TYPE) {
            return Err(ParseError::MissingMsgType);
        }
        Ok(message)
    }

    /// Raw MsgType (35) value.
    pub fn msg_type_str(&self) -> Option<&str> {
        self.header.get(tags::MSG_TYPE)
    }

    /// MsgType, if it is one the harness knows.
    pub fn msg_type(&self) -> Option<MsgType> {
        self.msg_type_str().and_then(MsgType::from_wire)
    }

    /// SenderCompID (49).
    pub fn sender_comp_id(&self) -> Option<&str> {
        self.header.get(tags::SENDER_COMP_ID)
    }

    /// TargetCompID (56).
    pub fn target_comp_id(&self) -> Option<&str> {
        self.header.get(tags::TARGET_COMP_ID)
    }

    /// Header fields.
    pub fn header(&self) -> &FieldMap {
        &self.header
    }

    /// Mutable header fields.
    pub fn header_mut(&mut self) -> &mut FieldMap {
        &mut self.header
    }

    /// Body fields.
    pub fn body(&self) -> &FieldMap {
        &self.body
    }

    /// Mutable body fields.
    pub fn body_mut(&mut self) -> &mut FieldMap {
        &mut self.body
    }

    /// Trailer fields.
    pub fn trailer(&self) -> &FieldMap {
        &self.trailer
    }

    /// Body field value.
    pub fn get(&self, tag: Tag) -> Option<&str> {
        self.body.get(tag)
    }

    /// Whether the body carries this tag.
    pub fn contains(&self, tag: Tag) -> bool {
        self.body.contains(tag)
    }

    /// Set a body field.
    pub fn set(&mut self, tag: Tag, value: impl Into<String>) {
        self.body.set(tag, value);
    }

    /// Remove a body field.
    pub fn remove(&mut self, tag: Tag) -> Option<String> {
        self.body.remove(tag)
    }

    /// Drop the trailer (checksum is recomputed on encode anyway).
    pub fn clear_trailer(&mut self) {
        self.trailer = FieldMap::new();
    }

    /// Human-readable form: the wire text with SOH shown as `|`.
    pub fn pretty(&self) -> String {
        self.to_wire().replace(SOH, "|")
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.pretty())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn soh(text: &str) -> String {
        text.replace('|', "\u{1}")
    }

    #[test]
    fn parse_places_fields_by_section() {
        let dd = Dictionary::fix44();
        let msg = Message::parse(&soh("8=FIX.4.4|35=D|49=CLI|56=BRK|11=42|55=FOO|10=123|"), &dd)
            .unwrap();

        assert_eq!(msg.msg_type(), Some(MsgType::NewOrderSingle));
        assert_eq!(msg.sender_comp_id(), Some("CLI"));
        assert_eq!(msg.target_comp_id(), Some("BRK"));
        assert_eq!(msg.get(tags::CL_ORD_ID), Some("42"));
        assert_eq!(msg.body().len(), 2);
        assert_eq!(msg.trailer().get(tags::CHECK_SUM), Some("123"));
    }

    #[test]
    fn bare_first_field_is_msg_type_shorthand() {
        let dd = Dictionary::fix44();
        let msg = Message::parse(&soh("D|11=1|55=FOO|54=1|"), &dd).unwrap();

        assert_eq!(msg.msg_type_str(), Some("D"));
        assert_eq!(msg.get(tags::SIDE), Some("1"));
    }

    #[test]
    fn bare_field_after_first_is_rejected() {
        let dd = Dictionary::fix44();
        let err = Message::parse(&soh("35=D|11=1|oops|"), &dd).unwrap_err();
        assert_eq!(err, ParseError::MalformedField { position: 3, field: "oops".into() });
    }

    #[test]
    fn parse_rejects_bad_tags_and_values() {
        let dd = Dictionary::fix44();
        assert!(matches!(
            Message::parse(&soh("35=D|x=1|"), &dd),
            Err(ParseError::InvalidTag { position: 2, .. })
        ));
        assert!(matches!(Message::parse(&soh("35=D|0=1|"), &dd), Err(ParseError::InvalidTag { .. })));
        assert_eq!(Message::parse(&soh("35=D|11=|"), &dd), Err(ParseError::EmptyValue(11)));
        assert_eq!(Message::parse(&soh("11=1|55=X|"), &dd), Err(ParseError::MissingMsgType));
        assert_eq!(Message::parse("", &dd), Err(ParseError::Empty));
        assert_eq!(
            Message::parse(&soh("35=D|49=A|49=B|"), &dd),
            Err(ParseError::DuplicateTag(tags::SENDER_COMP_ID))
        );
    }

    #[test]
    fn body_keeps_repeated_tags() {
        let dd = Dictionary::fix44();
        let msg = Message::parse(&soh("35=D|448=A|448=B|"), &dd).unwrap();
        assert_eq!(msg.body().len(), 2);
        assert_eq!(msg.get(448), Some("A"));
    }

    #[test]
    fn field_map_set_replaces_in_place() {
        let mut fields = FieldMap::new();
        fields.set(11, "a");
        fields.set(55, "FOO");
        fields.set(11, "b");

        let collected: Vec<_> = fields.iter().collect();
        assert_eq!(collected, vec![(11, "b"), (55, "FOO")]);
    }

    #[test]
    fn field_map_remove_drops_all_occurrences() {
        let mut fields = FieldMap::new();
        fields.push(526, "x");
        fields.push(526, "y");
        assert_eq!(fields.remove(526).as_deref(), Some("x"));
        assert!(!fields.contains(526));
        assert_eq!(fields.remove(526), None);
    }
}
