//! Scenario script loading.
//!
//! A script is UTF-8 text with one message per line:
//!
//! ```text
//! # comment
//! // also a comment
//! 1: 35=D|11=123|55=FOO|54=1|38=100
//! 2: 8|11=123|150=0|39=0
//! ```
//!
//! Fields may be separated by SOH or `|`, and a leading `N:` is ignored. Each
//! line is classified by the role; lines the role has no direction for are
//! skipped.

use std::path::{Path, PathBuf};

use fixsim_proto::{Dictionary, Message, SOH};
use tracing::{debug, info};

use crate::{
    error::ScenarioError,
    role::Role,
    session::SessionId,
    step::{Step, StepKind},
};

/// Load the script at `path` into steps for `role`.
///
/// With `identity` set, steps addressed to or from somebody else are dropped
/// (see [`parse_script`]).
pub fn load<R: Role + ?Sized>(
    path: &Path,
    role: &R,
    identity: Option<&SessionId>,
) -> Result<Vec<Step>, ScenarioError> {
    let text = std::fs::read_to_string(path)
        .map_err(|source| ScenarioError::ScriptIo { path: path.to_path_buf(), source })?;
    let steps = parse_script(&text, path, role, identity)?;
    info!(path = %path.display(), steps = steps.len(), role = role.name(), "scenario loaded");
    Ok(steps)
}

/// Parse script text into steps.
///
/// `source` names the script in errors. Identity filtering, when `identity`
/// is given: an OUTBOUND step declaring a SenderCompID other than ours, or an
/// EXPECT_INBOUND step declaring a TargetCompID other than ours, is skipped.
/// A step that declares neither is always kept.
pub fn parse_script<R: Role + ?Sized>(
    text: &str,
    source: impl AsRef<Path>,
    role: &R,
    identity: Option<&SessionId>,
) -> Result<Vec<Step>, ScenarioError> {
    let dictionary = Dictionary::default();
    let source = source.as_ref();
    let mut steps = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let Some(body) = script_line(raw) else {
            continue;
        };

        let message = Message::parse(&body, &dictionary).map_err(|source_err| {
            ScenarioError::ScriptParse { path: PathBuf::from(source), line, source: source_err }
        })?;

        let msg_type = message.msg_type_str().unwrap_or_default();
        let Some(kind) = role.classify(msg_type) else {
            info!(line, msg_type, role = role.name(), "skipping line with unhandled MsgType");
            continue;
        };

        if let Some(identity) = identity {
            let (declared, field) = match kind {
                StepKind::Outbound => (message.sender_comp_id(), "SenderCompID"),
                StepKind::ExpectInbound => (message.target_comp_id(), "TargetCompID"),
            };
            if let Some(declared) = declared
                && declared != identity.sender_comp_id()
            {
                info!(line, %kind, field, declared, ours = identity.sender_comp_id(), "skipping step for another identity");
                continue;
            }
        }

        debug!(line, %kind, message = %message.pretty(), "step");
        steps.push(Step::new(kind, message, line));
    }

    Ok(steps)
}

/// Normalize one raw line into parseable text, or `None` to skip it.
fn script_line(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("//") {
        return None;
    }

    let content = strip_line_number(trimmed);
    if content.is_empty() {
        return None;
    }

    let mut body = if content.contains(SOH) { content.to_string() } else { content.replace('|', "\u{1}") };
    if !body.ends_with(SOH) {
        body.push(SOH);
    }
    Some(body)
}

/// Drop a leading `<digits>:` and the whitespace after it.
fn strip_line_number(line: &str) -> &str {
    match line.split_once(':') {
        Some((number, rest)) if !number.is_empty() && number.bytes().all(|b| b.is_ascii_digit()) => {
            rest.trim_start()
        },
        _ => line,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use fixsim_proto::tags;

    use super::*;
    use crate::role::{BrokerRole, ClientRole};

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let script = "\n# heading\n   \n// note\n35=D|11=1|55=FOO\n";
        let steps = parse_script(script, "t", &ClientRole::default(), None).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].line, 5);
        assert_eq!(steps[0].kind, StepKind::Outbound);
    }

    #[test]
    fn line_number_prefix_is_stripped() {
        let steps =
            parse_script("12:   35=8|11=7|39=0", "t", &ClientRole::default(), None).unwrap();
        assert_eq!(steps[0].message.get(tags::CL_ORD_ID), Some("7"));
        assert_eq!(steps[0].kind, StepKind::ExpectInbound);
    }

    #[test]
    fn msg_type_shorthand() {
        let steps = parse_script("D|11=1|55=FOO|54=1", "t", &BrokerRole::new(), None).unwrap();
        assert_eq!(steps[0].message.msg_type_str(), Some("D"));
        assert_eq!(steps[0].kind, StepKind::ExpectInbound);
    }

    #[test]
    fn soh_lines_are_taken_as_is() {
        let script = "35=D\u{1}11=a|b\u{1}55=FOO";
        let steps = parse_script(script, "t", &ClientRole::default(), None).unwrap();
        assert_eq!(steps[0].message.get(tags::CL_ORD_ID), Some("a|b"));
    }

    #[test]
    fn unknown_types_are_skipped() {
        let script = "35=A|98=0\n35=0\n35=D|11=1";
        let steps = parse_script(script, "t", &ClientRole::default(), None).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].line, 3);
    }

    #[test]
    fn parse_failure_reports_line() {
        let script = "35=D|11=1\n35=D|oops";
        let err = parse_script(script, "scenario.txt", &ClientRole::default(), None).unwrap_err();
        assert!(matches!(err, ScenarioError::ScriptParse { line: 2, .. }), "{err}");
        assert!(err.to_string().starts_with("scenario.txt:2:"));
    }

    #[test]
    fn identity_filter_drops_foreign_steps() {
        let me = SessionId::new("CLIENT1", "HUB");
        let script = "\
35=D|49=CLIENT1|11=1
35=D|49=CLIENT2|11=2
35=D|11=3
35=8|56=CLIENT1|11=1
35=8|56=CLIENT2|11=2
35=8|11=3";
        let steps = parse_script(script, "t", &ClientRole::default(), Some(&me)).unwrap();
        let lines: Vec<_> = steps.iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![1, 3, 4, 6]);
    }

    #[test]
    fn no_identity_keeps_everything() {
        let script = "35=D|49=X|11=1\n35=8|56=Y|11=1";
        let steps = parse_script(script, "t", &ClientRole::default(), None).unwrap();
        assert_eq!(steps.len(), 2);
    }

    #[test]
    fn strip_prefix_only_for_digits() {
        assert_eq!(strip_line_number("3: 35=D"), "35=D");
        assert_eq!(strip_line_number("35=D|58=a:b"), "35=D|58=a:b");
        assert_eq!(strip_line_number(":35=D"), ":35=D");
    }
}
