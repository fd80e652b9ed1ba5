//! Script loading from disk.

use std::io::Write;

use fixsim_core::{BrokerRole, ClientRole, ScenarioError, SessionId, StepKind, load};
use fixsim_proto::tags;

fn script_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp script");
    file.write_all(contents.as_bytes()).expect("write temp script");
    file
}

const SCENARIO: &str = "\
# new order then ack
1: 35=D|49=CLIENT|56=HUB|11=123|55=FOO|54=1|38=100|40=2|44=10.5
2: 35=8|49=HUB|56=CLIENT|11=123|55=FOO|54=1|150=0|39=0
3: 35=A|98=0|108=30
";

#[test]
fn client_sees_send_then_expect() {
    let file = script_file(SCENARIO);
    let steps = load(file.path(), &ClientRole::default(), None).expect("load");

    let kinds: Vec<_> = steps.iter().map(|s| s.kind).collect();
    assert_eq!(kinds, vec![StepKind::Outbound, StepKind::ExpectInbound]);
    assert_eq!(steps[0].message.get(tags::PRICE), Some("10.5"));
    assert_eq!(steps[1].line, 3);
}

#[test]
fn broker_sees_the_mirror_image() {
    let file = script_file(SCENARIO);
    let steps = load(file.path(), &BrokerRole::new(), None).expect("load");

    let kinds: Vec<_> = steps.iter().map(|s| s.kind).collect();
    assert_eq!(kinds, vec![StepKind::ExpectInbound, StepKind::Outbound]);
}

#[test]
fn identity_filter_on_disk_script() {
    let file = script_file(SCENARIO);

    let other = SessionId::new("CLIENT2", "HUB");
    let steps = load(file.path(), &ClientRole::default(), Some(&other)).expect("load");
    assert!(steps.is_empty());

    let me = SessionId::new("CLIENT", "HUB");
    let steps = load(file.path(), &ClientRole::default(), Some(&me)).expect("load");
    assert_eq!(steps.len(), 2);
}

#[test]
fn missing_file_is_script_io() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = load(&dir.path().join("absent.txt"), &ClientRole::default(), None).unwrap_err();

    assert!(matches!(err, ScenarioError::ScriptIo { .. }));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn bad_line_is_script_parse_with_line_number() {
    let file = script_file("35=D|11=1\n\n35=D|=oops\n");
    let err = load(file.path(), &ClientRole::default(), None).unwrap_err();

    assert!(matches!(err, ScenarioError::ScriptParse { line: 3, .. }), "{err}");
}
