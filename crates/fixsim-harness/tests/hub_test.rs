//! Hub relay behaviour over the simulated network.

use std::sync::Arc;

use fixsim_core::{
    BrokerRole, ClientRole, HubConfig, HubRelay, RoleApp, SessionId, SessionLayer,
    SessionRegistry, Step, StepKind,
};
use fixsim_harness::{RecordingApp, RecordingSink, SimEnv, SimLink, SimNetwork, SimNode, settle};
use fixsim_proto::{Dictionary, Message, tags};

fn msg(text: &str) -> Message {
    Message::parse(&text.replace('|', "\u{1}"), &Dictionary::fix44()).expect("message")
}

struct Hub {
    relay: Arc<HubRelay>,
    node: SimNode,
    audit: Arc<RecordingSink>,
}

fn hub(env: &SimEnv) -> Hub {
    let registry = Arc::new(SessionRegistry::new());
    let audit = Arc::new(RecordingSink::new());
    let relay = Arc::new(HubRelay::new(HubConfig::default(), env, registry.clone(), audit.clone()));
    let node = SimNode::new(registry, relay.clone());
    Hub { relay, node, audit }
}

/// Plain client node: a registry to send through and a recorder for replies.
struct Endpoint {
    registry: Arc<SessionRegistry>,
    app: Arc<RecordingApp>,
}

impl Endpoint {
    fn new() -> Self {
        Self { registry: Arc::new(SessionRegistry::new()), app: Arc::new(RecordingApp::new()) }
    }

    fn node(&self) -> SimNode {
        SimNode::new(self.registry.clone(), self.app.clone())
    }
}

fn connect(network: &SimNetwork, node: &SimNode, hub: &Hub, comp_id: &str) -> SimLink {
    network.connect(node, &hub.node, SessionId::new(comp_id, "HUB"))
}

#[tokio::test(start_paused = true)]
async fn round_trip_restores_cl_ord_id() {
    let env = SimEnv::with_seed(11);
    let hub = hub(&env);
    let network = SimNetwork::new();

    let client = Endpoint::new();
    let broker_registry = Arc::new(SessionRegistry::new());
    let broker_audit = Arc::new(RecordingSink::new());
    let broker_app = Arc::new(RoleApp::new(
        BrokerRole::new().with_auto_ack(true),
        env.clone(),
        broker_registry.clone(),
        broker_audit.clone(),
    ));

    let client_link = connect(&network, &client.node(), &hub, "CLIENT");
    let _broker_link = connect(&network, &SimNode::new(broker_registry, broker_app), &hub, "BROKER");

    client
        .registry
        .send(msg("35=D|11=abc|55=FOO|54=1|38=5"), client_link.initiator_session())
        .expect("send");
    settle().await;

    let at_broker = broker_audit.lines_starting_with("Broker received 35=D");
    assert_eq!(at_broker.len(), 1);
    assert!(at_broker[0].contains("|526=abc|"), "{}", at_broker[0]);
    assert!(!at_broker[0].contains("|11=abc|"));

    let replies = client.app.received();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].get(tags::CL_ORD_ID), Some("abc"));
    assert!(!replies[0].contains(tags::SECONDARY_CL_ORD_ID));
    assert!(hub.relay.correlations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn identical_requests_get_distinct_synthetic_ids() {
    let env = SimEnv::with_seed(12);
    let hub = hub(&env);
    let network = SimNetwork::new();

    let client = Endpoint::new();
    let broker = Endpoint::new();
    let client_link = connect(&network, &client.node(), &hub, "CLIENT");
    let _broker_link = connect(&network, &broker.node(), &hub, "BROKER");

    for _ in 0..2 {
        client.registry.send(msg("35=D|11=7|55=FOO"), client_link.initiator_session()).expect("send");
    }
    settle().await;

    let orders = broker.app.received();
    assert_eq!(orders.len(), 2);
    let first = orders[0].get(tags::CL_ORD_ID).expect("11");
    let second = orders[1].get(tags::CL_ORD_ID).expect("11");
    assert_ne!(first, second);
    assert_eq!(orders[0].get(tags::SECONDARY_CL_ORD_ID), Some("7"));
    assert_eq!(hub.relay.correlations().len(), 2);
    assert!(hub.relay.correlations().contains(first));
}

#[tokio::test(start_paused = true)]
async fn reply_with_compound_stash_restores_suffix() {
    let env = SimEnv::with_seed(13);
    let hub = hub(&env);
    let network = SimNetwork::new();

    let client = Endpoint::new();
    let broker = Endpoint::new();
    let _client_link = connect(&network, &client.node(), &hub, "CLIENT");
    let broker_link = connect(&network, &broker.node(), &hub, "BROKER");

    broker
        .registry
        .send(msg("35=8|11=SYNTH1|526=sim1-CLIENT-42|150=0|39=0"), broker_link.initiator_session())
        .expect("send");
    settle().await;

    let replies = client.app.received();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].get(tags::CL_ORD_ID), Some("42"));
    assert!(!replies[0].contains(tags::SECONDARY_CL_ORD_ID));
}

#[tokio::test(start_paused = true)]
async fn drop_when_broker_never_connected() {
    let env = SimEnv::with_seed(14);
    let hub = hub(&env);
    let network = SimNetwork::new();

    let client = Endpoint::new();
    let client_link = connect(&network, &client.node(), &hub, "CLIENT");

    client.registry.send(msg("35=D|11=1|55=FOO"), client_link.initiator_session()).expect("send");
    settle().await;

    assert!(hub.relay.correlations().is_empty());
    assert_eq!(hub.audit.lines_starting_with("[CLIENT->HUB] Received 35=D").len(), 1);
    assert_eq!(client_link.outbound().delivered(), 1);
}

#[tokio::test(start_paused = true)]
async fn drop_when_broker_logged_out() {
    let env = SimEnv::with_seed(15);
    let hub = hub(&env);
    let network = SimNetwork::new();

    let client = Endpoint::new();
    let broker = Endpoint::new();
    let client_link = connect(&network, &client.node(), &hub, "CLIENT");
    let broker_link = connect(&network, &broker.node(), &hub, "BROKER");
    broker_link.disconnect().await;
    assert_eq!(broker.app.logouts(), 1);

    client.registry.send(msg("35=D|11=1|55=FOO"), client_link.initiator_session()).expect("send");
    settle().await;

    assert!(broker.app.received().is_empty());
    assert_eq!(broker_link.inbound().delivered(), 0);
    assert!(hub.relay.correlations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unknown_counterparty_is_ignored() {
    let env = SimEnv::with_seed(16);
    let hub = hub(&env);
    let network = SimNetwork::new();

    let stranger = Endpoint::new();
    let broker = Endpoint::new();
    let stranger_link = connect(&network, &stranger.node(), &hub, "STRANGER");
    let _broker_link = connect(&network, &broker.node(), &hub, "BROKER");

    stranger.registry.send(msg("35=D|11=1"), stranger_link.initiator_session()).expect("send");
    settle().await;

    assert!(broker.app.received().is_empty());
    assert!(hub.audit.lines().is_empty());
}

#[tokio::test(start_paused = true)]
async fn client_role_prefix_survives_the_hub() {
    let env = SimEnv::with_seed(17);
    let hub = hub(&env);
    let network = SimNetwork::new();

    let client_registry = Arc::new(SessionRegistry::new());
    let client_app = Arc::new(RoleApp::new(
        ClientRole::default(),
        env.clone(),
        client_registry.clone(),
        Arc::new(RecordingSink::new()),
    ));
    let broker = Endpoint::new();
    let client_session = SessionId::new("CLIENT", "HUB");
    let _client_link =
        network.connect(&SimNode::new(client_registry, client_app.clone()), &hub.node, client_session.clone());
    let _broker_link = connect(&network, &broker.node(), &hub, "BROKER");

    let steps = vec![Step::new(StepKind::Outbound, msg("35=D|11=9|55=FOO"), 1)];
    client_app.runner(client_session).run(&steps).await.expect("scenario");
    settle().await;

    let orders = broker.app.received();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].get(tags::SECONDARY_CL_ORD_ID), Some("sim1-CLIENT-9"));
    assert_eq!(orders[0].sender_comp_id(), Some("HUB"));
    assert_eq!(orders[0].target_comp_id(), Some("BROKER"));
}
