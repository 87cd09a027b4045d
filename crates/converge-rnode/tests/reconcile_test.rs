//! End-to-end reconciliation against the in-memory compute API

use converge_api::{Key, Version};
use converge_ratelimit::{CancellationToken, RateLimitConfig};
use converge_rnode::backendservice::{self, Backend};
use converge_rnode::healthcheck::{self, alpha, ga};
use converge_rnode::{
    ActionSummary, ActionType, Builder, ComputeApi, Executor, FakeCompute, Node, NodeError,
    NodeState, Operation, Ownership, PlanDetails,
};
use std::sync::Arc;

const PROJECT: &str = "proj-1";

fn hc(interval: i64) -> ga::HealthCheck {
    ga::HealthCheck {
        name: "hc-1".into(),
        check_interval_sec: interval,
        healthy_threshold: 10,
        timeout_sec: 5,
        type_: "TCP".into(),
        unhealthy_threshold: 4,
        tcp_health_check: Some(healthcheck::TcpHealthCheck {
            port: 80,
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn desired_hc(interval: i64) -> healthcheck::HealthCheckNode {
    let mut m = healthcheck::new_mutable(PROJECT, Key::global("hc-1"));
    m.set(&hc(interval)).unwrap();
    Builder::with_resource(m.freeze().unwrap()).build().unwrap()
}

fn absent_hc() -> healthcheck::HealthCheckNode {
    let mut b = healthcheck::builder(healthcheck::id(PROJECT, Key::global("hc-1")));
    b.set_state(NodeState::DoesNotExist);
    b.build().unwrap()
}

async fn observe_hc(api: &FakeCompute) -> healthcheck::HealthCheckNode {
    let id = healthcheck::id(PROJECT, Key::global("hc-1"));
    match api.get(&id, Version::Ga).await {
        Ok(value) => {
            let res = healthcheck::HealthCheckResource::from_remote(id, Version::Ga, value).unwrap();
            Builder::with_resource(res).build().unwrap()
        }
        Err(err) if err.is_not_found() => absent_hc(),
        Err(err) => panic!("get failed: {err}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_create_then_converged() {
    let api = Arc::new(FakeCompute::new());
    let limiter = Arc::new(RateLimitConfig::standard().build().unwrap());
    let exec = Executor::new(api.clone(), limiter).with_cancel(CancellationToken::new());

    let mut want = desired_hc(7);
    let got = observe_hc(&api).await;
    assert_eq!(want.update_plan(&got).unwrap(), Operation::Create);
    let actions = want.actions(&got).unwrap();
    assert_eq!(ActionSummary::of(&actions).create, 1);
    assert_eq!(actions[0].version, Version::Ga);
    exec.execute(&actions).await.unwrap();

    // The server assigned selfLink and id; they do not count as a diff.
    let got = observe_hc(&api).await;
    assert_eq!(want.update_plan(&got).unwrap(), Operation::Nothing);
    let actions = want.actions(&got).unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].action_type, ActionType::NoOp);
    assert!(!ActionSummary::of(&actions).has_changes());
    assert_eq!(want.plan().history().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_recreate_health_check_on_change() {
    let api = Arc::new(FakeCompute::new());
    let limiter = Arc::new(RateLimitConfig::standard().build().unwrap());
    let exec = Executor::new(api.clone(), limiter);

    let want = desired_hc(7);
    let absent = absent_hc();
    let mut first = want.clone();
    first.update_plan(&absent).unwrap();
    exec.execute(&first.actions(&absent).unwrap()).await.unwrap();

    // Health checks have no update, so a changed interval is planned as
    // an update that cannot be expanded; overriding the plan recreates.
    let mut changed = desired_hc(100);
    let got = observe_hc(&api).await;
    assert_eq!(changed.update_plan(&got).unwrap(), Operation::Update);
    assert!(matches!(
        changed.actions(&got),
        Err(NodeError::UpdateNotSupported { .. })
    ));

    changed
        .plan_mut()
        .set(PlanDetails::new(Operation::Recreate, "no update for health checks"));
    let actions = changed.actions(&got).unwrap();
    let types: Vec<ActionType> = actions.iter().map(|a| a.action_type).collect();
    assert_eq!(types, vec![ActionType::Delete, ActionType::Create]);
    exec.execute(&actions).await.unwrap();

    let stored = api
        .get(&healthcheck::id(PROJECT, Key::global("hc-1")), Version::Ga)
        .await
        .unwrap();
    assert_eq!(stored["checkIntervalSec"], 100);
    assert!(changed.plan().explain().contains("recreate (no update for health checks)"));
}

#[tokio::test]
async fn test_alpha_payload_for_alpha_only_fields() {
    let mut m = healthcheck::new_mutable(PROJECT, Key::global("hc-1"));
    m.set(&hc(7)).unwrap();
    m.access_alpha(|x: &mut alpha::HealthCheck| {
        x.type_ = "UDP".into();
        x.udp_health_check = Some(alpha::UdpHealthCheck {
            port: 60,
            ..Default::default()
        });
    })
    .unwrap();
    let mut want = Builder::with_resource(m.freeze().unwrap()).build().unwrap();
    let got = absent_hc();

    want.update_plan(&got).unwrap();
    let actions = want.actions(&got).unwrap();
    assert_eq!(actions[0].version, Version::Alpha);
    let payload = actions[0].payload.as_ref().unwrap();
    assert_eq!(payload["udpHealthCheck"]["port"], 60);
}

#[test]
fn test_plan_policy_edges() {
    let want = desired_hc(7);
    let absent = absent_hc();

    // Not wanted and not there.
    assert_eq!(absent.diff(&absent).unwrap().operation, Operation::Nothing);
    // There but not wanted.
    assert_eq!(absent.diff(&want).unwrap().operation, Operation::Delete);

    // Unmanaged nodes are never touched.
    let mut b = healthcheck::builder(want.id().clone());
    b.set_ownership(Ownership::Unmanaged)
        .set_resource(want.resource().unwrap().clone());
    let unmanaged = b.build().unwrap();
    assert_eq!(unmanaged.diff(&absent).unwrap().operation, Operation::Nothing);

    // Plans that need both sides are rejected when one is missing.
    for op in [Operation::Update, Operation::Recreate] {
        let mut n = want.clone();
        n.plan_mut().set(PlanDetails::new(op, "forced"));
        assert!(matches!(
            n.actions(&absent),
            Err(NodeError::InconsistentPlan { .. })
        ));
    }

    // A create without a resource cannot be expanded.
    let mut empty = absent_hc();
    empty.plan_mut().set(PlanDetails::new(Operation::Create, "forced"));
    assert!(matches!(
        empty.actions(&want),
        Err(NodeError::MissingResource { .. })
    ));
}

#[test]
fn test_kind_mismatch() {
    let hc_node = desired_hc(7);
    let mut m = backendservice::new_mutable(PROJECT, Key::global("hc-1"));
    m.access(|x| x.name = "hc-1".into()).unwrap();
    let bs_node = Builder::with_resource(m.freeze().unwrap()).build().unwrap();
    assert!(matches!(
        hc_node.diff(&bs_node),
        Err(NodeError::KindMismatch { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_backend_service_update_in_place() {
    let api = Arc::new(FakeCompute::new());
    let limiter = Arc::new(RateLimitConfig::standard().build().unwrap());
    let exec = Executor::new(api.clone(), limiter);
    let id = backendservice::id(PROJECT, Key::global("bs-1"));

    let bs = |timeout: i64| backendservice::ga::BackendService {
        name: "bs-1".into(),
        protocol: "TCP".into(),
        load_balancing_scheme: "INTERNAL_SELF_MANAGED".into(),
        timeout_sec: timeout,
        health_checks: vec![healthcheck::id(PROJECT, Key::global("hc-1")).self_link(Version::Ga)],
        backends: vec![Backend {
            group: "projects/proj-1/zones/z1/networkEndpointGroups/neg-1".into(),
            ..Default::default()
        }],
        ..Default::default()
    };
    let mut stored = serde_json::to_value(bs(10)).unwrap();
    stored["fingerprint"] = "fp-1".into();
    api.insert(id.clone(), stored).await;

    let mut m = backendservice::new_mutable(PROJECT, Key::global("bs-1"));
    m.set(&bs(30)).unwrap();
    let mut want = Builder::with_resource(m.freeze().unwrap()).build().unwrap();
    assert_eq!(want.out_refs().len(), 2);

    let value = api.get(&id, Version::Ga).await.unwrap();
    let got = Builder::with_resource(
        backendservice::BackendServiceResource::from_remote(id.clone(), Version::Ga, value)
            .unwrap(),
    )
    .build()
    .unwrap();

    assert_eq!(want.update_plan(&got).unwrap(), Operation::Update);
    let actions = want.actions(&got).unwrap();
    assert_eq!(actions.len(), 1);
    exec.execute(&actions).await.unwrap();

    let updated = api.get(&id, Version::Ga).await.unwrap();
    assert_eq!(updated["timeoutSec"], 30);
    assert_eq!(updated["fingerprint"], "fp-1");
    assert_eq!(
        api.calls().await,
        vec![
            "get projects/proj-1/global/backendServices/bs-1",
            "update projects/proj-1/global/backendServices/bs-1",
            "get projects/proj-1/global/backendServices/bs-1",
        ]
    );
}
