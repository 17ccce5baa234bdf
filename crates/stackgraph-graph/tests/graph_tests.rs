//! Tests for stackgraph-graph: validation, ordered resolution, outputs

use serde_json::json;
use stackgraph_core::{Attributes, Error, ErrorKind, OutputValue, PropertyValue, ResourceId};
use stackgraph_graph::*;
use stackgraph_policy::{CapabilityDocument, CapabilityStatement, Identity};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn attrs(pairs: &[(&str, &str)]) -> Attributes {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), json!(v)))
        .collect()
}

fn exec_role() -> Identity {
    let mut role = Identity::new("exec-role");
    role.add_trust_principal("service-x").unwrap();
    let doc = CapabilityDocument::from_statements([CapabilityStatement::allow(
        ["s3:GetObject"],
        ["arn:aws:s3:::*"],
    )
    .unwrap()])
    .unwrap();
    role.attach_inline_document("read", &doc).unwrap();
    role.finalize().unwrap();
    role
}

/// Records the order in which resources were provisioned.
fn recording_effect(
    log: Arc<Mutex<Vec<String>>>,
    produced: Attributes,
) -> FnEffect {
    FnEffect::new(move |id, _, _| {
        log.lock().unwrap().push(id.to_string());
        Ok(produced.clone())
    })
}

// ===========================================================================
// Validation
// ===========================================================================

#[test]
fn acyclic_graph_orders_every_node_after_its_references() {
    let mut g = StackGraph::new("diamond");
    g.add_node(
        ResourceNode::new("app", "App")
            .with_property("db", PropertyValue::reference("db", "endpoint"))
            .with_property("cache", PropertyValue::reference("cache", "endpoint")),
    )
    .unwrap();
    g.add_node(ResourceNode::new("db", "Db").with_property("vpc", PropertyValue::reference("vpc", "id")))
        .unwrap();
    g.add_node(ResourceNode::new("cache", "Cache").with_property("vpc", PropertyValue::reference("vpc", "id")))
        .unwrap();
    g.add_node(ResourceNode::new("vpc", "Vpc")).unwrap();

    let order = g.validate().unwrap();
    assert_eq!(order.len(), 4);
    let pos = |id: &str| order.iter().position(|o| o.as_str() == id).unwrap();
    for node in g.nodes() {
        for dep in node.dependencies() {
            assert!(pos(dep.as_str()) < pos(node.id().as_str()), "{} before {}", dep, node.id());
        }
    }
    assert_eq!(g.order(), order.as_slice());
}

#[test]
fn two_node_cycle_names_both() {
    let mut g = StackGraph::new("cycle");
    g.add_node(ResourceNode::new("A", "T").with_property("b", PropertyValue::reference("B", "out")))
        .unwrap();
    g.add_node(ResourceNode::new("B", "T").with_property("a", PropertyValue::reference("A", "out")))
        .unwrap();
    let err = g.validate().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CyclicDependency);
    match err {
        Error::CyclicDependency { nodes } => {
            assert!(nodes.contains(&"A".to_string()));
            assert!(nodes.contains(&"B".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn cycle_members(g: &mut StackGraph) -> Vec<String> {
    match g.validate().unwrap_err() {
        Error::CyclicDependency { nodes } => nodes,
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn chain_hanging_off_a_cycle_is_not_named() {
    let mut g = StackGraph::new("cycle");
    g.add_node(ResourceNode::new("a", "T").with_property("x", PropertyValue::reference("b", "x")))
        .unwrap();
    g.add_node(ResourceNode::new("b", "T").with_property("x", PropertyValue::reference("a", "x")))
        .unwrap();
    g.add_node(ResourceNode::new("c", "T").with_property("x", PropertyValue::reference("a", "x")))
        .unwrap();
    g.add_node(ResourceNode::new("d", "T").with_property("x", PropertyValue::reference("c", "x")))
        .unwrap();
    assert_eq!(cycle_members(&mut g), vec!["a", "b"]);
    assert_eq!(g.state(), StackState::Building);
}

#[test]
fn node_between_two_cycles_is_not_named() {
    let mut g = StackGraph::new("cycles");
    g.add_node(ResourceNode::new("a", "T").with_property("x", PropertyValue::reference("b", "x")))
        .unwrap();
    g.add_node(ResourceNode::new("b", "T").with_property("x", PropertyValue::reference("a", "x")))
        .unwrap();
    g.add_node(ResourceNode::new("bridge", "T").with_property("x", PropertyValue::reference("b", "x")))
        .unwrap();
    g.add_node(
        ResourceNode::new("c", "T")
            .with_property("x", PropertyValue::reference("d", "x"))
            .with_property("y", PropertyValue::reference("bridge", "x")),
    )
    .unwrap();
    g.add_node(ResourceNode::new("d", "T").with_property("x", PropertyValue::reference("c", "x")))
        .unwrap();
    assert_eq!(cycle_members(&mut g), vec!["a", "b", "c", "d"]);
}

#[test]
fn duplicate_ids_and_names_rejected() {
    let mut g = StackGraph::new("dup");
    g.add_node(ResourceNode::new("a", "T")).unwrap();
    assert_eq!(g.add_node(ResourceNode::new("a", "U")).unwrap_err().kind(), ErrorKind::Validation);
    g.add_identity(exec_role()).unwrap();
    assert_eq!(g.add_identity(exec_role()).unwrap_err().kind(), ErrorKind::Validation);
}

#[test]
fn reference_to_unknown_resource_fails_validation() {
    let mut g = StackGraph::new("dangling");
    g.add_node(ResourceNode::new("profile", "UserProfile").with_property("domain_id", PropertyValue::reference("domain", "domain_id")))
        .unwrap();
    assert_eq!(g.validate().unwrap_err().kind(), ErrorKind::Validation);
}

#[test]
fn role_requires_finalized_identity() {
    let mut g = StackGraph::new("roles");
    let mut role = Identity::new("exec-role");
    role.add_trust_principal("service-x").unwrap();
    g.add_identity(role).unwrap();
    g.add_node(ResourceNode::new("domain", "Domain").with_property("execution_role", PropertyValue::role("exec-role")))
        .unwrap();
    assert_eq!(g.validate().unwrap_err().kind(), ErrorKind::Configuration);
}

#[test]
fn role_requires_known_identity() {
    let mut g = StackGraph::new("roles");
    g.add_node(ResourceNode::new("domain", "Domain").with_property("execution_role", PropertyValue::role("ghost")))
        .unwrap();
    assert_eq!(g.validate().unwrap_err().kind(), ErrorKind::Validation);
}

// ===========================================================================
// End-to-end scenarios
// ===========================================================================

#[tokio::test]
async fn domain_and_profile_outputs() {
    let mut g = StackGraph::new("studio");
    g.add_identity(exec_role()).unwrap();
    g.add_node(ResourceNode::new("domain", "Domain").with_property("execution_role", "exec-role.arn-placeholder"))
        .unwrap();
    g.add_node(
        ResourceNode::new("profile", "UserProfile")
            .with_property("domain_id", PropertyValue::reference("domain", "domain_id"))
            .with_property("user_profile_name", "default-user"),
    )
    .unwrap();
    g.add_output("DomainId", OutputValue::reference("domain", "domain_id")).unwrap();
    g.add_output("ProfileDomainId", OutputValue::reference("profile", "domain_id")).unwrap();

    g.validate().unwrap();
    let effect = FnEffect::new(|id, kind, _| {
        if kind == "Domain" {
            Ok(attrs(&[("domain_id", "d-123")]))
        } else {
            assert_eq!(id.as_str(), "profile");
            Ok(Attributes::new())
        }
    });
    g.resolve_all(&effect).await.unwrap();
    assert_eq!(g.state(), StackState::Resolved);

    let outputs = g.compute_outputs().unwrap();
    assert_eq!(outputs["DomainId"], json!("d-123"));
    assert_eq!(outputs["ProfileDomainId"], json!("d-123"));
    assert_eq!(g.report().outcome, Outcome::Success);
}

#[tokio::test]
async fn independent_nodes_both_resolve() {
    let mut g = StackGraph::new("pair");
    g.add_node(ResourceNode::new("left", "T")).unwrap();
    g.add_node(ResourceNode::new("right", "T")).unwrap();
    let order = g.validate().unwrap();
    assert_eq!(order.len(), 2);

    let log = Arc::new(Mutex::new(Vec::new()));
    g.resolve_all(&recording_effect(log.clone(), attrs(&[("id", "x")])))
        .await
        .unwrap();
    assert_eq!(log.lock().unwrap().len(), 2);
    assert!(g.pending_ids().is_empty());
    assert_eq!(g.resolved_ids().len(), 2);
}

#[tokio::test]
async fn failure_halts_resolution() {
    let mut g = StackGraph::new("halt");
    g.add_node(ResourceNode::new("first", "T")).unwrap();
    g.add_node(ResourceNode::new("second", "T").with_property("a", PropertyValue::reference("first", "id")))
        .unwrap();
    g.add_node(ResourceNode::new("third", "T").with_property("b", PropertyValue::reference("second", "id")))
        .unwrap();
    g.add_output("FirstId", OutputValue::reference("first", "id")).unwrap();
    g.add_output("ThirdId", OutputValue::reference("third", "id")).unwrap();
    g.validate().unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let effect = FnEffect::new(move |_, _, _| {
        if counter.fetch_add(1, Ordering::SeqCst) == 1 {
            Err(ProvisioningFailure::new("throttled"))
        } else {
            Ok(attrs(&[("id", "generated")]))
        }
    });

    let err = g.resolve_all(&effect).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Provisioning);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(g.node("first").unwrap().is_resolved());
    assert!(!g.node("second").unwrap().is_resolved());
    assert!(!g.node("third").unwrap().is_resolved());
    assert_eq!(g.state(), StackState::Resolving);

    let err = g.compute_outputs().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnresolvedDependency);
    assert!(err.to_string().contains("third"));

    let report = g.report();
    assert_eq!(report.outcome, Outcome::Failure);
    assert_eq!(report.nodes["first"].status, NodeState::Resolved);
    assert_eq!(report.nodes["second"].status, NodeState::Failed);
    assert_eq!(report.nodes["third"].status, NodeState::Pending);

    // no retry from a halted graph
    assert_eq!(g.resolve_all(&effect).await.unwrap_err().kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn output_naming_absent_node_is_unresolved() {
    let mut g = StackGraph::new("ghost");
    g.add_node(ResourceNode::new("real", "T")).unwrap();
    g.add_output("Ghost", OutputValue::reference("ghost", "id")).unwrap();
    g.validate().unwrap();
    g.resolve_all(&FnEffect::new(|_, _, _| Ok(Attributes::new())))
        .await
        .unwrap();
    assert_eq!(g.compute_outputs().unwrap_err().kind(), ErrorKind::UnresolvedDependency);
}

#[tokio::test]
async fn exports_and_literals() {
    let mut g = StackGraph::new("ep");
    g.add_node(ResourceNode::new("endpoint", "SageMaker::Endpoint").with_property("endpoint_name", "llama2-endpoint-1234567"))
        .unwrap();
    g.add_exported_output(
        "LLMEndpointName",
        OutputValue::reference("endpoint", "endpoint_name"),
        "ep-LLMEndpointName",
    )
    .unwrap();
    g.add_output("Region", OutputValue::literal("us-east-1")).unwrap();
    g.validate().unwrap();
    let effect = SimulatedEffect::new("us-east-1", "111122223333", SeededNames::default());
    g.resolve_all(&effect).await.unwrap();

    let outputs = g.compute_outputs().unwrap();
    assert_eq!(outputs["Region"], json!("us-east-1"));
    let exports = g.compute_exports().unwrap();
    assert_eq!(exports.len(), 1);
    assert_eq!(exports["ep-LLMEndpointName"], json!("llama2-endpoint-1234567"));
    let arn = g.node("endpoint").unwrap().attribute("arn").unwrap();
    assert!(arn.as_str().unwrap().ends_with("endpoint/llama2-endpoint-1234567"));
}

#[tokio::test]
async fn execution_role_resolves_to_qualified_name() {
    let mut g = StackGraph::new("roles");
    g.add_identity(exec_role()).unwrap();
    g.add_node(ResourceNode::new("domain", "Domain").with_property("execution_role", PropertyValue::role("exec-role")))
        .unwrap();
    g.validate().unwrap();
    let seen: Arc<Mutex<Option<serde_json::Value>>> = Arc::new(Mutex::new(None));
    let sink = seen.clone();
    let effect = FnEffect::new(move |_, _, props| {
        *sink.lock().unwrap() = props.get("execution_role").cloned();
        Ok(Attributes::new())
    });
    g.resolve_all(&effect).await.unwrap();
    assert_eq!(*seen.lock().unwrap(), Some(json!("/exec-role")));
}

#[tokio::test]
async fn journaled_resolution_writes_one_line_per_node() {
    let tmp = tempfile::tempdir().unwrap();
    let journal = tmp.path().join("journal.jsonl");
    let mut g = StackGraph::new("journal");
    g.add_node(ResourceNode::new("a", "T")).unwrap();
    g.add_node(ResourceNode::new("b", "T").with_property("x", PropertyValue::reference("a", "id")))
        .unwrap();
    g.validate().unwrap();
    let effect = JournalingEffect::new(
        FnEffect::new(|_, _, _| Ok(attrs(&[("id", "1")]))),
        &journal,
    );
    g.resolve_all(&effect).await.unwrap();

    let lines: Vec<String> = std::fs::read_to_string(&journal)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("\"resource\":\"a\""));
    assert!(lines[1].contains("\"resource\":\"b\""));

    let report_path = tmp.path().join("report.yaml");
    g.report().write(&report_path).unwrap();
    let yaml = std::fs::read_to_string(report_path).unwrap();
    assert!(yaml.contains("success"));
}

#[test]
fn resource_id_lookup_by_str() {
    let mut g = StackGraph::new("lookup");
    g.add_node(ResourceNode::new("a", "T")).unwrap();
    let id: ResourceId = "a".into();
    assert_eq!(g.node(id.as_str()).unwrap().kind(), "T");
    assert!(g.node("missing").is_none());
}

#[tokio::test]
async fn journal_keeps_every_line_in_resolution_order() {
    let tmp = tempfile::tempdir().unwrap();
    let journal = tmp.path().join("chain.jsonl");
    let mut g = StackGraph::new("chain");
    // Declared last-first so the journal order can only come from the topological walk.
    for i in (0..25).rev() {
        let mut node = ResourceNode::new(format!("n{i:02}"), "T");
        if i > 0 {
            node = node.with_property("prev", PropertyValue::reference(format!("n{:02}", i - 1), "id"));
        }
        g.add_node(node).unwrap();
    }
    g.validate().unwrap();
    let effect = JournalingEffect::new(
        FnEffect::new(|id, _, _| Ok(attrs(&[("id", id.as_str())]))),
        &journal,
    );
    g.resolve_all(&effect).await.unwrap();

    let resources: Vec<String> = std::fs::read_to_string(&journal)
        .unwrap()
        .lines()
        .map(|l| {
            let event: serde_json::Value = serde_json::from_str(l).unwrap();
            assert_eq!(event["event"], "provisioned");
            event["resource"].as_str().unwrap().to_string()
        })
        .collect();
    let expected: Vec<String> = (0..25).map(|i| format!("n{i:02}")).collect();
    assert_eq!(resources, expected);
}

#[tokio::test]
async fn execution_role_resolves_to_arn_with_environment() {
    let mut g = StackGraph::new("roles").with_environment("aws", "111122223333");
    g.add_identity(exec_role()).unwrap();
    g.add_node(ResourceNode::new("domain", "Domain").with_property("execution_role", PropertyValue::role("exec-role")))
        .unwrap();
    g.validate().unwrap();
    g.resolve_all(&FnEffect::new(|_, _, _| Ok(Attributes::new())))
        .await
        .unwrap();
    assert_eq!(
        g.node("domain").unwrap().attribute("execution_role").unwrap(),
        &json!("arn:aws:iam::111122223333:role/exec-role")
    );
}
