//! Tests for stackgraph-policy: composing documents onto an execution identity

use stackgraph_policy::*;

// ===========================================================================
// Documents
// ===========================================================================

fn s3_access() -> CapabilityDocument {
    CapabilityDocument::from_statements([CapabilityStatement::allow(
        ["s3:GetObject", "s3:PutObject", "s3:DeleteObject", "s3:ListBucket"],
        ["arn:aws:s3:::*"],
    )
    .unwrap()])
    .unwrap()
}

fn custom_access() -> CapabilityDocument {
    let mut doc = CapabilityDocument::new();
    doc.add_statement(
        CapabilityStatement::allow(["es:ESHttp*"], ["arn:aws:es:us-east-1:111122223333:domain/*"])
            .unwrap()
            .with_sid("ReadFromOpenSearch")
            .unwrap(),
    )
    .unwrap();
    doc.add_statement(
        CapabilityStatement::allow(
            ["secretsmanager:GetSecretValue"],
            ["arn:aws:secretsmanager:us-east-1:111122223333:secret:*"],
        )
        .unwrap()
        .with_sid("ReadSecretFromSecretsManager")
        .unwrap(),
    )
    .unwrap();
    doc
}

#[test]
fn merge_of_disjoint_sids_is_concatenation() {
    let a = s3_access();
    let b = custom_access();
    let merged = a.merge(&b).unwrap();
    assert_eq!(merged.len(), a.len() + b.len());
    assert_eq!(&merged.statements()[..a.len()], a.statements());
    assert_eq!(&merged.statements()[a.len()..], b.statements());
}

#[test]
fn merge_with_self_collides_on_sids() {
    let b = custom_access();
    let err = b.merge(&b).unwrap_err();
    assert_eq!(err.kind(), stackgraph_core::ErrorKind::Validation);
}

#[test]
fn sids_are_collected() {
    let doc = custom_access();
    let sids = doc.sids();
    assert!(sids.contains("ReadFromOpenSearch"));
    assert!(sids.contains("ReadSecretFromSecretsManager"));
}

// ===========================================================================
// Identity
// ===========================================================================

#[test]
fn execution_identity_end_to_end() {
    let mut role = Identity::new("exec-role");
    role.add_trust_principal("sagemaker.amazonaws.com").unwrap();
    role.add_trust_principal("codebuild.amazonaws.com").unwrap();
    role.attach_inline_document("execution", &s3_access()).unwrap();
    role.attach_inline_document("custom", &custom_access()).unwrap();
    role.attach_managed_capability("AmazonSageMakerFullAccess").unwrap();
    assert!(!role.attach_managed_capability("AmazonSageMakerFullAccess").unwrap());
    role.finalize().unwrap();

    assert_eq!(role.inline_documents().len(), 2);
    assert_eq!(role.managed_capability_refs().len(), 1);
    assert!(role
        .evaluate("es:ESHttpGet", "arn:aws:es:us-east-1:111122223333:domain/rag")
        .is_allowed());
    assert!(!role.evaluate("es:ESHttpGet", "arn:aws:es:eu-west-1:111122223333:domain/rag").is_allowed());

    let json = serde_json::to_value(&role).unwrap();
    assert_eq!(json["name"], "exec-role");
    assert_eq!(json["path"], "/");
    assert_eq!(json["inline_documents"]["custom"]["Statement"].as_array().unwrap().len(), 2);
}

#[test]
fn lint_runs_over_attached_documents() {
    let mut role = Identity::new("builder");
    let doc = CapabilityDocument::from_statements([
        CapabilityStatement::allow(["iam:GetRole", "iam:ListRoles"], ["*"]).unwrap(),
    ])
    .unwrap();
    role.attach_inline_document("build", &doc).unwrap();
    let findings: Vec<_> = role
        .inline_documents()
        .values()
        .flat_map(lint)
        .collect();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].kind, FindingKind::WildcardResource);
}
