use automation_model::{
    AssembledMessage, EnvValue, EnvVariable, Role, StepFile, StepStatus, VariableSource,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use stepwright::{
    OperationKey, PlaceholderRule, ReconcileOutcome, StepReconciler, ToolAction, Workspace,
};

fn tool_message(id: &str, body: Value) -> AssembledMessage {
    let mut message = AssembledMessage::new(id, Role::Tool);
    message.content = body.to_string().into();
    message.tool_call_id = Some(format!("call-{id}"));
    message
}

fn variable(name: &str) -> EnvVariable {
    EnvVariable {
        id: format!("var-{name}"),
        name: name.to_owned(),
        value: EnvValue::Scalar("secret".to_owned()),
        source: VariableSource::User,
    }
}

#[test]
fn reconcile_create_then_update_yields_one_ready_step() {
    let mut workspace = Workspace::default();
    let mut reconciler = StepReconciler::default();

    let created = reconciler.reconcile(
        &tool_message("t1", json!({"action": "create-step", "id": "s1", "name": "Fetch"})),
        &mut workspace,
    );
    assert_eq!(
        created,
        ReconcileOutcome::Created {
            step_id: "s1".to_owned(),
            position: 0
        }
    );

    let updated = reconciler.reconcile(
        &tool_message(
            "t2",
            json!({"action": "update-step-code", "stepId": "s1", "code": "console.log(1)"}),
        ),
        &mut workspace,
    );
    assert!(updated.mutated());

    assert_eq!(
        workspace.steps,
        vec![StepFile {
            id: "s1".to_owned(),
            name: "Fetch".to_owned(),
            code: "console.log(1)".to_owned(),
            status: StepStatus::Ready,
            order: 1,
            environment_variables_used: Vec::new(),
        }]
    );
}

#[test]
fn reconcile_applies_each_tool_response_once() {
    let mut workspace = Workspace::default();
    let mut reconciler = StepReconciler::default();
    reconciler.reconcile(
        &tool_message("t1", json!({"action": "create-step", "id": "s1"})),
        &mut workspace,
    );
    let update = tool_message(
        "t2",
        json!({"action": "update-step-code", "stepId": "s1", "code": "a()"}),
    );

    assert!(reconciler.reconcile(&update, &mut workspace).mutated());
    workspace.steps[0].code = "edited by user".to_owned();

    let replay = reconciler.reconcile(&update, &mut workspace);
    let key = OperationKey::new("update-step", "s1", "t2");
    assert_eq!(replay, ReconcileOutcome::AlreadyApplied(key.clone()));
    assert!(reconciler.is_applied(&key));
    assert_eq!(workspace.steps[0].code, "edited by user");
}

#[test]
fn reconcile_distinct_responses_for_same_step_both_apply() {
    let mut workspace = Workspace::default();
    let mut reconciler = StepReconciler::default();
    reconciler.reconcile(
        &tool_message("t1", json!({"action": "create-step", "id": "s1"})),
        &mut workspace,
    );

    for (id, code) in [("t2", "v1()"), ("t3", "v2()")] {
        reconciler.reconcile(
            &tool_message(id, json!({"action": "update-step", "stepId": "s1", "code": code})),
            &mut workspace,
        );
    }

    assert_eq!(workspace.steps[0].code, "v2()");
}

#[test]
fn reconcile_rejects_placeholder_code_and_keeps_existing_code() {
    let mut workspace = Workspace::default();
    let mut reconciler = StepReconciler::default();
    reconciler.reconcile(
        &tool_message("t1", json!({"action": "create-step", "id": "s1"})),
        &mut workspace,
    );
    reconciler.reconcile(
        &tool_message(
            "t2",
            json!({"action": "update-step-code", "stepId": "s1", "code": "a();\nb();"}),
        ),
        &mut workspace,
    );

    let outcome = reconciler.reconcile(
        &tool_message(
            "t3",
            json!({
                "action": "update-step-code",
                "stepId": "s1",
                "code": "a();\n// ... rest of code unchanged"
            }),
        ),
        &mut workspace,
    );

    assert_eq!(
        outcome,
        ReconcileOutcome::PlaceholderRejected {
            step_id: "s1".to_owned(),
            rule: PlaceholderRule::EllipsisQualifier,
        }
    );
    assert!(!outcome.mutated());
    assert_eq!(workspace.steps[0].code, "a();\nb();");
}

#[test]
fn reconcile_delete_removes_variables_only_it_referenced() {
    let mut workspace = Workspace {
        variables: vec![variable("API_KEY"), variable("BASE_URL")],
        ..Workspace::default()
    };
    let mut fetch = StepFile::pending("s1", "Fetch");
    fetch.environment_variables_used = vec!["API_KEY".to_owned(), "BASE_URL".to_owned()];
    let mut post = StepFile::pending("s2", "Post");
    post.environment_variables_used = vec!["BASE_URL".to_owned()];
    workspace.steps = vec![fetch, post];
    workspace.renumber();
    let mut reconciler = StepReconciler::with_steps(&workspace.steps);

    let outcome = reconciler.reconcile(
        &tool_message("t1", json!({"action": "delete-step", "stepId": "s1"})),
        &mut workspace,
    );

    match outcome {
        ReconcileOutcome::Deleted {
            step,
            removed_variables,
        } => {
            assert_eq!(step.id, "s1");
            assert_eq!(removed_variables, vec!["API_KEY".to_owned()]);
        }
        other => panic!("expected deletion, got {other:?}"),
    }
    let names: Vec<&str> = workspace
        .variables
        .iter()
        .map(|variable| variable.name.as_str())
        .collect();
    assert_eq!(names, vec!["BASE_URL"]);
    assert_eq!(workspace.steps.len(), 1);
    assert_eq!(workspace.steps[0].order, 1);
}

#[test]
fn reconcile_ignores_unrelated_and_incomplete_tool_text() {
    let mut workspace = Workspace::default();
    let mut reconciler = StepReconciler::default();

    let mut partial = AssembledMessage::new("t1", Role::Tool);
    partial.content = r#"{"action":"create-step","id":"s"#.into();
    assert_eq!(
        reconciler.reconcile(&partial, &mut workspace),
        ReconcileOutcome::Ignored
    );

    let mut ai = AssembledMessage::new("m1", Role::Ai);
    ai.content = json!({"action": "create-step", "id": "s1"}).to_string().into();
    assert_eq!(reconciler.reconcile(&ai, &mut workspace), ReconcileOutcome::Ignored);

    assert_eq!(
        reconciler.reconcile(
            &tool_message("t2", json!({"action": "update-step", "stepId": "ghost", "code": "x"})),
            &mut workspace
        ),
        ReconcileOutcome::MissingStep {
            step_id: "ghost".to_owned()
        }
    );
    assert!(workspace.steps.is_empty());
}

#[test]
fn reconcile_update_caches_names_and_queues_dependencies() {
    let mut workspace = Workspace::default();
    let mut reconciler = StepReconciler::default();
    reconciler.apply(
        ToolAction::CreateStep {
            step_id: "s1".to_owned(),
            index: None,
            name: None,
        },
        &mut workspace,
    );

    reconciler.reconcile(
        &tool_message(
            "t1",
            json!({
                "action": "update-step",
                "stepId": "s1",
                "name": "Notify",
                "code": "notify()",
                "environmentVariablesUsed": ["SLACK_TOKEN"],
                "dependencies": ["@slack/web-api", {"name": "zod", "version": "3.23.0"}]
            }),
        ),
        &mut workspace,
    );

    assert_eq!(reconciler.display_name("s1", &workspace), Some("Notify"));
    assert_eq!(workspace.steps[0].environment_variables_used, vec!["SLACK_TOKEN".to_owned()]);
    let dependencies = reconciler.take_dependencies();
    assert_eq!(dependencies.len(), 2);
    assert_eq!(dependencies[0].version, "latest");
    assert_eq!(dependencies[1].version, "3.23.0");
    assert!(reconciler.take_dependencies().is_empty());
}
