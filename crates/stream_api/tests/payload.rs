use automation_model::{Dependency, EnvValue, EnvVariable, StepFile, VariableSource};
use pretty_assertions::assert_eq;
use serde_json::json;
use stream_api::{ChatRequest, CommitBody, CommitFile, CommitPayload, ImageAttachment};

#[test]
fn payload_chat_request_serializes_camel_case_without_images() {
    let request = ChatRequest::new("auto-1", "add a login step", "default")
        .with_step_id("s1")
        .with_current_code("console.log(1)")
        .with_version(Some(4))
        .with_image(ImageAttachment {
            file_name: "shot.png".to_owned(),
            mime_type: "image/png".to_owned(),
            bytes: vec![1, 2, 3],
        });

    assert!(request.has_attachments());
    assert_eq!(
        serde_json::to_value(&request).expect("serialize"),
        json!({
            "automationId": "auto-1",
            "stepId": "s1",
            "message": "add a login step",
            "model": "default",
            "currentCode": "console.log(1)",
            "version": 4
        })
    );
}

#[test]
fn payload_form_fields_mirror_json_names() {
    let request = ChatRequest::new("auto-1", "hi", "default");
    let names: Vec<&str> = request.form_fields().iter().map(|(name, _)| *name).collect();
    assert_eq!(names, vec!["automationId", "message", "model", "currentCode"]);
}

#[test]
fn payload_commit_flattens_files_or_code() {
    let mut step = StepFile::pending("s1", "Login");
    step.code = "await login();".to_owned();

    let payload = CommitPayload {
        automation_id: "auto-1".to_owned(),
        body: CommitBody::Files(vec![CommitFile::from(&step)]),
        dependencies: vec![Dependency::latest("axios")],
        environment_variables: vec![EnvVariable {
            id: "v1".to_owned(),
            name: "API_KEY".to_owned(),
            value: EnvValue::Scalar("k".to_owned()),
            source: VariableSource::Ai,
        }],
        change_description: "AI update".to_owned(),
    };

    assert_eq!(
        serde_json::to_value(&payload).expect("serialize"),
        json!({
            "automationId": "auto-1",
            "files": [{"id": "s1", "name": "Login", "code": "await login();", "order": 0}],
            "dependencies": [{"name": "axios", "version": "latest"}],
            "environmentVariables": [{"id": "v1", "name": "API_KEY", "value": "k", "source": "ai"}],
            "changeDescription": "AI update"
        })
    );

    let single = CommitPayload {
        body: CommitBody::Code("main();".to_owned()),
        ..payload
    };
    let value = serde_json::to_value(&single).expect("serialize");
    assert_eq!(value["code"], json!("main();"));
    assert!(value.get("files").is_none());
}
