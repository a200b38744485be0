use crate::serve::{AppState, parse_mermaid};
use crate::{CliError, Command, parse_args};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use flowscene::{RenderEngine, RenderError, SvgEngine, VisualTree};
use std::sync::Arc;
use std::time::Duration;

const BROWSER_VM_MMD: &str = include_str!("../../../fixtures/flowchart/browser_vm.mmd");
const BROWSER_VM_SVG: &str = include_str!("../../../fixtures/flowchart/browser_vm.svg");

fn argv(args: &[&str]) -> Vec<String> {
    std::iter::once("flowscene")
        .chain(args.iter().copied())
        .map(str::to_string)
        .collect()
}

struct SlowEngine;

impl RenderEngine for SlowEngine {
    fn render(&self, _source: &str) -> Result<VisualTree, RenderError> {
        std::thread::sleep(Duration::from_millis(500));
        Ok(VisualTree::default())
    }
}

struct BrokenEngine;

impl RenderEngine for BrokenEngine {
    fn render(&self, _source: &str) -> Result<VisualTree, RenderError> {
        Err(RenderError::Engine {
            message: "Parse error on line 1".to_string(),
        })
    }
}

fn state(engine: impl RenderEngine + Send + Sync + 'static) -> State<AppState> {
    State(AppState::new(Arc::new(engine), Duration::from_secs(5)))
}

fn body(value: serde_json::Value) -> Bytes {
    Bytes::from(serde_json::to_vec(&value).unwrap())
}

#[test]
fn parse_args_defaults_to_reconcile_from_stdin() {
    let args = parse_args(&argv(&[])).unwrap();
    assert!(matches!(args.command, Command::Reconcile));
    assert_eq!(args.input, None);
    assert!(!args.pretty);
}

#[test]
fn parse_args_reads_flags_and_input() {
    let args = parse_args(&argv(&[
        "visual",
        "--pretty",
        "--svg",
        "out.svg",
        "--timeout-ms",
        "1500",
        "--node-cwd",
        "tools/mermaid",
        "diagram.mmd",
    ]))
    .unwrap();
    assert!(matches!(args.command, Command::Visual));
    assert!(args.pretty);
    assert_eq!(args.svg.as_deref(), Some("out.svg"));
    assert_eq!(args.timeout_ms, Some(1500));
    assert_eq!(args.node_cwd.as_deref(), Some("tools/mermaid"));
    assert_eq!(args.input.as_deref(), Some("diagram.mmd"));

    let args = parse_args(&argv(&["serve", "--port", "8080"])).unwrap();
    assert!(matches!(args.command, Command::Serve));
    assert_eq!(args.port, Some(8080));
}

#[test]
fn parse_args_rejects_bad_usage() {
    for bad in [
        &["--svg"][..],
        &["--timeout-ms", "0"],
        &["--timeout-ms", "soon"],
        &["--port", "99999"],
        &["--verbose"],
        &["a.mmd", "b.mmd"],
        &["--help"],
    ] {
        assert!(
            matches!(parse_args(&argv(bad)), Err(CliError::Usage(_))),
            "{bad:?}"
        );
    }
}

#[tokio::test]
async fn endpoint_returns_scene() {
    let res = parse_mermaid(
        state(SvgEngine::new(BROWSER_VM_SVG)),
        body(serde_json::json!({ "code": BROWSER_VM_MMD })),
    )
    .await
    .unwrap();
    let scene = res.0;
    assert_eq!(scene.nodes.len(), 2);
    assert_eq!(scene.edges[0].label.as_deref(), Some("request"));
    assert_eq!(scene.class_defs.len(), 2);
}

#[tokio::test]
async fn endpoint_rejects_missing_code() {
    for raw in [
        body(serde_json::json!({})),
        body(serde_json::json!({ "code": "   " })),
        body(serde_json::json!({ "code": 42 })),
        Bytes::from_static(b"not json"),
        Bytes::new(),
    ] {
        let err = parse_mermaid(state(SvgEngine::new(BROWSER_VM_SVG)), raw)
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "No Mermaid code provided");
    }
}

#[tokio::test]
async fn endpoint_maps_render_failure_to_500() {
    let err = parse_mermaid(
        state(BrokenEngine),
        body(serde_json::json!({ "code": "flowchart LR\nA --> B" })),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err.message, "Failed to parse Mermaid code");
}

#[tokio::test]
async fn endpoint_gives_up_at_the_request_deadline() {
    let state = State(AppState::new(Arc::new(SlowEngine), Duration::from_millis(50)));
    let err = parse_mermaid(state, body(serde_json::json!({ "code": "A --> B" })))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
}
