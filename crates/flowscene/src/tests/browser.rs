use crate::browser::{
    BrowserEngine, BrowserOptions, ENV_BROWSER_EXE, ENV_PROCESS_TIMEOUT_MS,
    ENV_READY_TIMEOUT_MS,
};
use crate::*;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn default_options() {
    let o = BrowserOptions::default();
    assert_eq!(o.program, PathBuf::from("node"));
    assert_eq!(o.ready_timeout, Duration::from_millis(10_000));
    assert_eq!(o.poll_interval, Duration::from_millis(100));
    assert_eq!(o.stable_samples, 2);
    assert_eq!(o.max_settle, Duration::from_millis(3_000));
    assert_eq!(o.process_timeout, Duration::from_millis(30_000));
    assert_eq!(o.browser_exe, None);
    assert_eq!(o.mermaid_url, None);
}

#[test]
fn lookup_overrides_defaults() {
    let o = BrowserOptions::from_lookup(|key| match key {
        ENV_BROWSER_EXE => Some("/opt/chrome/chrome".to_string()),
        ENV_READY_TIMEOUT_MS => Some(" 2500 ".to_string()),
        ENV_PROCESS_TIMEOUT_MS => Some("not a number".to_string()),
        _ => None,
    });
    assert_eq!(o.browser_exe, Some(PathBuf::from("/opt/chrome/chrome")));
    assert_eq!(o.ready_timeout, Duration::from_millis(2_500));
    assert_eq!(o.process_timeout, Duration::from_millis(30_000));
    assert_eq!(o.mermaid_url, None);
}

#[test]
fn blank_lookup_values_are_ignored() {
    let o = BrowserOptions::from_lookup(|_| Some("  ".to_string()));
    assert_eq!(o, BrowserOptions::default());
}

#[test]
fn missing_program_is_a_spawn_error() {
    let engine = BrowserEngine::new(
        BrowserOptions::default().with_program("/nonexistent/flowscene-test-node"),
    );
    let err = engine.render("flowchart LR\nA-->B").unwrap_err();
    assert!(matches!(err, RenderError::Spawn { .. }), "{err:?}");
}

#[cfg(unix)]
fn sh_engine(script: &str) -> BrowserEngine {
    BrowserEngine::new(
        BrowserOptions::default()
            .with_program("sh")
            .with_node_args(["-c", script, "flowscene"])
            .with_process_timeout(Duration::from_secs(20)),
    )
}

/// Runs a stand-in that echoes its stdin to stderr and fails, returning the decoded page input.
#[cfg(unix)]
fn echoed_page_input(options: BrowserOptions) -> serde_json::Value {
    let engine = BrowserEngine::new(
        options
            .with_program("sh")
            .with_node_args(["-c", "cat >&2; echo >&2; exit 1", "flowscene"]),
    );
    match engine.render("flowchart LR\nA --> B").unwrap_err() {
        RenderError::Engine { message } => serde_json::from_str(&message).unwrap(),
        other => panic!("unexpected error {other:?}"),
    }
}

#[cfg(unix)]
#[test]
fn page_input_carries_settings_in_camel_case() {
    let options = BrowserOptions {
        stable_samples: 0,
        ..BrowserOptions::default()
    }
    .with_browser_exe("/opt/chrome/chrome")
    .with_ready_timeout(Duration::from_millis(2_500))
    .with_process_timeout(Duration::from_secs(20));
    assert_eq!(
        echoed_page_input(options),
        json!({
            "code": "flowchart LR\nA --> B",
            "browserExe": "/opt/chrome/chrome",
            "mermaidUrl": null,
            "readyTimeoutMs": 2500,
            "pollIntervalMs": 100,
            "stableSamples": 1,
            "maxSettleMs": 3000,
            "watchdogMs": 19000,
        })
    );
}

#[cfg(unix)]
#[test]
fn short_process_timeout_keeps_half_for_the_watchdog() {
    let input = echoed_page_input(
        BrowserOptions::default().with_process_timeout(Duration::from_millis(600)),
    );
    assert_eq!(input["watchdogMs"], json!(300));
}

#[cfg(unix)]
#[test]
fn wire_output_is_normalized() {
    let engine = sh_engine(
        r#"cat >/dev/null; printf '%s\n' '{"nodes":[{"id":"flowchart-A-0","fragments":[" Alpha "],"classList":["node"],"bbox":{"x":1,"y":2,"width":3,"height":4}}],"edges":[{"id":"L_A_A_0","fragments":[],"d":"M0,0L5,5"}]}'"#,
    );
    let tree = engine.render("A --> A").unwrap();
    assert_eq!(tree.nodes[0].label.as_deref(), Some("Alpha"));
    assert_eq!(tree.nodes[0].bbox, Some(BBox::new(1.0, 2.0, 3.0, 4.0)));
    assert_eq!(
        tree.edges[0].path,
        Some(PathEnds { x1: 0.0, y1: 0.0, x2: 5.0, y2: 5.0 })
    );

    let scene = Reconciler::new(engine).reconcile("A --> A").unwrap();
    assert_eq!(scene.nodes[0].visual_id.as_deref(), Some("flowchart-A-0"));
    assert_eq!(scene.edges[0].visual_id.as_deref(), Some("L_A_A_0"));
}

#[cfg(unix)]
#[test]
fn not_ready_exit_code_is_a_timeout() {
    let engine = sh_engine("cat >/dev/null; exit 3");
    let err = engine.render("A").unwrap_err();
    assert!(
        matches!(err, RenderError::Timeout { waited_ms: 10_000 }),
        "{err:?}"
    );
}

#[cfg(unix)]
#[test]
fn watchdog_exit_code_is_a_timeout_of_the_elapsed_time() {
    let engine = sh_engine("cat >/dev/null; exit 4");
    let err = engine.render("A").unwrap_err();
    assert!(
        matches!(err, RenderError::Timeout { waited_ms } if waited_ms < 10_000),
        "{err:?}"
    );
}

#[cfg(unix)]
#[test]
fn failing_script_reports_its_last_stderr_line() {
    let engine = sh_engine(
        "cat >/dev/null; echo starting >&2; echo 'Parse error on line 2' >&2; exit 1",
    );
    match engine.render("A").unwrap_err() {
        RenderError::Engine { message } => assert_eq!(message, "Parse error on line 2"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[cfg(unix)]
#[test]
fn garbage_output_is_invalid() {
    let engine = sh_engine("cat >/dev/null; echo 'not json'");
    assert!(matches!(
        engine.render("A").unwrap_err(),
        RenderError::InvalidOutput { .. }
    ));

    let engine = sh_engine("cat >/dev/null");
    assert!(matches!(
        engine.render("A").unwrap_err(),
        RenderError::InvalidOutput { .. }
    ));
}

#[cfg(unix)]
#[test]
fn hung_process_is_killed_at_the_deadline() {
    let engine = BrowserEngine::new(
        BrowserOptions::default()
            .with_program("sh")
            .with_node_args(["-c", "exec sleep 30", "flowscene"])
            .with_process_timeout(Duration::from_millis(200)),
    );
    let started = std::time::Instant::now();
    let err = engine.render("A").unwrap_err();
    assert!(matches!(err, RenderError::Timeout { .. }), "{err:?}");
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[cfg(unix)]
#[test]
fn render_failure_surfaces_through_reconcile() {
    let engine = sh_engine("cat >/dev/null; exit 3");
    let err = reconcile(&engine, "flowchart LR\nA --> B").unwrap_err();
    assert!(matches!(err, Error::Render(RenderError::Timeout { .. })));
}
