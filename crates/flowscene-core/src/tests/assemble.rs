use crate::assemble::{resolve_node_label, strip_logical_name};
use crate::*;
use serde_json::json;

const BROWSER_VM_MMD: &str = include_str!("../../../../fixtures/flowchart/browser_vm.mmd");
const BROWSER_VM_SVG: &str = include_str!("../../../../fixtures/flowchart/browser_vm.svg");

struct FailingEngine;

impl RenderEngine for FailingEngine {
    fn render(&self, _source: &str) -> std::result::Result<VisualTree, RenderError> {
        Err(RenderError::Timeout { waited_ms: 10 })
    }
}

fn vnode(id: &str, label: Option<&str>) -> VisualNode {
    VisualNode {
        id: id.to_string(),
        label: label.map(str::to_string),
        class_list: vec!["node".to_string()],
        bbox: Some(BBox::new(0.0, 0.0, 10.0, 10.0)),
    }
}

#[test]
fn strip_logical_name_needs_a_separator() {
    assert_eq!(strip_logical_name("B: Browser", "B"), Some("Browser"));
    assert_eq!(strip_logical_name("B - Browser", "B"), Some("Browser"));
    assert_eq!(strip_logical_name("B Browser", "B"), Some("Browser"));
    assert_eq!(strip_logical_name("Browser", "B"), None);
    assert_eq!(strip_logical_name("B", "B"), None);
    assert_eq!(strip_logical_name("B: ", "B"), None);
}

#[test]
fn label_priority_declared_then_rendered_then_id() {
    assert_eq!(resolve_node_label("A", Some("Foo"), Some("Bar")), "Foo");
    assert_eq!(resolve_node_label("A", Some("  "), Some("A: Alpha")), "Alpha");
    assert_eq!(resolve_node_label("A", None, Some("Alpha")), "Alpha");
    assert_eq!(resolve_node_label("A", None, Some("A")), "A");
    assert_eq!(resolve_node_label("A", None, None), "A");
}

#[test]
fn reconcile_browser_vm_scene() {
    let scene = reconcile(&SvgEngine::new(BROWSER_VM_SVG), BROWSER_VM_MMD).unwrap();
    assert_eq!(
        serde_json::to_value(&scene).unwrap(),
        json!({
            "direction": "LR",
            "nodes": [
                {
                    "id": "B",
                    "label": "Browser https://example.com",
                    "visualId": "flowchart-B-0",
                    "className": "Browser",
                    "classList": ["node", "default", "Browser"],
                    "bbox": {"x": 8.0, "y": 8.0, "width": 256.0, "height": 54.0}
                },
                {
                    "id": "VM",
                    "label": "VM",
                    "visualId": "flowchart-VM-1",
                    "className": "VM",
                    "classList": ["node", "default", "VM"],
                    "bbox": {"x": 328.0, "y": 8.0, "width": 77.0, "height": 54.0}
                }
            ],
            "edges": [
                {
                    "from": "B",
                    "to": "VM",
                    "fromId": "flowchart-B-0",
                    "toId": "flowchart-VM-1",
                    "visualId": "L_B_VM_0",
                    "label": "request",
                    "x1": 264.0,
                    "y1": 35.0,
                    "x2": 336.5,
                    "y2": 35.0
                }
            ],
            "classDefs": {
                "Browser": "fill:#fff,stroke:#222",
                "VM": "fill:#333,stroke:#ccc"
            }
        })
    );
}

#[test]
fn reconcile_twice_gives_equal_scenes() {
    let tree = crate::visual::read_svg(BROWSER_VM_SVG).unwrap();
    let reconciler = Reconciler::new(StaticEngine::new(tree));
    let first = reconciler.reconcile(BROWSER_VM_MMD).unwrap();
    let second = reconciler.reconcile(BROWSER_VM_MMD).unwrap();
    assert_eq!(first, second);
}

#[test]
fn blank_input_is_malformed() {
    let engine = StaticEngine::default();
    assert!(matches!(reconcile(&engine, ""), Err(Error::MalformedInput)));
    assert!(matches!(
        reconcile(&engine, "  \n\t"),
        Err(Error::MalformedInput)
    ));
    let err = Reconciler::new(engine).extract(" ").unwrap_err();
    assert!(err.is_client_error());
    assert_eq!(err.to_string(), "No Mermaid code provided");
}

#[test]
fn render_failure_fails_the_pass() {
    let err = reconcile(&FailingEngine, "flowchart LR\nA --> B").unwrap_err();
    assert!(matches!(
        err,
        Error::Render(RenderError::Timeout { waited_ms: 10 })
    ));
    assert!(!err.is_client_error());
}

#[test]
fn missing_visual_counterparts_leave_fields_empty() {
    let scene = reconcile(&StaticEngine::default(), "flowchart LR\nA[Alpha] --> B").unwrap();
    assert_eq!(
        serde_json::to_value(&scene).unwrap(),
        json!({
            "direction": "LR",
            "nodes": [
                {"id": "A", "label": "Alpha"},
                {"id": "B", "label": "B", "implicit": true}
            ],
            "edges": [{"from": "A", "to": "B", "label": null}],
            "classDefs": {}
        })
    );
}

#[test]
fn rendered_label_fills_in_undeclared_nodes() {
    let tree = VisualTree {
        nodes: vec![
            vnode("flowchart-A-0", Some("A: Alpha")),
            vnode("flowchart-B-1", Some("Beta")),
        ],
        edges: vec![],
    };
    let scene = reconcile(&StaticEngine::new(tree), "A\nB[Declared]").unwrap();
    assert_eq!(scene.nodes[0].label, "Alpha");
    assert_eq!(scene.nodes[1].label, "Declared");
    assert_eq!(scene.nodes[0].bbox, Some(BBox::new(0.0, 0.0, 10.0, 10.0)));
}

#[test]
fn implicit_nodes_follow_declared_ones() {
    let tree = VisualTree {
        nodes: vec![
            vnode("flowchart-A-0", None),
            vnode("flowchart-B-1", None),
            vnode("flowchart-C-2", None),
        ],
        edges: vec![],
    };
    let scene = reconcile(&StaticEngine::new(tree), "A --> B[Beta]\nC\nB --> D").unwrap();
    let nodes = scene
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), n.label.as_str(), n.implicit))
        .collect::<Vec<_>>();
    assert_eq!(
        nodes,
        vec![
            ("A", "A", false),
            ("C", "C", false),
            ("B", "Beta", false),
            ("D", "D", true),
        ]
    );
    assert_eq!(scene.nodes[3].visual_id, None);
    assert_eq!(scene.nodes[2].visual_id.as_deref(), Some("flowchart-B-1"));
}

#[test]
fn edge_label_falls_back_to_rendered_label() {
    let tree = VisualTree {
        nodes: vec![],
        edges: vec![VisualEdge {
            id: "L_A_B_0".to_string(),
            label: Some("rendered".to_string()),
            path: None,
        }],
    };
    let scene = reconcile(&StaticEngine::new(tree), "A --> B").unwrap();
    assert_eq!(scene.edges[0].label.as_deref(), Some("rendered"));
    assert_eq!(scene.edges[0].visual_id.as_deref(), Some("L_A_B_0"));
    assert_eq!(scene.edges[0].from_id, None);
}

#[test]
fn extract_skips_the_engine() {
    let graph = Reconciler::new(FailingEngine)
        .extract("flowchart TD\nA --> B")
        .unwrap();
    assert_eq!(graph.direction.as_deref(), Some("TB"));
    assert_eq!(graph.edges.len(), 1);
}

#[test]
fn scene_round_trips_through_json() {
    let scene = reconcile(&SvgEngine::new(BROWSER_VM_SVG), BROWSER_VM_MMD).unwrap();
    let text = serde_json::to_string(&scene).unwrap();
    let back: Scene = serde_json::from_str(&text).unwrap();
    assert_eq!(back, scene);
}
