use folioprint::{
    CaptureOptions, NodeId, PrintMode, PrintProfile, PrintRescaler, Rasterizer, RenderTree, RestoreOutcome,
    SoftwareRasterizer, StyleSnapshot, Viewport,
};

const FIXTURES: &[&str] = &[
    r#"<div id="p" style="max-height: 200px; overflow: auto"><h1>Name</h1><p>Summary text</p></div>"#,
    r#"<div id="p"><section style="padding: 8px 4px; margin-bottom: 12px; font-size: 18px"><h2 style="line-height: 22px">Work</h2>
<ul><li style="margin-bottom: 4px">One</li><li>Two <em>three</em></li></ul></section></div>"#,
    r#"<style>#p .card { padding: 10px; line-height: 1.4 } p { margin-bottom: 6px }</style>
<div id="p" style="font-size: 14px; overflow: hidden; max-height: 120px">
<div class="card"><p>Alpha</p><p style="font-size: 1.25em">Beta</p></div><div class="card" style="padding: 0"></div></div>"#,
    r#"<div id="p" style="background: #eef2ff"><div style="display: none"><p style="padding: 3px">hidden</p></div><span>inline</span><p>shown</p></div>"#,
];

fn load(html: &str) -> (RenderTree, NodeId) {
    let mut tree = RenderTree::parse_html(html, Viewport { width: 320, height: 240 }).expect("parse");
    tree.reflow();
    let root = tree.find_by_id("p").expect("root");
    (tree, root)
}

fn inline_state(tree: &RenderTree, root: NodeId) -> Vec<Vec<(String, String)>> {
    tree.elements_in(root)
        .into_iter()
        .map(|n| {
            tree.inline_style(n)
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        })
        .collect()
}

async fn digest(tree: &RenderTree, root: NodeId) -> String {
    let options = CaptureOptions { scale: 1.0, ..Default::default() };
    SoftwareRasterizer::new()
        .capture(tree, root, &options)
        .await
        .expect("capture")
        .digest()
}

#[tokio::test]
async fn print_mode_round_trip_is_invisible() {
    for html in FIXTURES {
        let (mut tree, root) = load(html);
        let before_styles = inline_state(&tree, root);
        let before_pixels = digest(&tree, root).await;

        let mut mode = PrintMode::enter(&mut tree, root, &PrintRescaler::default());
        mode.tree_mut().reflow();
        let printed = digest(mode.tree(), root).await;
        assert!(matches!(mode.release(), Some(RestoreOutcome::Restored { .. })), "{}", html);

        assert_eq!(inline_state(&tree, root), before_styles, "{}", html);
        assert_eq!(digest(&tree, root).await, before_pixels, "{}", html);
        assert_ne!(printed, before_pixels, "print mode should change the capture: {}", html);
    }
}

#[test]
fn snapshot_is_taken_before_rescaling() {
    let (mut tree, root) = load(FIXTURES[1]);
    let snapshot = StyleSnapshot::capture(&tree, root);
    PrintRescaler::default().apply(&mut tree, root);
    let section = tree.descendants(root)[0];
    assert_eq!(snapshot.nodes()[0].font_size, "18px");
    assert_eq!(tree.inline_style(section).get("font-size"), "14.4px");
    assert_eq!(snapshot.restore(&mut tree, root), RestoreOutcome::Restored { nodes: 6 });
    assert_eq!(tree.inline_style(section).get("font-size"), "18px");
    assert_eq!(tree.inline_style(section).get("padding"), "8px 4px");
}

#[test]
fn restore_onto_grown_subtree_is_refused() {
    let (mut tree, root) = load(FIXTURES[0]);
    let snapshot = StyleSnapshot::capture(&tree, root);
    PrintRescaler::default().apply(&mut tree, root);
    tree.append_element(root, "footer");
    let outcome = snapshot.restore(&mut tree, root);
    assert_eq!(outcome, RestoreOutcome::StructureChanged { expected: 2, found: 3 });
    assert_eq!(tree.inline_style(root).get("max-height"), "none");
}

#[test]
fn custom_profile_is_honoured() {
    let (mut tree, root) = load(FIXTURES[1]);
    let profile = PrintProfile {
        font_scale: 0.5,
        line_height: "1.2".into(),
        root_font_size: "12px".into(),
        ..Default::default()
    };
    PrintRescaler::new(profile).apply(&mut tree, root);
    let d = tree.descendants(root);
    assert_eq!(tree.inline_style(root).get("font-size"), "12px");
    assert_eq!(tree.inline_style(d[0]).get("font-size"), "9px");
    assert_eq!(tree.inline_style(d[1]).get("line-height"), "1.2");
}
