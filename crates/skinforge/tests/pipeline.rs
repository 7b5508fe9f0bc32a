//! End to end through the library: raw card markup is normalized, published,
//! listed, rendered into slots and recoloured.

use std::sync::Arc;

use skinforge::{
    ArtifactStore, CatalogEntry, ColorSelection, MountSlot, Normalizer, RenderOutcome,
    TemplateArtifact, TemplateService, ThemeScope, AUTHORED_HEIGHT, AUTHORED_WIDTH,
};
use tempfile::TempDir;

fn raw_card(token: &str) -> String {
    format!(
        r#"<div class="skins-card-container"><style id="s{token}">.skn-{token} .header {{ color: red; }}</style>
<div class="card" data-index="0"><div class="document skn-{token}" style="transform: scale(0.35); width: 595px">
<div class="header accent-panel" style="background-color: #000"><h1 class="accent-text">Jane Doe</h1></div>
<div class="body"><span class="rating-fill" style="width: 60%"></span></div>
</div></div><button>Preview template</button></div>"#
    )
}

fn publish(dir: &TempDir, tokens: &[&str]) -> TemplateService {
    let normalizer = Normalizer::default();
    let store = ArtifactStore::create(dir.path()).unwrap();
    let mut catalog = Vec::new();
    for (index, token) in tokens.iter().enumerate() {
        let doc = normalizer.normalize(token, &raw_card(token), &[]).unwrap();
        store
            .write_artifact(&TemplateArtifact {
                id: token.to_string(),
                display_name: format!("Template {}", index + 1),
                category: "all".into(),
                popular: index == 0,
                html_fragment: doc.html,
                referenced_styles: normalizer.referenced_styles(),
                authored_width: AUTHORED_WIDTH,
                authored_height: AUTHORED_HEIGHT,
            })
            .unwrap();
        catalog.push(CatalogEntry {
            index,
            id: token.to_string(),
            display_name: format!("Template {}", index + 1),
            category: "all".into(),
            popular: index == 0,
            colors: vec![],
            referenced_styles: normalizer.referenced_styles(),
            authored_width: AUTHORED_WIDTH,
            authored_height: AUTHORED_HEIGHT,
        });
    }
    store.write_catalog(&catalog).unwrap();
    TemplateService::open(dir.path()).unwrap()
}

#[test]
fn published_documents_are_canonical() {
    let dir = TempDir::new().unwrap();
    let service = publish(&dir, &["a1b2", "c3d4"]);

    let listed = service.list_templates();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, "a1b2");
    assert!(listed[0].popular);

    let artifact = service.artifact("a1b2").unwrap();
    let html = &artifact.html_fragment;
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("/css/main-1.0.0.380.css"));
    assert!(html.contains(".skn-a1b2 .header"));
    assert!(!html.contains("scale(0.35)"));
    assert!(!html.contains("Preview template"));

    // Publishing the canonical document again is a no-op.
    let again = Normalizer::default().normalize("again", html, &[]).unwrap();
    assert_eq!(&again.html, html);
}

#[tokio::test]
async fn render_and_theme_through_the_service() {
    let dir = TempDir::new().unwrap();
    let service = publish(&dir, &["a1b2"]);

    let slot = MountSlot::new(7);
    let outcome = service.render_template(&slot, "a1b2", 210.0, 260.0).await.unwrap();
    let RenderOutcome::Mounted { fit, .. } = outcome else {
        panic!("expected a mounted view");
    };
    assert!((fit.scale_x - 210.0 / 595.0).abs() < 1e-9);
    assert!((fit.scale_y - 260.0 / 842.0).abs() < 1e-9);

    let selection = ColorSelection::default();
    let ink = selection.lookup("#102A73").unwrap();
    assert_eq!(service.apply_theme(&slot, &ink).unwrap(), 3);
    let html = slot.html();
    assert!(html.contains("background-color: #102A73"));
    assert!(html.contains("color: #102A73"));
    assert!(!html.contains("#000"));

    assert!(service
        .render_template(&slot, "missing", 210.0, 260.0)
        .await
        .is_err());
}

#[tokio::test]
async fn sessions_share_the_fragment_cache() {
    let dir = TempDir::new().unwrap();
    let service = publish(&dir, &["a1b2", "c3d4"]);

    let mut session = service.session(ColorSelection::default());
    let grid: Vec<Arc<MountSlot>> = (0..2).map(|_| session.mount()).collect();
    for (slot, id) in grid.iter().zip(["a1b2", "c3d4"]) {
        session.render(slot, id, 200.0, 283.0).await.unwrap();
    }

    let lead = session.selection().lookup("Lead").unwrap();
    // two hooked elements plus the rating bar per template
    assert_eq!(session.select_color(&lead, ThemeScope::All).unwrap(), 6);

    let preview = session.open_preview("c3d4", 595.0, 842.0).await.unwrap();
    assert!(preview.html().contains("#4A4A4A"));
    session.close_preview();
    session.teardown();
}
