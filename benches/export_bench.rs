use criterion::{criterion_group, criterion_main, Criterion};
use folioprint::paginate::{ImageCompression, PageFormat, Paginator};
use folioprint::pdf::LopdfAssembler;
use folioprint::{CaptureOptions, PrintMode, PrintRescaler, Rasterizer, RenderTree, SoftwareRasterizer, Viewport};

fn preview_html() -> String {
    let mut body = String::new();
    for i in 0..40 {
        body.push_str(&format!(
            r#"<div class="entry" style="padding: 12px; margin-bottom: 8px"><h3>Role {}</h3><p>Shipped features, reviewed code and kept the lights on.</p></div>"#,
            i
        ));
    }
    format!(r#"<html><body><div id="resume-preview" style="max-height: 600px; overflow: auto">{}</div></body></html>"#, body)
}

fn bench_print_mode(c: &mut Criterion) {
    let html = preview_html();
    let mut tree = RenderTree::parse_html(&html, Viewport::default()).expect("parse");
    let root = tree.find_by_id("resume-preview").expect("root");
    let rescaler = PrintRescaler::default();
    c.bench_function("print_mode_enter_release", |b| {
        b.iter(|| {
            let mode = PrintMode::enter(&mut tree, root, &rescaler);
            mode.release()
        })
    });
}

fn bench_capture_and_paginate(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread().build().expect("runtime");
    let html = preview_html();
    let mut tree = RenderTree::parse_html(&html, Viewport { width: 600, height: 800 }).expect("parse");
    tree.reflow();
    let root = tree.find_by_id("resume-preview").expect("root");
    let options = CaptureOptions { scale: 1.0, ..Default::default() };
    let rasterizer = SoftwareRasterizer::new();

    c.bench_function("software_capture", |b| {
        b.iter(|| runtime.block_on(rasterizer.capture(&tree, root, &options)).expect("capture"))
    });

    let image = runtime.block_on(rasterizer.capture(&tree, root, &options)).expect("capture");
    let paginator = Paginator::new(PageFormat::A4, ImageCompression::Fast);
    c.bench_function("paginate_to_pdf", |b| {
        b.iter(|| paginator.build(&image, &LopdfAssembler::new(), true).expect("build"))
    });
}

criterion_group!(benches, bench_print_mode, bench_capture_and_paginate);
criterion_main!(benches);
