use criterion::{criterion_group, criterion_main, Criterion};

use annocap::capture::{CaptureOptions, DomCloneRasterizer};
use annocap::dom::Document;
use annocap::platform::DeviceMetrics;
use annocap::{CaptureConfig, CaptureRegion, CompositingEngine, SnapshotMap};
use image::{Rgba, RgbaImage};

fn page() -> String {
    let mut body = String::new();
    for i in 0..40 {
        body.push_str(&format!(
            "<div class=\"row\" style=\"border-left: 3px solid oklch(0.6 0.2 {})\">Row {} with some wrapped text content</div>",
            i * 9,
            i
        ));
    }
    format!(
        "<html><head><style>.row {{ padding: 6px; margin: 4px 0; background-color: lab(95 0 -5); }}</style></head>\
         <body><div id=\"doc\" style=\"width: 640px\">{}</div></body></html>",
        body
    )
}

fn bench_dom_clone_capture(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    let mut doc = Document::parse_html(&page(), DeviceMetrics::new(1280, 720, 2.0));
    let root = doc.find_by_id("doc").expect("region");
    let region = CaptureRegion::measure(&doc, root).expect("region");
    let config = CaptureConfig::default();
    let snapshots = SnapshotMap::new();
    let rasterizer = DomCloneRasterizer::new();

    c.bench_function("dom_clone_capture", |b| {
        b.iter(|| {
            let options = CaptureOptions { config: &config, snapshots: &snapshots, overlay: None };
            runtime
                .block_on(rasterizer.capture(&mut doc, &region, &options))
                .expect("capture");
        })
    });
}

fn bench_composite(c: &mut Criterion) {
    let engine = CompositingEngine::new(&CaptureConfig::default());
    let background = RgbaImage::from_fn(1280, 960, |x, y| Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255]));
    let annotation = RgbaImage::from_fn(640, 480, |x, _| {
        if x % 32 < 4 {
            Rgba([255, 0, 0, 200])
        } else {
            Rgba([0, 0, 0, 0])
        }
    });

    c.bench_function("composite_images", |b| {
        b.iter(|| {
            let _ = engine.composite_images(&background, &annotation);
        })
    });
}

criterion_group!(benches, bench_dom_clone_capture, bench_composite);
criterion_main!(benches);
