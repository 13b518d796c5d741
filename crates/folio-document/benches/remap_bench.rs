// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for spatial remapping in the folio-document crate.

use std::collections::HashMap;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use folio_core::{AttributeNode, DocumentData, PageRef, RasterZone, SpatialRef};
use folio_document::{Bounds, DocumentLayout, PageLayout, PageMap, TextLine, remap};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn synthetic_layout(name: &str, pages: u32) -> DocumentLayout {
    DocumentLayout {
        document_name: name.into(),
        pages: (1..=pages)
            .map(|n| PageLayout {
                page_number: n,
                width: 2550,
                height: 3300,
                detected_rotation: None,
                lines: (0..40)
                    .map(|l| TextLine {
                        text: format!("page {n} line {l}"),
                        bounds: Bounds {
                            left: 100,
                            top: 80 * l,
                            right: 2400,
                            bottom: 80 * l + 40,
                        },
                        confidence: 95,
                    })
                    .collect(),
            })
            .collect(),
    }
}

fn synthetic_data(name: &str, pages: u32) -> DocumentData {
    let fields = (1..=pages)
        .map(|n| {
            AttributeNode::leaf(format!("Field{n}"), format!("value {n}")).with_spatial(SpatialRef {
                document_name: name.into(),
                zones: vec![RasterZone {
                    page_number: n,
                    start_x: 100,
                    start_y: 200,
                    end_x: 600,
                    end_y: 200,
                    height: 30,
                }],
            })
        })
        .collect();
    DocumentData::new(vec![AttributeNode::container("Document", fields)])
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Remap every other page of a 200-page scan into a 100-page output.
fn bench_remap_split(c: &mut Criterion) {
    let layout = synthetic_layout("scan.pdf", 200);
    let data = synthetic_data("scan.pdf", 200);
    let layouts: HashMap<String, DocumentLayout> =
        HashMap::from([(layout.document_name.clone(), layout)]);

    let pages: Vec<PageRef> = (1..=200)
        .step_by(2)
        .map(|n| PageRef::new("scan.pdf", n))
        .collect();
    let map = PageMap::from_pages("out.pdf", &pages).expect("valid page map");

    c.bench_function("remap split (200 -> 100 pages)", |b| {
        b.iter(|| black_box(remap(black_box(&map), &layouts, &data)));
    });
}

criterion_group!(benches, bench_remap_split);
criterion_main!(benches);
