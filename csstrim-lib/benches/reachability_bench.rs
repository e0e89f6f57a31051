extern crate criterion;

use criterion::{criterion_group, criterion_main, Criterion};

use csstrim_lib::style::owned_css::{Declaration, Node, Rule, Stylesheet};
use csstrim_lib::{prune_parsed, DomSnapshot, HtmlSnapshot, TrimOptions};

fn large_page() -> String {
    let mut html = String::with_capacity(4_000_000);
    html.push_str("<!DOCTYPE html><html><body><main>");
    for i in 0..20_000 {
        html.push_str(&format!(
            "<section class=\"block block-{}\"><p class=\"text\">Test</p></section>",
            i % 200
        ));
    }
    html.push_str("</main></body></html>");
    html
}

fn wide_stylesheet() -> Stylesheet {
    let nodes = (0..2_000)
        .map(|i| {
            Node::Rule(Rule::new(
                format!(".block-{} .text, .unused-{} > p, main .block-{}:hover", i, i, i),
                vec![Declaration::new("color", "red")],
            ))
        })
        .collect();
    Stylesheet::new("bench.css", nodes)
}

fn bench_snapshot_parse(c: &mut Criterion) {
    let html = large_page();
    c.bench_function("snapshot_parse", |b| {
        b.iter(|| HtmlSnapshot::parse("bench", &html))
    });
}

fn bench_selector_matching(c: &mut Criterion) {
    let snapshot = HtmlSnapshot::parse("bench", &large_page());
    c.bench_function("selector_matching", |b| {
        b.iter(|| {
            for i in 0..200 {
                let _ = snapshot.matches(&format!("main > .block-{} p.text", i));
            }
        })
    });
}

fn bench_prune(c: &mut Criterion) {
    let snapshot = HtmlSnapshot::parse("bench", &large_page());
    let order = vec!["bench.css".to_string()];
    let options = TrimOptions::default();
    c.bench_function("prune_wide_stylesheet", |b| {
        b.iter(|| prune_parsed(&[&snapshot], &order, vec![wide_stylesheet()], &options))
    });
}

criterion_group!(benches, bench_snapshot_parse, bench_selector_matching, bench_prune);
criterion_main!(benches);
