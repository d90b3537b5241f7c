use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mergetime_core::{align, CategoricalEncoder, Record, SchemaCapture, DEFAULT_LEAKAGE_FIELDS};

fn training_batch() -> Vec<Record> {
    let assocs = ["MEMBER", "CONTRIBUTOR", "NONE", "COLLABORATOR", "OWNER"];
    let repos = ["microsoft/vscode", "excalidraw/excalidraw"];
    (0..400u64)
        .map(|i| {
            Record::new()
                .with("additions", i * 13 % 900)
                .with("deletions", i * 7 % 300)
                .with("changed_files", 1 + i % 20)
                .with("num_commits", 1 + i % 5)
                .with("is_draft", i % 9 == 0)
                .with("title_len", 20 + i % 60)
                .with("body_len", i * 31 % 4000)
                .with("num_labels", i % 4)
                .with("author_assoc", assocs[(i % 5) as usize])
                .with("repo", repos[(i % 2) as usize])
        })
        .collect()
}

fn bench_align(c: &mut Criterion) {
    let schema = SchemaCapture::new(CategoricalEncoder::with_drop_first(true), DEFAULT_LEAKAGE_FIELDS)
        .capture(&training_batch())
        .expect("capture")
        .schema;
    let record = training_batch().swap_remove(17);

    c.bench_function("align_single_record", |b| {
        b.iter(|| align(black_box(&record), black_box(&schema)).expect("align"))
    });
}

criterion_group!(benches, bench_align);
criterion_main!(benches);
