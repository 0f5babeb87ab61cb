use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hepascreen::data::RawTable;
use hepascreen::pipeline::Pipeline;
use hepascreen::preprocessing::DEFAULT_SYMPTOMS;
use rand::prelude::*;

const CATEGORIES: [&str; 4] = [
    "Abses Hati",
    "Hepatitis Akut",
    "Hepatitis Kronis",
    "Infeksi Parasit atau Virus",
];

fn create_patient_table(n_rows: usize) -> RawTable {
    let mut rng = StdRng::seed_from_u64(7);

    let mut columns = vec!["JK".to_string(), "Umur".to_string()];
    columns.extend(DEFAULT_SYMPTOMS.iter().map(|s| s.to_string()));
    columns.push("Kategori Diagnosis".to_string());

    let rows = (0..n_rows)
        .map(|_| {
            // Skewed category weights so SMOTE has work to do
            let category = match rng.gen_range(0..10) {
                0 => 0,
                1 | 2 => 3,
                3..=5 => 2,
                _ => 1,
            };
            let mut row = vec![
                Some(if rng.gen_bool(0.5) { "L" } else { "P" }.to_string()),
                Some(rng.gen_range(5..85).to_string()),
            ];
            for s in 0..DEFAULT_SYMPTOMS.len() {
                let p = if s % CATEGORIES.len() == category { 0.8 } else { 0.2 };
                row.push(Some(if rng.gen_bool(p) { "ya" } else { "tidak" }.to_string()));
            }
            row.push(Some(CATEGORIES[category].to_string()));
            row
        })
        .collect();

    RawTable::new(columns, rows).unwrap()
}

fn bench_train(c: &mut Criterion) {
    let mut group = c.benchmark_group("train");
    group.sample_size(10);

    for n_rows in [100, 400].iter() {
        let table = create_patient_table(*n_rows);
        let pipeline = Pipeline::default();

        group.bench_with_input(BenchmarkId::new("smote_svm", n_rows), &table, |b, table| {
            b.iter(|| pipeline.train(black_box(table), true).unwrap())
        });
    }

    group.finish();
}

fn bench_predict_batch(c: &mut Criterion) {
    let pipeline = Pipeline::default();
    let (bundle, _) = pipeline.train(&create_patient_table(300), true).unwrap();

    let mut group = c.benchmark_group("predict_batch");
    for n_rows in [100, 1000].iter() {
        let table = create_patient_table(*n_rows);
        group.bench_with_input(BenchmarkId::from_parameter(n_rows), &table, |b, table| {
            b.iter(|| pipeline.predict_batch(black_box(table), &bundle).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_train, bench_predict_batch);
criterion_main!(benches);
