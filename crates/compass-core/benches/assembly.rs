use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use compass_core::assembler::{select_questions, ClusterPool};
use compass_core::model::{Category, ClusterQuota, Question};

fn make_pools(clusters: u64, per_cluster: u64, quota: fn(u64) -> ClusterQuota) -> Vec<ClusterPool> {
    (1..=clusters)
        .map(|cluster_id| ClusterPool {
            cluster_id,
            name: format!("Cluster {cluster_id}"),
            quota: quota(cluster_id),
            questions: (0..per_cluster)
                .map(|i| Question {
                    id: cluster_id * 10_000 + i,
                    construct_id: cluster_id * 10 + i % 3,
                    text: format!("Question {i}"),
                    category: Category::ALL[(i % 3) as usize],
                    order_no: i as i32,
                    is_active: true,
                })
                .collect(),
        })
        .collect()
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_questions");

    let unrestricted = make_pools(6, 60, ClusterQuota::unrestricted);
    group.bench_function("unrestricted 6x60", |b| {
        let mut rng = StdRng::seed_from_u64(1);
        b.iter(|| select_questions(black_box(&unrestricted), &mut rng))
    });

    let quota = make_pools(6, 60, |id| ClusterQuota::new(id, 8, 4, 2));
    group.bench_function("quota 6x60", |b| {
        let mut rng = StdRng::seed_from_u64(1);
        b.iter(|| select_questions(black_box(&quota), &mut rng))
    });

    let shortfall = make_pools(6, 6, |id| ClusterQuota::new(id, 8, 4, 2));
    group.bench_function("shortfall 6x6", |b| {
        let mut rng = StdRng::seed_from_u64(1);
        b.iter(|| select_questions(black_box(&shortfall), &mut rng))
    });

    group.finish();
}

criterion_group!(benches, bench_select);
criterion_main!(benches);
