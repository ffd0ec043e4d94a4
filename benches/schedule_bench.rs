use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use staggrid::comm::NoComm;
use staggrid::dof::assign_level_dofs;
use staggrid::geometry::region::Region;
use staggrid::level::patch::PatchLevel;
use staggrid::level::side_data::LevelData;
use staggrid::schedule::{build_data_synch_schedule, build_ghost_fill_schedule};

/// A row of n abutting 8x8 patches, all rank-0 owned.
fn row_level(n: usize) -> PatchLevel<2> {
    let boxes = (0..n)
        .map(|i| {
            let x0 = 8 * i as i64;
            (Region::new([x0, 0], [x0 + 7, 7]), 0usize)
        })
        .collect();
    PatchLevel::new(Region::new([0, 0], [8 * n as i64 - 1, 7]), 1, boxes).unwrap()
}

fn bench_schedule_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("schedule-build");
    for &n in &[4usize, 16, 64] {
        let level = row_level(n);
        group.bench_with_input(BenchmarkId::new("data-synch", n), &level, |b, level| {
            b.iter(|| build_data_synch_schedule(level));
        });
        group.bench_with_input(BenchmarkId::new("ghost-fill", n), &level, |b, level| {
            b.iter(|| build_ghost_fill_schedule(level));
        });
    }
    group.finish();
}

fn bench_dof_assignment(c: &mut Criterion) {
    let mut group = c.benchmark_group("dof-assignment");
    for &n in &[4usize, 16] {
        let level = row_level(n);
        group.bench_with_input(BenchmarkId::new("assign", n), &level, |b, level| {
            b.iter(|| {
                let mut dof = LevelData::allocate(level, 0, 1);
                assign_level_dofs(level, &mut dof, &NoComm).unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_schedule_build, bench_dof_assignment);
criterion_main!(benches);
