use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal::Decimal;

fn bench_turns(c: &mut Criterion) {
    let cfg = sim_core::GameConfig::default();
    let state = sim_runtime::starting_state(&cfg);
    let decisions = sim_core::TurnDecisions {
        unit_price: Decimal::new(100, 0),
        new_engineers: 1,
        new_sales: 1,
        salary_pct: Decimal::new(100, 0),
    };
    c.bench_function("resolve_turn", |b| {
        b.iter(|| {
            let _ = black_box(sim_runtime::resolve_turn(&state, &decisions, &cfg));
        })
    });

    let mut noisy = cfg.clone();
    noisy.economy.demand_noise_frac = 0.1;
    c.bench_function("playthrough 40 quarters", |b| {
        b.iter(|| {
            let _ = black_box(sim_runtime::run_quarters(&noisy, &decisions, 40));
        })
    });
}

criterion_group!(benches, bench_turns);
criterion_main!(benches);
