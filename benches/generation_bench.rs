use criterion::{black_box, criterion_group, criterion_main, Criterion};

use delve_core::balance::simulation::{run_balance_simulation, SimConfig};
use delve_core::balance::{BalanceManager, EncounterType};
use delve_core::generation::{validate_map, DungeonMapGenerator};
use delve_core::random::seeded;
use delve_core::returncost::ReturnCostCalculator;
use delve_core::safety::SafetyMarginManager;

fn bench_map_generation(c: &mut Criterion) {
    let generator = DungeonMapGenerator::new(BalanceManager::default(), ReturnCostCalculator::default());

    c.bench_function("generate_map_10", |b| {
        let mut rng = seeded(42);
        b.iter(|| generator.generate_map(black_box(10), None, &mut rng))
    });

    c.bench_function("generate_map_50_region", |b| {
        let mut rng = seeded(42);
        b.iter(|| generator.generate_map(black_box(50), Some("shadow_realm"), &mut rng))
    });

    c.bench_function("generate_depth_level", |b| {
        let mut rng = seeded(42);
        b.iter(|| generator.generate_depth_level(black_box(15), None, &mut rng))
    });

    let map = generator.generate_map(50, None, &mut seeded(7));
    if let Ok(map) = map {
        c.bench_function("validate_map_50", |b| b.iter(|| validate_map(black_box(&map.nodes))));
    }
}

fn bench_calculations(c: &mut Criterion) {
    let balance = BalanceManager::default();
    let calc = ReturnCostCalculator::default();
    let safety = SafetyMarginManager::default();

    c.bench_function("calculate_node_cost", |b| {
        b.iter(|| balance.calculate_node_cost(black_box(12), black_box(EncounterType::Hazard)))
    });

    c.bench_function("cumulative_return_cost_20", |b| {
        b.iter(|| calc.calculate_cumulative_return_cost(black_box(20)))
    });

    c.bench_function("risk_warnings", |b| {
        b.iter(|| safety.get_risk_warnings(black_box(150.0), black_box(120.0), black_box(9)))
    });

    c.bench_function("max_safe_depth", |b| {
        b.iter(|| safety.calculate_max_safe_depth(black_box(500.0)))
    });

    c.bench_function("expected_energy_cost_20", |b| {
        b.iter(|| balance.calculate_expected_energy_cost(black_box(20)))
    });
}

fn bench_simulation(c: &mut Criterion) {
    let balance = BalanceManager::default();
    let config = SimConfig {
        run_count: 200,
        max_depth: 10,
        ..Default::default()
    };
    c.bench_function("balance_simulation_200", |b| {
        b.iter(|| run_balance_simulation(&balance, black_box(&config)))
    });
}

criterion_group!(benches, bench_map_generation, bench_calculations, bench_simulation);
criterion_main!(benches);
