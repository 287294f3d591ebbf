use criterion::{black_box, criterion_group, criterion_main, Criterion};
use virtual_sensor_env::ipc::TriggerCoordinator;
use virtual_sensor_env::sensor::{Channel, ParameterSet, SignalGenerator};

fn benchmark_value_generation(c: &mut Criterion) {
    let channel = Channel::new(0, "pres01", ParameterSet::new(90.0, 120.0, 30.0, 0.9, 2));
    let mut gen = SignalGenerator::new(channel).expect("valid parameters");
    c.bench_function("generator_next_value", |b| b.iter(|| gen.next_value()));
}

fn benchmark_trigger_consume(c: &mut Criterion) {
    let coordinator = TriggerCoordinator::new();
    c.bench_function("trigger_set_and_consume", |b| {
        b.iter(|| {
            coordinator.set_pending(black_box(3));
            coordinator.try_consume(black_box(3))
        })
    });
    c.bench_function("trigger_miss", |b| b.iter(|| coordinator.try_consume(black_box(5))));
}

criterion_group!(benches, benchmark_value_generation, benchmark_trigger_consume);
criterion_main!(benches);
