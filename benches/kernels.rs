//! Benchmarks for the FDTD solver kernels.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use ctwave_core::backend::cpu::CpuBackend;
use ctwave_core::backend::SolverBackend;
use ctwave_core::schema::{
    Axis, ElasticConfig, GridConfig, MaterialStrengthConfig, ModelFlags, SolverConfig,
    SourceConfig, WaveType,
};
use ctwave_core::source::inject_source;
use ctwave_core::volume::VolumeModel;

fn config(size: usize) -> SolverConfig {
    SolverConfig {
        grid: GridConfig {
            width: size,
            height: size,
            depth: size,
            dx: 1e-4,
        },
        material_id: 1,
        axis: Axis::X,
        wave_type: WaveType::Both,
        strength: MaterialStrengthConfig {
            confining_pressure_mpa: 0.0,
            tensile_strength_mpa: 5.0,
            failure_angle_deg: 30.0,
            cohesion_mpa: 10.0,
        },
        source: SourceConfig {
            energy_j: 1.0,
            frequency_khz: 100.0,
            amplitude: 100,
            total_time_steps: 200,
        },
        flags: ModelFlags::default(),
        elastic: ElasticConfig {
            youngs_modulus_mpa: 20_000.0,
            poisson_ratio: 0.25,
        },
        use_full_face_transducers: false,
    }
}

fn bench_backend_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_backend_step");

    for size in [32, 64, 96] {
        let cfg = config(size);
        let n = cfg.grid.grid_size();
        let mut model = VolumeModel::new(cfg, vec![1u8; n], vec![2000.0f32; n]).unwrap();
        model.apply_pre_stress();
        inject_source(&mut model);
        let mut backend = CpuBackend;

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{size}x{size}x{size}")),
            &size,
            |b, _| {
                b.iter(|| {
                    backend.step(black_box(&mut model), black_box(1e-8)).unwrap();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_backend_step);
criterion_main!(benches);
