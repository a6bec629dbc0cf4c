//! Numerical tests of full plans on the CPU reference backend.

use ocean_fft::fft::{
    Direction, FftError, FftOptions, FftPlan, FftPlanBuilder, PerformanceOptions, ProgramCache,
    Target, TransformKind,
};
use ocean_fft::host::{HostBackend, HostCommand, HostResource};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustfft::num_complex::Complex32;
use rustfft::{FftDirection, FftPlanner};

fn random_complex(len: usize, seed: u64) -> Vec<Complex32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|_| Complex32::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
        .collect()
}

fn random_real(len: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

fn to_floats(values: &[Complex32]) -> Vec<f32> {
    values.iter().flat_map(|c| [c.re, c.im]).collect()
}

fn to_complex(floats: &[f32]) -> Vec<Complex32> {
    floats
        .chunks_exact(2)
        .map(|c| Complex32::new(c[0], c[1]))
        .collect()
}

/// Row-major 2D DFT: rows first, then columns.
fn reference_2d(data: &[Complex32], nx: usize, ny: usize, direction: FftDirection) -> Vec<Complex32> {
    let mut planner = FftPlanner::new();
    let mut out = data.to_vec();

    let rows = planner.plan_fft(nx, direction);
    for row in out.chunks_exact_mut(nx) {
        rows.process(row);
    }

    if ny > 1 {
        let columns = planner.plan_fft(ny, direction);
        let mut column = vec![Complex32::default(); ny];
        for x in 0..nx {
            for y in 0..ny {
                column[y] = out[y * nx + x];
            }
            columns.process(&mut column);
            for y in 0..ny {
                out[y * nx + x] = column[y];
            }
        }
    }
    out
}

fn assert_close(actual: &[Complex32], expected: &[Complex32], tolerance: f32) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        let scale = e.norm().max(1.0);
        assert!(
            (a - e).norm() <= tolerance * scale,
            "element {i}: got {a}, expected {e}"
        );
    }
}

fn run(
    plan: &FftPlan<HostBackend>,
    backend: &mut HostBackend,
    input: &HostResource,
    output_floats: usize,
) -> Vec<f32> {
    let output = HostBackend::buffer_from(vec![0.0; output_floats]);
    plan.process(backend, &output, input, None).unwrap();
    HostBackend::read(&output)
}

#[test]
fn test_complex_forward_matches_reference() {
    let (nx, ny) = (64, 64);
    let data = random_complex(nx * ny, 1);

    let mut backend = HostBackend::new();
    let mut cache = ProgramCache::new();
    let plan = FftPlanBuilder::new(nx as u32, ny as u32)
        .build(&mut backend, &mut cache)
        .unwrap();

    let input = HostBackend::buffer_from(to_floats(&data));
    let result = to_complex(&run(&plan, &mut backend, &input, 2 * nx * ny));
    assert_close(&result, &reference_2d(&data, nx, ny, FftDirection::Forward), 1e-3);
}

#[test]
fn test_mixed_radix_axes() {
    // 512 splits into more than one radix on both axes.
    let (nx, ny) = (512, 32);
    let data = random_complex(nx * ny, 2);

    let mut backend = HostBackend::new();
    let mut cache = ProgramCache::new();
    let plan = FftPlanBuilder::new(nx as u32, ny as u32)
        .build(&mut backend, &mut cache)
        .unwrap();
    assert!(plan.radix_splits()[0].len() >= 2);

    let input = HostBackend::buffer_from(to_floats(&data));
    let result = to_complex(&run(&plan, &mut backend, &input, 2 * nx * ny));
    assert_close(&result, &reference_2d(&data, nx, ny, FftDirection::Forward), 1e-3);
}

#[test]
fn test_one_dimensional_transform() {
    let n = 1024;
    let data = random_complex(n, 3);

    let mut backend = HostBackend::new();
    let mut cache = ProgramCache::new();
    let plan = FftPlanBuilder::new(n as u32, 1)
        .build(&mut backend, &mut cache)
        .unwrap();

    let input = HostBackend::buffer_from(to_floats(&data));
    let result = to_complex(&run(&plan, &mut backend, &input, 2 * n));
    assert_close(&result, &reference_2d(&data, n, 1, FftDirection::Forward), 1e-3);
}

#[test]
fn test_complex_round_trip_with_normalized_inverse() {
    let (nx, ny) = (128, 64);
    let data = random_complex(nx * ny, 4);

    let mut backend = HostBackend::new();
    let mut cache = ProgramCache::new();
    let forward = FftPlanBuilder::new(nx as u32, ny as u32)
        .build(&mut backend, &mut cache)
        .unwrap();
    let inverse = FftPlanBuilder::new(nx as u32, ny as u32)
        .direction(Direction::Inverse)
        .normalize(true)
        .build(&mut backend, &mut cache)
        .unwrap();

    let input = HostBackend::buffer_from(to_floats(&data));
    let spectrum = HostBackend::buffer_from(run(&forward, &mut backend, &input, 2 * nx * ny));
    let result = to_complex(&run(&inverse, &mut backend, &spectrum, 2 * nx * ny));
    assert_close(&result, &data, 1e-4);
}

#[test]
fn test_real_to_complex_half_spectrum() {
    let (nx, ny) = (64, 32);
    let data = random_real(nx * ny, 5);

    let mut backend = HostBackend::new();
    let mut cache = ProgramCache::new();
    let plan = FftPlanBuilder::new(nx as u32, ny as u32)
        .kind(TransformKind::RealToComplex)
        .build(&mut backend, &mut cache)
        .unwrap();

    let input = HostBackend::buffer_from(data.clone());
    let result = to_complex(&run(&plan, &mut backend, &input, 2 * nx * ny));

    let complex: Vec<Complex32> = data.iter().map(|&v| Complex32::new(v, 0.0)).collect();
    let expected = reference_2d(&complex, nx, ny, FftDirection::Forward);
    for y in 0..ny {
        // Rows keep a stride of N complex values; N / 2 + 1 of them are valid.
        let row = y * nx;
        assert_close(
            &result[row..row + nx / 2 + 1],
            &expected[row..row + nx / 2 + 1],
            1e-3,
        );
    }
}

#[test]
fn test_real_round_trip() {
    let (nx, ny) = (128, 16);
    let data = random_real(nx * ny, 6);

    let mut backend = HostBackend::new();
    let mut cache = ProgramCache::new();
    let forward = FftPlanBuilder::new(nx as u32, ny as u32)
        .kind(TransformKind::RealToComplex)
        .build(&mut backend, &mut cache)
        .unwrap();
    let inverse = FftPlanBuilder::new(nx as u32, ny as u32)
        .kind(TransformKind::ComplexToReal)
        .direction(Direction::Inverse)
        .normalize(true)
        .build(&mut backend, &mut cache)
        .unwrap();

    let input = HostBackend::buffer_from(data.clone());
    let spectrum = HostBackend::buffer_from(run(&forward, &mut backend, &input, 2 * nx * ny));
    let result = run(&inverse, &mut backend, &spectrum, nx * ny);

    for (i, (a, e)) in result.iter().zip(&data).enumerate() {
        assert!((a - e).abs() < 1e-4, "sample {i}: got {a}, expected {e}");
    }
}

#[test]
fn test_one_dimensional_real_round_trip() {
    let n = 256;
    let data = random_real(n, 7);

    let mut backend = HostBackend::new();
    let mut cache = ProgramCache::new();
    let forward = FftPlanBuilder::new(n as u32, 1)
        .kind(TransformKind::RealToComplex)
        .build(&mut backend, &mut cache)
        .unwrap();
    let inverse = FftPlanBuilder::new(n as u32, 1)
        .kind(TransformKind::ComplexToReal)
        .direction(Direction::Inverse)
        .normalize(true)
        .build(&mut backend, &mut cache)
        .unwrap();

    let input = HostBackend::buffer_from(data.clone());
    let spectrum = HostBackend::buffer_from(run(&forward, &mut backend, &input, 2 * n));
    let result = run(&inverse, &mut backend, &spectrum, n);

    for (a, e) in result.iter().zip(&data) {
        assert!((a - e).abs() < 1e-4);
    }
}

#[test]
fn test_dual_transforms_are_independent() {
    let (nx, ny) = (64, 16);
    let first = random_complex(nx * ny, 8);
    let second = random_complex(nx * ny, 9);
    let packed: Vec<f32> = first
        .iter()
        .zip(&second)
        .flat_map(|(a, b)| [a.re, a.im, b.re, b.im])
        .collect();

    let mut backend = HostBackend::new();
    let mut cache = ProgramCache::new();
    let plan = FftPlanBuilder::new(nx as u32, ny as u32)
        .kind(TransformKind::ComplexToComplexDual)
        .build(&mut backend, &mut cache)
        .unwrap();

    let input = HostBackend::buffer_from(packed);
    let result = run(&plan, &mut backend, &input, 4 * nx * ny);

    let (a, b): (Vec<_>, Vec<_>) = result
        .chunks_exact(4)
        .map(|e| (Complex32::new(e[0], e[1]), Complex32::new(e[2], e[3])))
        .unzip();
    assert_close(&a, &reference_2d(&first, nx, ny, FftDirection::Forward), 1e-3);
    assert_close(&b, &reference_2d(&second, nx, ny, FftDirection::Forward), 1e-3);
}

#[test]
fn test_convolve_multiplies_first_input() {
    let (nx, ny) = (64, 64);
    let data = random_complex(nx * ny, 10);

    let mut backend = HostBackend::new();
    let mut cache = ProgramCache::new();
    let plan = FftPlanBuilder::new(nx as u32, ny as u32)
        .direction(Direction::InverseConvolve)
        .build(&mut backend, &mut cache)
        .unwrap();

    let input = HostBackend::buffer_from(to_floats(&data));
    let aux = HostBackend::buffer_from(
        std::iter::repeat([2.0, 0.0])
            .take(nx * ny)
            .flatten()
            .collect(),
    );
    let output = HostBackend::buffer_from(vec![0.0; 2 * nx * ny]);

    let err = plan
        .process(&mut backend, &output, &input, None)
        .unwrap_err();
    assert!(matches!(err, FftError::MissingAuxInput));

    plan.process(&mut backend, &output, &input, Some(&aux))
        .unwrap();
    let result = to_complex(&HostBackend::read(&output));
    let expected: Vec<Complex32> = reference_2d(&data, nx, ny, FftDirection::Inverse)
        .into_iter()
        .map(|c| c * 2.0)
        .collect();
    assert_close(&result, &expected, 1e-3);
}

#[test]
fn test_image_targets_match_buffers() {
    let (nx, ny) = (64, 32);
    let data = random_complex(nx * ny, 11);
    let floats = to_floats(&data);

    let mut backend = HostBackend::new();
    let mut cache = ProgramCache::new();
    let plan = FftPlanBuilder::new(nx as u32, ny as u32)
        .input_target(Target::Image)
        .output_target(Target::Image)
        .build(&mut backend, &mut cache)
        .unwrap();

    let input = HostBackend::image_from(nx as u32, ny as u32, 2, floats);
    let output = HostBackend::image_from(nx as u32, ny as u32, 2, vec![0.0; 2 * nx * ny]);
    plan.process(&mut backend, &output, &input, None).unwrap();

    let result = to_complex(&HostBackend::read(&output));
    assert_close(&result, &reference_2d(&data, nx, ny, FftDirection::Forward), 1e-3);
}

#[test]
fn test_wide_workgroups_and_vectors() {
    let (nx, ny) = (256, 64);
    let data = random_complex(nx * ny, 12);
    let options = FftOptions::default().with_performance(PerformanceOptions {
        workgroup_size_x: 8,
        workgroup_size_y: 2,
        vector_size: 4,
        shared_banked: false,
    });

    let mut backend = HostBackend::new();
    let mut cache = ProgramCache::new();
    let plan = FftPlanBuilder::new(nx as u32, ny as u32)
        .options(options)
        .build(&mut backend, &mut cache)
        .unwrap();

    let input = HostBackend::buffer_from(to_floats(&data));
    let result = to_complex(&run(&plan, &mut backend, &input, 2 * nx * ny));
    assert_close(&result, &reference_2d(&data, nx, ny, FftDirection::Forward), 1e-3);
}

#[test]
fn test_single_column_transform() {
    // Only the vertical axis has passes.
    let n = 64;
    let data = random_complex(n, 13);
    let options = FftOptions::default().with_performance(PerformanceOptions {
        workgroup_size_x: 1,
        workgroup_size_y: 1,
        vector_size: 2,
        shared_banked: false,
    });

    let mut backend = HostBackend::new();
    let mut cache = ProgramCache::new();
    let forward = FftPlanBuilder::new(1, n as u32)
        .options(options)
        .build(&mut backend, &mut cache)
        .unwrap();
    assert!(forward.radix_splits()[0].is_empty());
    assert!(!forward.radix_splits()[1].is_empty());

    let input = HostBackend::buffer_from(to_floats(&data));
    let result = to_complex(&run(&forward, &mut backend, &input, 2 * n));
    assert_close(&result, &reference_2d(&data, 1, n, FftDirection::Forward), 1e-3);

    let inverse = FftPlanBuilder::new(1, n as u32)
        .direction(Direction::Inverse)
        .options(options)
        .build(&mut backend, &mut cache)
        .unwrap();
    let result = to_complex(&run(&inverse, &mut backend, &input, 2 * n));
    assert_close(&result, &reference_2d(&data, 1, n, FftDirection::Inverse), 1e-3);
}

#[test]
fn test_workgroup_shapes_match_reference() {
    let (nx, ny) = (256, 16);
    let data = random_complex(nx * ny, 14);
    let expected = reference_2d(&data, nx, ny, FftDirection::Forward);
    let input = HostBackend::buffer_from(to_floats(&data));

    for (x, y, vector_size) in [(1, 1, 2), (2, 2, 2), (8, 1, 8), (16, 4, 4)] {
        let options = FftOptions::default().with_performance(PerformanceOptions {
            workgroup_size_x: x,
            workgroup_size_y: y,
            vector_size,
            shared_banked: false,
        });
        let mut backend = HostBackend::new();
        let mut cache = ProgramCache::new();
        let plan = FftPlanBuilder::new(nx as u32, ny as u32)
            .options(options)
            .build(&mut backend, &mut cache)
            .unwrap();
        let result = to_complex(&run(&plan, &mut backend, &input, 2 * nx * ny));
        assert_close(&result, &expected, 1e-3);
    }
}

#[test]
fn test_commands_follow_pass_list() {
    let (nx, ny) = (256, 256);
    let mut backend = HostBackend::new();
    let mut cache = ProgramCache::new();
    let plan = FftPlanBuilder::new(nx, ny)
        .build(&mut backend, &mut cache)
        .unwrap();

    let input = HostBackend::buffer_from(vec![0.0; (2 * nx * ny) as usize]);
    let output = HostBackend::buffer_from(vec![0.0; (2 * nx * ny) as usize]);
    plan.process(&mut backend, &output, &input, None).unwrap();

    let passes = plan.passes();
    assert_eq!(backend.dispatch_count(), passes.len());
    assert_eq!(backend.barrier_count(), passes.len() - 1);

    let program_changes = 1 + passes
        .windows(2)
        .filter(|w| w[0].program != w[1].program)
        .count();
    let binds = backend
        .commands()
        .iter()
        .filter(|c| matches!(c, HostCommand::BindProgram(_)))
        .count();
    assert_eq!(binds, program_changes);
    assert!(!matches!(
        backend.commands().last(),
        Some(HostCommand::Barrier(_))
    ));
}
