//! Integration tests for plan construction.

use ocean_fft::fft::{
    Barrier, Direction, FftError, FftOptions, FftPlan, FftPlanBuilder, Mode, PerformanceOptions,
    PrecisionOptions, ProgramCache, RadixPlanner, Target, TransformDesc, TransformKind, Wisdom,
    WisdomKey, SUPPORTED_RADICES,
};
use ocean_fft::host::HostBackend;

fn narrow_options() -> FftOptions {
    FftOptions::default().with_performance(PerformanceOptions {
        workgroup_size_x: 1,
        workgroup_size_y: 1,
        vector_size: 2,
        shared_banked: false,
    })
}

#[test]
fn test_radix_split_multiplies_to_axis_length() {
    let options = FftOptions::default();
    let wisdom = Wisdom::new();
    for log_n in 4..=16u32 {
        let n = 1 << log_n;
        let planner = RadixPlanner::new(64, n, Mode::Vertical, &options, &wisdom);
        let split = planner.plan().unwrap();
        let product: u32 = split.radices.iter().product();
        assert_eq!(product, n, "N = {n}: {:?}", split.radices);
        assert!(split.radices.windows(2).all(|w| w[0] >= w[1]));
        assert!(split.cost > 0.0);
    }
}

#[test]
fn test_small_vertical_axis() {
    let options = FftOptions::default();
    let wisdom = Wisdom::new();
    let planner = RadixPlanner::new(64, 4, Mode::Vertical, &options, &wisdom);
    assert_eq!(planner.plan().unwrap().radices, vec![4]);
}

#[test]
fn test_horizontal_split_multiplies_to_axis_length() {
    let wisdom = Wisdom::new();
    let default = FftOptions::default();
    let narrow = narrow_options();
    for log_n in 2..=16u32 {
        let n = 1 << log_n;
        // The default 4-wide workgroups cannot cover rows shorter than 16.
        let options = if n < 16 { &narrow } else { &default };
        let planner = RadixPlanner::new(n, 64, Mode::Horizontal, options, &wisdom);
        let split = planner.plan().unwrap();
        let product: u32 = split.radices.iter().product();
        assert_eq!(product, n, "N = {n}: {:?}", split.radices);
    }

    let planner = RadixPlanner::new(4, 64, Mode::Horizontal, &narrow, &wisdom);
    assert_eq!(planner.plan().unwrap().radices, vec![4]);
    let planner = RadixPlanner::new(8, 64, Mode::Horizontal, &narrow, &wisdom);
    assert_eq!(planner.plan().unwrap().radices, vec![8]);
}

#[test]
fn test_non_power_of_two_workgroups_rejected() {
    let mut backend = HostBackend::new();
    let mut cache = ProgramCache::new();
    for (x, y) in [(3, 1), (6, 1), (4, 3)] {
        let options = FftOptions::default().with_performance(PerformanceOptions {
            workgroup_size_x: x,
            workgroup_size_y: y,
            ..PerformanceOptions::default()
        });
        let err = FftPlanBuilder::new(256, 4)
            .options(options)
            .build(&mut backend, &mut cache)
            .unwrap_err();
        assert!(matches!(err, FftError::InvalidConfig(_)), "({x}, {y}): {err}");
    }
    assert_eq!(backend.compilations(), 0);
}

#[test]
fn test_wisdom_with_inexact_workgroups_is_not_used() {
    // Entries inserted directly bypass JSON validation.
    let mut wisdom = Wisdom::new();
    for radix in SUPPORTED_RADICES {
        let key = WisdomKey::linear(256, 4, radix, Mode::Horizontal, PrecisionOptions::default());
        wisdom.insert(
            key,
            1e-9,
            PerformanceOptions {
                workgroup_size_x: 3,
                ..PerformanceOptions::default()
            },
        );
    }

    let mut backend = HostBackend::new();
    let mut cache = ProgramCache::new();
    let err = FftPlanBuilder::new(256, 4)
        .wisdom(&wisdom)
        .build(&mut backend, &mut cache)
        .unwrap_err();
    assert!(matches!(
        err,
        FftError::NoFeasibleSplit {
            n: 256,
            mode: Mode::Horizontal
        }
    ));
}

#[test]
fn test_plan_passes_have_nonempty_grids() {
    let mut backend = HostBackend::new();
    let mut cache = ProgramCache::new();
    for (nx, ny) in [(64, 64), (256, 16), (1024, 1), (128, 512)] {
        let plan = FftPlanBuilder::new(nx, ny)
            .build(&mut backend, &mut cache)
            .unwrap();
        for pass in plan.passes() {
            assert!(pass.workgroups_x > 0 && pass.workgroups_y > 0);
        }
    }
}

#[test]
fn test_complex_inverse_plan_layout() {
    let mut backend = HostBackend::new();
    let mut cache = ProgramCache::new();
    let plan = FftPlanBuilder::new(256, 256)
        .direction(Direction::Inverse)
        .build(&mut backend, &mut cache)
        .unwrap();

    let passes = plan.passes();
    let vertical = plan.radix_splits()[0].len();
    assert_eq!(passes.len(), vertical + plan.radix_splits()[1].len());

    // Inverse transforms run the vertical axis first.
    assert!(passes[..vertical]
        .iter()
        .all(|p| p.parameters.mode == Mode::Vertical));
    assert!(passes[vertical..]
        .iter()
        .all(|p| p.parameters.mode == Mode::Horizontal));

    for (i, pass) in passes.iter().enumerate() {
        if i + 1 == passes.len() {
            assert_eq!(pass.barrier, None);
        } else {
            assert_eq!(pass.barrier, Some(Barrier::ShaderStorage));
        }
        assert_eq!(pass.parameters.direction, Direction::Inverse);
    }
    assert!(passes[0].parameters.first_stage);
    assert!(passes[vertical].parameters.first_stage);
    assert_eq!(plan.scratch_buffers(), 2.min(passes.len() - 1));
}

#[test]
fn test_stride_products_per_axis() {
    let mut backend = HostBackend::new();
    let mut cache = ProgramCache::new();
    let plan = FftPlanBuilder::new(64, 4096)
        .build(&mut backend, &mut cache)
        .unwrap();

    let mut p = 1;
    let mut mode = plan.passes()[0].parameters.mode;
    for pass in plan.passes() {
        if pass.parameters.mode != mode {
            assert_eq!(p, 64);
            mode = pass.parameters.mode;
            p = 1;
        }
        assert_eq!(pass.uniforms.p, p);
        assert_eq!(pass.parameters.first_stage, p == 1);
        p *= pass.parameters.radix;
    }
    assert_eq!(p, 4096);
}

#[test]
fn test_real_to_complex_plan() {
    let mut backend = HostBackend::new();
    let mut cache = ProgramCache::new();
    let plan = FftPlanBuilder::new(128, 64)
        .kind(TransformKind::RealToComplex)
        .build(&mut backend, &mut cache)
        .unwrap();

    let passes = plan.passes();
    let horizontal = plan.radix_splits()[0].len();
    assert_eq!(passes.len(), horizontal + 1 + plan.radix_splits()[1].len());
    assert_eq!(
        passes[horizontal].parameters.mode,
        Mode::ResolveRealToComplex
    );
    // Horizontal passes run over N / 2 complex values.
    assert!(passes.iter().all(|p| p.uniforms.width == 64));
    assert!(passes[horizontal + 1..]
        .iter()
        .all(|p| p.parameters.pow2_stride));
    assert!(passes[..=horizontal]
        .iter()
        .all(|p| !p.parameters.pow2_stride));
}

#[test]
fn test_complex_to_real_plan() {
    let mut backend = HostBackend::new();
    let mut cache = ProgramCache::new();
    let plan = FftPlanBuilder::new(128, 64)
        .kind(TransformKind::ComplexToReal)
        .direction(Direction::Inverse)
        .build(&mut backend, &mut cache)
        .unwrap();

    let passes = plan.passes();
    let vertical = plan.radix_splits()[0].len();
    assert_eq!(
        passes[vertical].parameters.mode,
        Mode::ResolveComplexToReal
    );
    assert!(passes[..vertical].iter().all(|p| p.parameters.pow2_stride));
    assert_eq!(passes.last().unwrap().parameters.mode, Mode::Horizontal);
}

#[test]
fn test_one_dimensional_plan() {
    let mut backend = HostBackend::new();
    let mut cache = ProgramCache::new();
    let plan = FftPlanBuilder::new(1024, 1)
        .build(&mut backend, &mut cache)
        .unwrap();

    assert!(plan.radix_splits()[1].is_empty());
    assert!(plan
        .passes()
        .iter()
        .all(|p| p.parameters.mode == Mode::Horizontal));
}

#[test]
fn test_only_first_pass_convolves() {
    let mut backend = HostBackend::new();
    let mut cache = ProgramCache::new();
    let plan = FftPlanBuilder::new(64, 64)
        .direction(Direction::InverseConvolve)
        .build(&mut backend, &mut cache)
        .unwrap();

    assert!(plan.convolves());
    assert_eq!(
        plan.passes()[0].parameters.direction,
        Direction::InverseConvolve
    );
    assert!(plan.passes()[1..]
        .iter()
        .all(|p| p.parameters.direction == Direction::Inverse));
}

#[test]
fn test_image_targets_only_at_the_ends() {
    let mut backend = HostBackend::new();
    let mut cache = ProgramCache::new();
    let plan = FftPlanBuilder::new(64, 64)
        .input_target(Target::Image)
        .output_target(Target::Image)
        .build(&mut backend, &mut cache)
        .unwrap();

    let passes = plan.passes();
    let last = passes.len() - 1;
    for (i, pass) in passes.iter().enumerate() {
        let expect_in = if i == 0 { Target::Image } else { Target::LinearBuffer };
        let expect_out = if i == last { Target::Image } else { Target::LinearBuffer };
        assert_eq!(pass.parameters.input_target, expect_in);
        assert_eq!(pass.parameters.output_target, expect_out);
    }
}

#[test]
fn test_invalid_descriptions_rejected() {
    let mut backend = HostBackend::new();
    let mut cache = ProgramCache::new();

    let err = FftPlanBuilder::new(100, 64)
        .build(&mut backend, &mut cache)
        .unwrap_err();
    assert!(matches!(err, FftError::NotPowerOfTwo { nx: 100, .. }));

    let err = FftPlanBuilder::new(64, 64)
        .kind(TransformKind::RealToComplex)
        .input_target(Target::Image)
        .build(&mut backend, &mut cache)
        .unwrap_err();
    assert!(matches!(err, FftError::InvalidConfig(_)));

    let err = FftPlanBuilder::new(64, 64)
        .kind(TransformKind::ComplexToReal)
        .build(&mut backend, &mut cache)
        .unwrap_err();
    assert!(matches!(err, FftError::InvalidConfig(_)));

    let err = FftPlanBuilder::new(1, 1)
        .build(&mut backend, &mut cache)
        .unwrap_err();
    assert!(matches!(err, FftError::InvalidConfig(_)));

    let options = FftOptions::default().with_performance(PerformanceOptions {
        workgroup_size_y: 2,
        ..PerformanceOptions::default()
    });
    let err = FftPlanBuilder::new(64, 1)
        .options(options)
        .build(&mut backend, &mut cache)
        .unwrap_err();
    assert!(matches!(err, FftError::InvalidConfig(_)));
}

#[test]
fn test_too_small_axis_has_no_split() {
    let mut backend = HostBackend::new();
    let mut cache = ProgramCache::new();
    let err = FftPlanBuilder::new(2, 1)
        .options(narrow_options())
        .build(&mut backend, &mut cache)
        .unwrap_err();
    assert!(matches!(err, FftError::NoFeasibleSplit { n: 2, .. }));
}

#[test]
fn test_plans_share_cached_programs() {
    let mut backend = HostBackend::new();
    let mut cache = ProgramCache::new();
    let desc = TransformDesc::new(256, 256, TransformKind::ComplexToComplex, Direction::Forward);
    let options = FftOptions::default();
    let wisdom = Wisdom::new();

    let first = FftPlan::new(&mut backend, &mut cache, desc, &options, &wisdom).unwrap();
    let compiled = cache.compilations();
    assert!(compiled > 0);
    assert!(compiled <= first.passes().len());

    let second = FftPlan::new(&mut backend, &mut cache, desc, &options, &wisdom).unwrap();
    assert_eq!(cache.compilations(), compiled);
    assert_eq!(backend.compilations() as usize, compiled);
    for (a, b) in first.passes().iter().zip(second.passes()) {
        assert_eq!(a.program, b.program);
    }
}

#[test]
fn test_single_pass_plan_rules() {
    let mut backend = HostBackend::new();
    let mut cache = ProgramCache::new();
    let options = narrow_options();

    let plan = FftPlan::single_pass(
        &mut backend,
        &mut cache,
        64,
        64,
        8,
        8,
        Mode::Horizontal,
        Target::LinearBuffer,
        Target::LinearBuffer,
        &options,
    )
    .unwrap();
    assert_eq!(plan.passes().len(), 1);
    assert!(!plan.passes()[0].parameters.first_stage);
    assert_eq!(plan.passes()[0].barrier, None);

    let err = FftPlan::single_pass(
        &mut backend,
        &mut cache,
        64,
        64,
        8,
        8,
        Mode::Horizontal,
        Target::Image,
        Target::LinearBuffer,
        &options,
    )
    .unwrap_err();
    assert!(matches!(err, FftError::InvalidConfig(_)));

    let err = FftPlan::single_pass(
        &mut backend,
        &mut cache,
        64,
        64,
        8,
        1,
        Mode::Horizontal,
        Target::LinearBuffer,
        Target::Image,
        &options,
    )
    .unwrap_err();
    assert!(matches!(err, FftError::InvalidConfig(_)));
}
