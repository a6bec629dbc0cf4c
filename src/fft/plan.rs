//! Plan construction.
//!
//! An [`FftPlan`] owns its pass list and scratch buffers. Programs come from
//! a [`ProgramCache`] borrowed for the duration of construction, so several
//! plans can share compiled programs.

use std::time::Instant;

use super::backend::{BufferDesc, ComputeBackend};
use super::cache::ProgramCache;
use super::executor;
use super::options::FftOptions;
use super::planner::{RadixPlanner, RadixSplit};
use super::radix::{build_resolve_step, build_step, radix_to_wg_z, RadixStep};
use super::types::{
    Barrier, Direction, Mode, Parameters, PassUniforms, PrecisionOptions, Target, TransformKind,
    WorkgroupSize,
};
use super::wisdom::{BenchParams, Wisdom, WisdomKey};
use super::FftError;

/// One dispatch of a plan. Immutable once the plan is built.
#[derive(Debug, Clone, PartialEq)]
pub struct Pass<P> {
    pub parameters: Parameters,
    pub uniforms: PassUniforms,
    pub workgroups_x: u32,
    pub workgroups_y: u32,
    pub program: P,
    /// Barrier issued after the dispatch. `None` on the last pass.
    pub barrier: Option<Barrier>,
}

/// What a plan computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransformDesc {
    /// Width in the caller's domain (real samples for real transforms).
    pub nx: u32,
    pub ny: u32,
    pub kind: TransformKind,
    pub direction: Direction,
    pub input_target: Target,
    pub output_target: Target,
}

impl TransformDesc {
    pub fn new(nx: u32, ny: u32, kind: TransformKind, direction: Direction) -> Self {
        Self {
            nx,
            ny,
            kind,
            direction,
            input_target: Target::LinearBuffer,
            output_target: Target::LinearBuffer,
        }
    }

    fn validate(&self, options: &FftOptions) -> Result<(), FftError> {
        options.validate()?;

        if !self.nx.is_power_of_two() || !self.ny.is_power_of_two() {
            return Err(FftError::NotPowerOfTwo {
                nx: self.nx,
                ny: self.ny,
            });
        }
        if self.kind.needs_resolve() && self.nx < 2 {
            return Err(FftError::InvalidConfig(
                "real transforms need at least 2 samples per row".into(),
            ));
        }
        if !self.kind.needs_resolve() && self.nx == 1 && self.ny == 1 {
            return Err(FftError::InvalidConfig(
                "1x1 complex transform has no passes".into(),
            ));
        }

        match (self.kind, self.direction) {
            (TransformKind::ComplexToReal, Direction::Forward) => {
                return Err(FftError::InvalidConfig(
                    "complex-to-real transforms require an inverse direction".into(),
                ));
            }
            (TransformKind::RealToComplex, Direction::Inverse | Direction::InverseConvolve) => {
                return Err(FftError::InvalidConfig(
                    "real-to-complex transforms require the forward direction".into(),
                ));
            }
            _ => {}
        }

        if self.kind == TransformKind::RealToComplex && self.input_target == Target::Image {
            return Err(FftError::InvalidConfig(
                "real-to-complex input must be a buffer or a real image".into(),
            ));
        }
        if self.kind == TransformKind::ComplexToReal && self.output_target == Target::Image {
            return Err(FftError::InvalidConfig(
                "complex-to-real output must be a buffer or a real image".into(),
            ));
        }
        if self.input_target == Target::RealImage && self.kind != TransformKind::RealToComplex {
            return Err(FftError::InvalidConfig(format!(
                "{:?} cannot read a real image",
                self.kind
            )));
        }
        if self.output_target == Target::RealImage && self.kind != TransformKind::ComplexToReal {
            return Err(FftError::InvalidConfig(format!(
                "{:?} cannot write a real image",
                self.kind
            )));
        }

        if self.ny == 1 && options.performance.workgroup_size_y > 1 {
            return Err(FftError::InvalidConfig(
                "workgroup_size_y must be 1 for transforms with Ny == 1".into(),
            ));
        }
        Ok(())
    }
}

/// An executable multi-pass transform.
pub struct FftPlan<B: ComputeBackend> {
    desc: TransformDesc,
    passes: Vec<Pass<B::Program>>,
    splits: [Vec<RadixStep>; 2],
    scratch: Vec<B::Resource>,
    cost: f64,
}

impl<B: ComputeBackend> std::fmt::Debug for FftPlan<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FftPlan")
            .field("desc", &self.desc)
            .field("passes", &self.passes)
            .field("scratch_buffers", &self.scratch.len())
            .field("cost", &self.cost)
            .finish()
    }
}

/// Inputs shared by every pass of a plan under construction.
struct PassContext<'a> {
    options: &'a FftOptions,
    input_target: Target,
    output_target: Target,
    direction: Direction,
    total: usize,
}

impl PassContext<'_> {
    fn parameters(
        &self,
        index: usize,
        step: &RadixStep,
        mode: Mode,
        p: u32,
        pow2_stride: bool,
    ) -> Parameters {
        let first = index == 0;
        let last = index + 1 == self.total;
        Parameters {
            workgroup_size: step.workgroup_size,
            radix: step.radix,
            vector_size: step.vector_size,
            direction: self.pass_direction(index),
            mode,
            input_target: if first {
                self.input_target
            } else {
                Target::LinearBuffer
            },
            output_target: if last {
                self.output_target
            } else {
                Target::LinearBuffer
            },
            first_stage: p == 1,
            pow2_stride,
            shared_banked: step.shared_banked,
            precision: self.pass_precision(index),
        }
    }

    /// Only the first pass convolves.
    fn pass_direction(&self, index: usize) -> Direction {
        if index > 0 && self.direction == Direction::InverseConvolve {
            Direction::Inverse
        } else {
            self.direction
        }
    }

    /// Intermediates are stored with the output precision.
    fn pass_precision(&self, index: usize) -> PrecisionOptions {
        let precision = self.options.precision;
        PrecisionOptions {
            input_fp16: if index == 0 {
                precision.input_fp16
            } else {
                precision.output_fp16
            },
            ..precision
        }
    }
}

impl<B: ComputeBackend> FftPlan<B> {
    /// Plans a full 2D (or Nx1) transform and compiles its programs.
    pub fn new(
        backend: &mut B,
        cache: &mut ProgramCache<B::Program>,
        desc: TransformDesc,
        options: &FftOptions,
        wisdom: &Wisdom,
    ) -> Result<Self, FftError> {
        desc.validate(options)?;

        let expand = desc.kind.needs_resolve();
        let nx = if expand { desc.nx / 2 } else { desc.nx };
        let ny = desc.ny;
        let dual = desc.kind == TransformKind::ComplexToComplexDual;
        let (horizontal, vertical) = if dual {
            (Mode::HorizontalDual, Mode::VerticalDual)
        } else {
            (Mode::Horizontal, Mode::Vertical)
        };

        // Targets used to pick wisdom for the first and last pass of each axis.
        let (modes, targets) = match desc.direction {
            Direction::Forward => {
                let mid = if ny > 1 {
                    Target::LinearBuffer
                } else {
                    desc.output_target
                };
                ([horizontal, vertical], [desc.input_target, mid, mid, desc.output_target])
            }
            Direction::Inverse | Direction::InverseConvolve => {
                let mid = if ny > 1 {
                    Target::LinearBuffer
                } else {
                    desc.input_target
                };
                ([vertical, horizontal], [desc.input_target, mid, mid, desc.output_target])
            }
        };

        let mut cost = 0.0;
        let mut splits: [Vec<RadixStep>; 2] = [Vec::new(), Vec::new()];
        for axis in 0..2 {
            let mode = modes[axis];
            let planner = RadixPlanner::new(nx, ny, mode, options, wisdom);
            let split: RadixSplit = planner.plan()?;
            cost += split.cost;
            let pow2_stride = expand && mode == Mode::Vertical;
            splits[axis] =
                planner.build_steps(&split, targets[2 * axis], targets[2 * axis + 1], pow2_stride);
        }

        let ctx = PassContext {
            options,
            input_target: desc.input_target,
            output_target: desc.output_target,
            direction: desc.direction,
            total: splits[0].len() + splits[1].len() + usize::from(expand),
        };

        let mut passes = Vec::with_capacity(ctx.total);
        for (axis, steps) in splits.iter().enumerate() {
            let mode = modes[axis];
            let pow2_stride = expand && mode == Mode::Vertical;
            let mut p = 1;
            for step in steps {
                let index = passes.len();
                let parameters = ctx.parameters(index, step, mode, p, pow2_stride);
                passes.push(Self::realize(backend, cache, parameters, step, p, nx, ny)?);
                p *= step.radix;
            }

            if axis == 0 && expand {
                let index = passes.len();
                let mode = if desc.kind == TransformKind::ComplexToReal {
                    Mode::ResolveComplexToReal
                } else {
                    Mode::ResolveRealToComplex
                };
                let precision = ctx.pass_precision(index);
                let in_target = if index == 0 {
                    desc.input_target
                } else {
                    Target::LinearBuffer
                };
                let out_target = if index + 1 == ctx.total {
                    desc.output_target
                } else {
                    Target::LinearBuffer
                };
                let key = WisdomKey::new(nx, ny, 2, mode, in_target, out_target, precision);
                let opts = wisdom.find_optimal_options_or_default(&key, &options.performance);
                let step = build_resolve_step(
                    nx,
                    ny,
                    WorkgroupSize {
                        x: opts.workgroup_size_x,
                        y: opts.workgroup_size_y,
                        z: 1,
                    },
                );
                let parameters = ctx.parameters(index, &step, mode, 1, false);
                passes.push(Self::realize(backend, cache, parameters, &step, 1, nx, ny)?);
            }
        }

        let last = passes.len().saturating_sub(1);
        for (index, pass) in passes.iter_mut().enumerate() {
            pass.barrier = (index != last).then_some(Barrier::ShaderStorage);
        }

        let scratch = Self::create_scratch(backend, &desc, options, passes.len())?;

        log::info!(
            "Built {}x{} {:?} {:?} plan: {} passes ({:?} + {:?}), {} scratch buffers, cost {:.3e}",
            desc.nx,
            desc.ny,
            desc.kind,
            desc.direction,
            passes.len(),
            splits[0].iter().map(|s| s.radix).collect::<Vec<_>>(),
            splits[1].iter().map(|s| s.radix).collect::<Vec<_>>(),
            scratch.len(),
            cost
        );
        for (axis, steps) in splits.iter().enumerate() {
            for step in steps {
                log::debug!(
                    "  axis {} radix {}: size {:?}, dispatch ({}, {}), vector {}",
                    axis,
                    step.radix,
                    step.workgroup_size,
                    step.workgroups_x,
                    step.workgroups_y,
                    step.vector_size
                );
            }
        }

        Ok(Self {
            desc,
            passes,
            splits,
            scratch,
            cost,
        })
    }

    /// A plan of exactly one pass, used to benchmark a single radix.
    ///
    /// `nx` is the complex-domain width. With `p > 1` the pass is a non-first
    /// stage and must read a buffer; with `p < radix` it must write one.
    #[allow(clippy::too_many_arguments)]
    pub fn single_pass(
        backend: &mut B,
        cache: &mut ProgramCache<B::Program>,
        nx: u32,
        ny: u32,
        radix: u32,
        p: u32,
        mode: Mode,
        input_target: Target,
        output_target: Target,
        options: &FftOptions,
    ) -> Result<Self, FftError> {
        options.validate()?;
        if !nx.is_power_of_two() || !ny.is_power_of_two() {
            return Err(FftError::NotPowerOfTwo { nx, ny });
        }
        if p != 1 && input_target != Target::LinearBuffer {
            return Err(FftError::InvalidConfig(
                "p != 1 is only supported with a buffer input".into(),
            ));
        }
        if p < radix && output_target != Target::LinearBuffer {
            return Err(FftError::InvalidConfig(
                "p < radix is only supported with a buffer output".into(),
            ));
        }

        let perf = &options.performance;
        let direction = if mode == Mode::ResolveComplexToReal {
            Direction::Inverse
        } else {
            Direction::Forward
        };
        let step = if mode.is_resolve() {
            build_resolve_step(
                nx,
                ny,
                WorkgroupSize {
                    x: perf.workgroup_size_x,
                    y: perf.workgroup_size_y,
                    z: 1,
                },
            )
        } else {
            build_step(
                nx,
                ny,
                mode,
                perf.vector_size,
                perf.shared_banked,
                radix,
                WorkgroupSize {
                    x: perf.workgroup_size_x,
                    y: perf.workgroup_size_y,
                    z: radix_to_wg_z(radix),
                },
                false,
            )
        };

        let parameters = Parameters {
            workgroup_size: step.workgroup_size,
            radix: step.radix,
            vector_size: step.vector_size,
            direction,
            mode,
            input_target,
            output_target,
            first_stage: p == 1,
            pow2_stride: false,
            shared_banked: step.shared_banked,
            precision: options.precision,
        };
        let pass = Self::realize(backend, cache, parameters, &step, p, nx, ny)?;

        let kind = if mode.is_dual() {
            TransformKind::ComplexToComplexDual
        } else {
            TransformKind::ComplexToComplex
        };
        Ok(Self {
            desc: TransformDesc {
                nx,
                ny,
                kind,
                direction,
                input_target,
                output_target,
            },
            passes: vec![pass],
            splits: [vec![step], Vec::new()],
            scratch: Vec::new(),
            cost: 0.0,
        })
    }

    fn realize(
        backend: &mut B,
        cache: &mut ProgramCache<B::Program>,
        parameters: Parameters,
        step: &RadixStep,
        p: u32,
        nx: u32,
        ny: u32,
    ) -> Result<Pass<B::Program>, FftError> {
        if !step.is_valid() {
            return Err(FftError::EmptyDispatch {
                radix: step.radix,
                mode: parameters.mode,
            });
        }
        let program = cache.get_or_build(backend, &parameters)?;
        Ok(Pass {
            parameters,
            uniforms: PassUniforms::new(p, nx, ny),
            workgroups_x: step.workgroups_x,
            workgroups_y: step.workgroups_y,
            program,
            barrier: None,
        })
    }

    fn create_scratch(
        backend: &mut B,
        desc: &TransformDesc,
        options: &FftOptions,
        passes: usize,
    ) -> Result<Vec<B::Resource>, FftError> {
        let count = passes.saturating_sub(1).min(2);
        // Real transforms pad rows to N / 2 + 1 complex values, so size by
        // the full real width.
        let elements = u64::from(desc.nx) * u64::from(desc.ny);
        (0..count)
            .map(|i| {
                backend
                    .create_buffer(&BufferDesc {
                        label: format!("fft_scratch_{i}"),
                        elements,
                        components: desc.kind.components(),
                        fp16: options.precision.output_fp16,
                    })
                    .map_err(FftError::backend)
            })
            .collect()
    }

    pub fn desc(&self) -> &TransformDesc {
        &self.desc
    }

    pub fn passes(&self) -> &[Pass<B::Program>] {
        &self.passes
    }

    /// Radix steps per axis, in execution order.
    pub fn radix_splits(&self) -> &[Vec<RadixStep>; 2] {
        &self.splits
    }

    /// Estimated cost accumulated over both axes.
    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn scratch_buffers(&self) -> usize {
        self.scratch.len()
    }

    /// Whether [`FftPlan::process`] needs an auxiliary input.
    pub fn convolves(&self) -> bool {
        self.desc.direction == Direction::InverseConvolve
    }

    /// Records the transform of `input` into `output`.
    ///
    /// `aux` is multiplied into the input of a convolving plan. No barrier
    /// is issued after the last pass.
    pub fn process(
        &self,
        backend: &mut B,
        output: &B::Resource,
        input: &B::Resource,
        aux: Option<&B::Resource>,
    ) -> Result<(), FftError> {
        executor::process(backend, &self.passes, &self.scratch, output, input, aux)
    }

    /// Mean seconds per transform.
    pub fn bench(
        &self,
        backend: &mut B,
        output: &B::Resource,
        input: &B::Resource,
        params: &BenchParams,
    ) -> Result<f64, FftError> {
        if self.convolves() {
            return Err(FftError::MissingAuxInput);
        }
        backend.finish().map_err(FftError::backend)?;
        for _ in 0..params.warmup {
            self.process(backend, output, input, None)?;
        }
        backend.finish().map_err(FftError::backend)?;

        let start = Instant::now();
        let mut total = 0.0;
        let mut runs = 0u32;
        for i in 0..params.iterations {
            if i > 0 && start.elapsed().as_secs_f64() >= params.timeout {
                break;
            }
            let iteration = Instant::now();
            for _ in 0..params.dispatches {
                self.process(backend, output, input, None)?;
                backend
                    .memory_barrier(Barrier::All)
                    .map_err(FftError::backend)?;
                runs += 1;
            }
            backend.finish().map_err(FftError::backend)?;
            total += iteration.elapsed().as_secs_f64();
        }

        Ok(if runs == 0 { 0.0 } else { total / f64::from(runs) })
    }
}

/// Builder for [`FftPlan`].
#[derive(Debug, Clone)]
pub struct FftPlanBuilder<'a> {
    desc: TransformDesc,
    options: FftOptions,
    wisdom: Option<&'a Wisdom>,
}

impl<'a> FftPlanBuilder<'a> {
    pub fn new(nx: u32, ny: u32) -> Self {
        Self {
            desc: TransformDesc::new(nx, ny, TransformKind::ComplexToComplex, Direction::Forward),
            options: FftOptions::default(),
            wisdom: None,
        }
    }

    pub fn kind(mut self, kind: TransformKind) -> Self {
        self.desc.kind = kind;
        self
    }
    pub fn direction(mut self, direction: Direction) -> Self {
        self.desc.direction = direction;
        self
    }
    pub fn input_target(mut self, target: Target) -> Self {
        self.desc.input_target = target;
        self
    }
    pub fn output_target(mut self, target: Target) -> Self {
        self.desc.output_target = target;
        self
    }
    pub fn options(mut self, options: FftOptions) -> Self {
        self.options = options;
        self
    }
    pub fn normalize(mut self, normalize: bool) -> Self {
        self.options.precision.normalize = normalize;
        self
    }
    pub fn wisdom(mut self, wisdom: &'a Wisdom) -> Self {
        self.wisdom = Some(wisdom);
        self
    }

    pub fn build<B: ComputeBackend>(
        self,
        backend: &mut B,
        cache: &mut ProgramCache<B::Program>,
    ) -> Result<FftPlan<B>, FftError> {
        let empty = Wisdom::new();
        let wisdom = self.wisdom.unwrap_or(&empty);
        FftPlan::new(backend, cache, self.desc, &self.options, wisdom)
    }
}
