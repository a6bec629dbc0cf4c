//! Measured performance data and the cost model built on top of it.
//!
//! Wisdom maps a single pass configuration to the fastest
//! [`PerformanceOptions`] found for it and the measured cost. Planning uses
//! the cost to choose radix splits and the options to size each pass.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::backend::{BufferDesc, ComputeBackend, ImageDesc};
use super::cache::ProgramCache;
use super::options::{FftOptions, PerformanceOptions};
use super::plan::FftPlan;
use super::planner::SUPPORTED_RADICES;
use super::types::{Mode, PixelFormat, PrecisionOptions, Target, TransformKind};
use super::FftError;

/// Added to `log2(radix)` by the fallback heuristic.
pub const FALLBACK_COST_BIAS: f64 = 2.0;

/// Pessimistic cost estimate used when no wisdom exists.
pub fn heuristic_cost(nx: u32, ny: u32, radix: u32) -> f64 {
    f64::from(nx) * f64::from(ny) * (f64::from(radix).log2() + FALLBACK_COST_BIAS)
}

/// Identity of one measured pass configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WisdomKey {
    pub nx: u32,
    pub ny: u32,
    pub radix: u32,
    pub mode: Mode,
    pub input_target: Target,
    pub output_target: Target,
    pub precision: PrecisionOptions,
}

impl WisdomKey {
    pub fn new(
        nx: u32,
        ny: u32,
        radix: u32,
        mode: Mode,
        input_target: Target,
        output_target: Target,
        precision: PrecisionOptions,
    ) -> Self {
        Self {
            nx,
            ny,
            radix,
            mode,
            input_target,
            output_target,
            precision,
        }
    }

    /// Same shape, buffer to buffer.
    pub fn linear(nx: u32, ny: u32, radix: u32, mode: Mode, precision: PrecisionOptions) -> Self {
        Self::new(
            nx,
            ny,
            radix,
            mode,
            Target::LinearBuffer,
            Target::LinearBuffer,
            precision,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tristate {
    False,
    True,
    DontCare,
}

impl Tristate {
    fn allows(self, value: bool) -> bool {
        match self {
            Tristate::DontCare => true,
            Tristate::True => value,
            Tristate::False => !value,
        }
    }
}

/// Hardware bounds on the search space of [`Wisdom::learn_optimal_options`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticWisdom {
    pub min_workgroup_size: u32,
    /// Minimum for radix 16 and 64, which share data through workgroup memory.
    pub min_workgroup_size_shared: u32,
    pub max_workgroup_size: u32,
    pub min_vector_size: u32,
    pub max_vector_size: u32,
    pub shared_banked: Tristate,
}

impl Default for StaticWisdom {
    fn default() -> Self {
        Self {
            min_workgroup_size: 1,
            min_workgroup_size_shared: 1,
            max_workgroup_size: 128,
            min_vector_size: 2,
            max_vector_size: 4,
            shared_banked: Tristate::DontCare,
        }
    }
}

impl StaticWisdom {
    /// Bounds for a known GPU family, matched on the adapter name.
    ///
    /// `max_invocations` is the device limit on invocations per workgroup.
    pub fn from_renderer(renderer: &str, max_invocations: u32) -> Self {
        if renderer.contains("GeForce") {
            log::info!("Detected GeForce GPU");
            Self {
                // Warp size.
                min_workgroup_size: 32,
                min_workgroup_size_shared: 32,
                max_workgroup_size: max_invocations.min(256),
                min_vector_size: 2,
                max_vector_size: 2,
                shared_banked: Tristate::True,
            }
        } else if renderer.contains("Radeon") {
            log::info!("Detected Radeon GPU");
            Self {
                // Wavefront size.
                min_workgroup_size: 64,
                min_workgroup_size_shared: 128,
                max_workgroup_size: max_invocations.min(256),
                min_vector_size: 2,
                max_vector_size: 4,
                shared_banked: Tristate::True,
            }
        } else if renderer.contains("Mali") {
            log::info!("Detected Mali GPU");
            Self {
                min_workgroup_size: 4,
                min_workgroup_size_shared: 4,
                max_workgroup_size: 64,
                min_vector_size: 4,
                max_vector_size: 4,
                shared_banked: Tristate::False,
            }
        } else {
            Self::default()
        }
    }
}

/// Benchmark settings used while learning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchParams {
    pub warmup: u32,
    pub iterations: u32,
    /// Transforms submitted per timed iteration.
    pub dispatches: u32,
    /// Seconds after which no new iteration is started.
    pub timeout: f64,
}

impl Default for BenchParams {
    fn default() -> Self {
        Self {
            warmup: 2,
            iterations: 20,
            dispatches: 50,
            timeout: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct WisdomEntry {
    key: WisdomKey,
    cost: f64,
    performance: PerformanceOptions,
}

#[derive(Debug, Serialize, Deserialize)]
struct WisdomFile {
    entries: Vec<WisdomEntry>,
}

/// Library of measured pass costs.
#[derive(Debug, Clone, Default)]
pub struct Wisdom {
    library: HashMap<WisdomKey, (f64, PerformanceOptions)>,
    static_wisdom: StaticWisdom,
    bench_params: BenchParams,
}

impl Wisdom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_static_wisdom(&mut self, static_wisdom: StaticWisdom) {
        self.static_wisdom = static_wisdom;
    }

    pub fn static_wisdom(&self) -> &StaticWisdom {
        &self.static_wisdom
    }

    pub fn set_bench_params(&mut self, params: BenchParams) {
        self.bench_params = params;
    }

    pub fn bench_params(&self) -> &BenchParams {
        &self.bench_params
    }

    pub fn len(&self) -> usize {
        self.library.len()
    }

    pub fn is_empty(&self) -> bool {
        self.library.is_empty()
    }

    /// Records a measurement, replacing any previous one for `key`.
    pub fn insert(&mut self, key: WisdomKey, cost: f64, performance: PerformanceOptions) {
        self.library.insert(key, (cost, performance));
    }

    /// Measured cost and options for an exact pass configuration.
    pub fn find_optimal_options(&self, key: &WisdomKey) -> Option<(f64, PerformanceOptions)> {
        self.library.get(key).copied()
    }

    /// Measured options for `key`, or `base` when nothing was measured.
    pub fn find_optimal_options_or_default(
        &self,
        key: &WisdomKey,
        base: &PerformanceOptions,
    ) -> PerformanceOptions {
        match self.library.get(key) {
            Some((_, performance)) => *performance,
            None => {
                log::debug!(
                    "No wisdom for {}x{} radix {} {:?} ({:?} -> {:?}), using defaults",
                    key.nx,
                    key.ny,
                    key.radix,
                    key.mode,
                    key.input_target,
                    key.output_target
                );
                *base
            }
        }
    }

    pub fn to_json(&self) -> Result<String, FftError> {
        let mut entries: Vec<WisdomEntry> = self
            .library
            .iter()
            .map(|(key, (cost, performance))| WisdomEntry {
                key: *key,
                cost: *cost,
                performance: *performance,
            })
            .collect();
        // Stable output for diffing saved files.
        entries.sort_by_key(|e| (e.key.nx, e.key.ny, e.key.radix, e.key.mode as u8));
        Ok(serde_json::to_string_pretty(&WisdomFile { entries })?)
    }

    /// Merges entries from JSON into this library.
    ///
    /// Nothing is merged if any entry carries invalid options.
    pub fn merge_json(&mut self, json: &str) -> Result<usize, FftError> {
        let file: WisdomFile = serde_json::from_str(json)?;
        for entry in &file.entries {
            entry.performance.validate()?;
        }
        let count = file.entries.len();
        for entry in file.entries {
            self.library.insert(entry.key, (entry.cost, entry.performance));
        }
        Ok(count)
    }

    pub fn from_json(json: &str) -> Result<Self, FftError> {
        let mut wisdom = Self::new();
        wisdom.merge_json(json)?;
        Ok(wisdom)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), FftError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FftError> {
        let path = path.as_ref();
        let wisdom = Self::from_json(&fs::read_to_string(path)?)?;
        log::info!("Loaded {} wisdom entries from {}", wisdom.len(), path.display());
        Ok(wisdom)
    }

    /// Returns the known optimum for `key`, benchmarking it first if needed.
    pub fn learn_optimal_options<B: ComputeBackend>(
        &mut self,
        backend: &mut B,
        key: WisdomKey,
    ) -> Result<(f64, PerformanceOptions), FftError> {
        if let Some(known) = self.find_optimal_options(&key) {
            return Ok(known);
        }
        let (cost, performance) = self.study(backend, &key)?;
        self.insert(key, cost, performance);
        Ok((cost, performance))
    }

    /// Learns every pass configuration a `kind` transform of `nx` x `ny` can use.
    ///
    /// Configurations the default options cannot build are skipped.
    #[allow(clippy::too_many_arguments)]
    pub fn learn_optimal_options_exhaustive<B: ComputeBackend>(
        &mut self,
        backend: &mut B,
        nx: u32,
        ny: u32,
        kind: TransformKind,
        input_target: Target,
        output_target: Target,
        precision: PrecisionOptions,
    ) -> Result<(), FftError> {
        let resolve = kind.needs_resolve();
        let nx = if resolve { nx >> 1 } else { nx };
        let (vertical, horizontal) = if kind == TransformKind::ComplexToComplexDual {
            (Mode::VerticalDual, Mode::HorizontalDual)
        } else {
            (Mode::Vertical, Mode::Horizontal)
        };
        let lb = Target::LinearBuffer;

        for radix in SUPPORTED_RADICES {
            let mut targets = vec![(lb, lb)];
            if input_target != lb {
                targets.push((input_target, lb));
            }
            if output_target != lb {
                targets.push((lb, output_target));
            }
            for (in_t, out_t) in targets {
                if ny > 1 {
                    let key = WisdomKey::new(nx, ny, radix, vertical, in_t, out_t, precision);
                    self.learn_or_skip(backend, key)?;
                }
                let key = WisdomKey::new(nx, ny, radix, horizontal, in_t, out_t, precision);
                self.learn_or_skip(backend, key)?;
            }
        }

        if resolve {
            let mode = if kind == TransformKind::ComplexToReal {
                Mode::ResolveComplexToReal
            } else {
                Mode::ResolveRealToComplex
            };
            let mut resolve_precision = precision;
            resolve_precision.input_fp16 = precision.output_fp16;
            let mut resolve_input = lb;
            // An Nx1 complex-to-real transform starts with the resolve pass.
            if kind == TransformKind::ComplexToReal && ny == 1 {
                resolve_precision = precision;
                resolve_input = input_target;
            }
            let resolve_output = if ny == 1 && mode == Mode::ResolveRealToComplex {
                output_target
            } else {
                lb
            };
            let key = WisdomKey::new(
                nx,
                ny,
                2,
                mode,
                resolve_input,
                resolve_output,
                resolve_precision,
            );
            self.learn_or_skip(backend, key)?;
        }
        Ok(())
    }

    fn learn_or_skip<B: ComputeBackend>(
        &mut self,
        backend: &mut B,
        key: WisdomKey,
    ) -> Result<(), FftError> {
        match self.learn_optimal_options(backend, key) {
            Ok(_) => Ok(()),
            Err(e @ (FftError::Backend(_) | FftError::Io(_))) => Err(e),
            Err(e) => {
                log::debug!("Skipping wisdom for radix {} {:?}: {}", key.radix, key.mode, e);
                Ok(())
            }
        }
    }

    /// Every option set worth benchmarking for `key` under the static bounds.
    pub fn candidate_options(&self, key: &WisdomKey) -> Vec<PerformanceOptions> {
        const VECTOR_SIZES: [u32; 3] = [2, 4, 8];
        const WORKGROUP_X: [u32; 7] = [4, 8, 16, 32, 64, 128, 256];
        const WORKGROUP_Y: [u32; 4] = [1, 2, 4, 8];

        let sw = &self.static_wisdom;
        let resolve = key.mode.is_resolve();
        let dual = key.mode.is_dual();
        let precision = &key.precision;
        let all_fp16 = precision.fp16 && precision.input_fp16 && precision.output_fp16;

        let min_workgroup = if key.radix >= 16 {
            sw.min_workgroup_size_shared
        } else {
            sw.min_workgroup_size
        };
        let (min_vector, max_vector) = if dual {
            (sw.min_vector_size.max(4), sw.max_vector_size.max(4))
        } else {
            (sw.min_vector_size, sw.max_vector_size)
        };

        let mut candidates = Vec::new();
        for shared_banked in [false, true] {
            // Banking only matters for the shared-memory radices.
            if shared_banked && key.radix < 16 {
                continue;
            }
            if key.radix >= 16 && !sw.shared_banked.allows(shared_banked) {
                continue;
            }
            for vector_size in VECTOR_SIZES {
                if resolve && (vector_size != 2 || shared_banked) {
                    continue;
                }
                if vector_size == 8 && !all_fp16 {
                    continue;
                }
                // Dual passes bump narrower vectors to 4 anyway.
                if dual && vector_size < 4 {
                    continue;
                }
                if !resolve && !(min_vector..=max_vector).contains(&vector_size) {
                    continue;
                }
                for workgroup_size_x in WORKGROUP_X {
                    for workgroup_size_y in WORKGROUP_Y {
                        let size = workgroup_size_x * workgroup_size_y;
                        if size > sw.max_workgroup_size || size < min_workgroup {
                            continue;
                        }
                        if key.ny == 1 && workgroup_size_y > 1 {
                            continue;
                        }
                        candidates.push(PerformanceOptions {
                            workgroup_size_x,
                            workgroup_size_y,
                            vector_size,
                            shared_banked,
                        });
                    }
                }
            }
        }
        candidates
    }

    fn study<B: ComputeBackend>(
        &self,
        backend: &mut B,
        key: &WisdomKey,
    ) -> Result<(f64, PerformanceOptions), FftError> {
        let started = Instant::now();
        let mut cache = ProgramCache::new();
        let input = create_study_input(backend, key)?;
        let output = create_study_output(backend, key)?;

        let mut best = PerformanceOptions::default();
        let mut minimum_cost = self.bench_candidate(backend, &mut cache, key, &best, &output, &input)?;

        let mut tested = 0usize;
        for performance in self.candidate_options(key) {
            match self.bench_candidate(backend, &mut cache, key, &performance, &output, &input) {
                Ok(cost) => {
                    tested += 1;
                    log::debug!(
                        "Wisdom run radix {} {:?}: wg ({}, {}) vec {} banked {} -> {:.3e}",
                        key.radix,
                        key.mode,
                        performance.workgroup_size_x,
                        performance.workgroup_size_y,
                        performance.vector_size,
                        performance.shared_banked,
                        cost
                    );
                    if cost < minimum_cost {
                        minimum_cost = cost;
                        best = performance;
                    }
                }
                Err(e @ FftError::Backend(_)) => return Err(e),
                // Options the pass cannot be built with are not candidates.
                Err(_) => {}
            }
        }

        log::info!(
            "Learned {}x{} radix {} {:?}: {:.3e}s per pass, {} variants tested in {:.2?}",
            key.nx,
            key.ny,
            key.radix,
            key.mode,
            minimum_cost,
            tested,
            started.elapsed()
        );
        Ok((minimum_cost, best))
    }

    #[allow(clippy::too_many_arguments)]
    fn bench_candidate<B: ComputeBackend>(
        &self,
        backend: &mut B,
        cache: &mut ProgramCache<B::Program>,
        key: &WisdomKey,
        performance: &PerformanceOptions,
        output: &B::Resource,
        input: &B::Resource,
    ) -> Result<f64, FftError> {
        let options = FftOptions {
            performance: *performance,
            precision: key.precision,
        };
        // Non-first passes can only read buffers, and p * radix must fit the axis.
        let axis = if key.mode.is_vertical() { key.ny } else { key.nx };
        let p = if key.input_target == Target::LinearBuffer {
            key.radix.min(axis / key.radix).max(1)
        } else {
            1
        };
        let plan = FftPlan::single_pass(
            backend,
            cache,
            key.nx,
            key.ny,
            key.radix,
            p,
            key.mode,
            key.input_target,
            key.output_target,
            &options,
        )?;
        plan.bench(backend, output, input, &self.bench_params)
    }
}

/// Floats per complex-domain element for study resources.
fn mode_to_size(mode: Mode) -> u32 {
    match mode {
        Mode::VerticalDual
        | Mode::HorizontalDual
        | Mode::ResolveRealToComplex
        | Mode::ResolveComplexToReal => 4,
        Mode::Horizontal | Mode::Vertical => 2,
    }
}

fn study_image(label: &str, key: &WisdomKey, target: Target) -> ImageDesc {
    let width = if target == Target::RealImage || key.mode.is_resolve() {
        2 * key.nx
    } else {
        key.nx
    };
    let format = match target {
        Target::RealImage => PixelFormat::R32Float,
        _ if key.mode.is_dual() => PixelFormat::Rgba16Float,
        _ => PixelFormat::Rg32Float,
    };
    ImageDesc {
        label: label.to_string(),
        width,
        height: key.ny,
        format,
    }
}

fn study_buffer(label: &str, key: &WisdomKey, fp16: bool) -> BufferDesc {
    let components = key.mode.components();
    let floats = u64::from(mode_to_size(key.mode)) * u64::from(key.nx) * u64::from(key.ny);
    BufferDesc {
        label: label.to_string(),
        elements: floats / u64::from(components),
        components,
        fp16,
    }
}

fn create_study_input<B: ComputeBackend>(
    backend: &mut B,
    key: &WisdomKey,
) -> Result<B::Resource, FftError> {
    let resource = if key.input_target.is_image() {
        backend.create_image(&study_image("wisdom_input", key, key.input_target))
    } else {
        backend.create_buffer(&study_buffer("wisdom_input", key, key.precision.input_fp16))
    };
    resource.map_err(FftError::backend)
}

fn create_study_output<B: ComputeBackend>(
    backend: &mut B,
    key: &WisdomKey,
) -> Result<B::Resource, FftError> {
    let resource = if key.output_target.is_image() {
        backend.create_image(&study_image("wisdom_output", key, key.output_target))
    } else {
        backend.create_buffer(&study_buffer("wisdom_output", key, key.precision.output_fp16))
    };
    resource.map_err(FftError::backend)
}

/// Cost lookups for the radix planner.
///
/// Only buffer to buffer wisdom is consulted: the split is chosen for the
/// bulk of the passes, first and last passes are refined afterwards.
#[derive(Debug, Clone, Copy)]
pub struct CostModel<'a> {
    wisdom: &'a Wisdom,
    precision: PrecisionOptions,
}

impl<'a> CostModel<'a> {
    pub fn new(wisdom: &'a Wisdom, precision: PrecisionOptions) -> Self {
        Self { wisdom, precision }
    }

    pub fn cost(&self, nx: u32, ny: u32, radix: u32, mode: Mode) -> f64 {
        let key = WisdomKey::linear(nx, ny, radix, mode, self.precision);
        match self.wisdom.find_optimal_options(&key) {
            Some((cost, _)) => cost,
            None => heuristic_cost(nx, ny, radix),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heuristic_prefers_large_radices() {
        let c16 = heuristic_cost(64, 64, 16);
        let c4 = heuristic_cost(64, 64, 4);
        assert!(c16 < 2.0 * c4);
        assert_eq!(heuristic_cost(1, 1, 4), 4.0);
    }

    #[test]
    fn test_cost_model_prefers_wisdom() {
        let mut wisdom = Wisdom::new();
        let precision = PrecisionOptions::default();
        let key = WisdomKey::linear(256, 256, 8, Mode::Horizontal, precision);
        wisdom.insert(key, 0.25, PerformanceOptions::default());

        let model = CostModel::new(&wisdom, precision);
        assert_eq!(model.cost(256, 256, 8, Mode::Horizontal), 0.25);
        assert_eq!(
            model.cost(256, 256, 4, Mode::Horizontal),
            heuristic_cost(256, 256, 4)
        );
        // Different precision is a different key.
        let fp16 = PrecisionOptions {
            fp16: true,
            ..precision
        };
        let model = CostModel::new(&wisdom, fp16);
        assert_eq!(
            model.cost(256, 256, 8, Mode::Horizontal),
            heuristic_cost(256, 256, 8)
        );
    }

    #[test]
    fn test_find_or_default() {
        let mut wisdom = Wisdom::new();
        let key = WisdomKey::linear(64, 64, 16, Mode::Vertical, PrecisionOptions::default());
        let base = PerformanceOptions::default();
        assert_eq!(wisdom.find_optimal_options_or_default(&key, &base), base);

        let tuned = PerformanceOptions {
            workgroup_size_x: 16,
            ..base
        };
        wisdom.insert(key, 1.0, tuned);
        assert_eq!(wisdom.find_optimal_options_or_default(&key, &base), tuned);
    }

    #[test]
    fn test_static_wisdom_from_renderer() {
        let geforce = StaticWisdom::from_renderer("NVIDIA GeForce RTX 3080", 1024);
        assert_eq!(geforce.min_workgroup_size, 32);
        assert_eq!(geforce.max_workgroup_size, 256);
        assert_eq!(geforce.shared_banked, Tristate::True);

        let radeon = StaticWisdom::from_renderer("AMD Radeon RX 6800", 128);
        assert_eq!(radeon.max_workgroup_size, 128);

        let mali = StaticWisdom::from_renderer("Mali-G78", 512);
        assert_eq!((mali.min_vector_size, mali.max_vector_size), (4, 4));

        assert_eq!(StaticWisdom::from_renderer("llvmpipe", 256), StaticWisdom::default());
    }

    #[test]
    fn test_candidates_respect_bounds() {
        let mut wisdom = Wisdom::new();
        wisdom.set_static_wisdom(StaticWisdom::from_renderer("Mali-T880", 256));
        let precision = PrecisionOptions::default();

        let key = WisdomKey::linear(256, 256, 16, Mode::Horizontal, precision);
        let candidates = wisdom.candidate_options(&key);
        assert!(!candidates.is_empty());
        for c in &candidates {
            assert_eq!(c.vector_size, 4);
            assert!(!c.shared_banked);
            assert!(c.workgroup_size_x * c.workgroup_size_y <= 64);
        }

        let resolve = WisdomKey::linear(128, 1, 2, Mode::ResolveRealToComplex, precision);
        for c in wisdom.candidate_options(&resolve) {
            assert_eq!(c.vector_size, 2);
            assert_eq!(c.workgroup_size_y, 1);
        }
    }

    #[test]
    fn test_vec8_needs_full_fp16() {
        let wisdom = {
            let mut w = Wisdom::new();
            w.set_static_wisdom(StaticWisdom {
                max_vector_size: 8,
                ..StaticWisdom::default()
            });
            w
        };
        let half = PrecisionOptions {
            fp16: true,
            input_fp16: true,
            output_fp16: true,
            normalize: false,
        };
        let key = WisdomKey::linear(64, 64, 4, Mode::Horizontal, half);
        assert!(wisdom.candidate_options(&key).iter().any(|c| c.vector_size == 8));

        let key = WisdomKey::linear(64, 64, 4, Mode::Horizontal, PrecisionOptions::default());
        assert!(wisdom.candidate_options(&key).iter().all(|c| c.vector_size != 8));
    }

    #[test]
    fn test_json_roundtrip() {
        let mut wisdom = Wisdom::new();
        let key = WisdomKey::new(
            128,
            64,
            64,
            Mode::VerticalDual,
            Target::Image,
            Target::LinearBuffer,
            PrecisionOptions::default(),
        );
        let perf = PerformanceOptions {
            workgroup_size_x: 8,
            workgroup_size_y: 2,
            vector_size: 4,
            shared_banked: true,
        };
        wisdom.insert(key, 3.5e-5, perf);

        let restored = Wisdom::from_json(&wisdom.to_json().unwrap()).unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored.find_optimal_options(&key), Some((3.5e-5, perf)));
    }

    #[test]
    fn test_merge_rejects_invalid_options() {
        let key = WisdomKey::linear(256, 4, 4, Mode::Horizontal, PrecisionOptions::default());
        let mut source = Wisdom::new();
        source.insert(
            key,
            1.0,
            PerformanceOptions {
                workgroup_size_x: 3,
                ..PerformanceOptions::default()
            },
        );
        let json = source.to_json().unwrap();

        let mut wisdom = Wisdom::new();
        assert!(matches!(
            wisdom.merge_json(&json),
            Err(FftError::InvalidConfig(_))
        ));
        assert!(wisdom.is_empty());
    }
}
