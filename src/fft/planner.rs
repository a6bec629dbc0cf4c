//! Radix selection.
//!
//! Splits a power-of-two axis length into radix 4/8/16/64 passes with the
//! lowest total estimated cost, by dynamic programming over exponents.

use super::options::{FftOptions, PerformanceOptions};
use super::radix::{build_step, is_radix_feasible, radix_to_wg_z, RadixStep};
use super::types::{Mode, Target, WorkgroupSize};
use super::wisdom::{CostModel, Wisdom, WisdomKey};
use super::FftError;

/// Radices with a dedicated butterfly kernel.
pub const SUPPORTED_RADICES: [u32; 4] = [4, 8, 16, 64];

/// Winning factorization of one axis.
#[derive(Debug, Clone, PartialEq)]
pub struct RadixSplit {
    /// Largest radix first.
    pub radices: Vec<u32>,
    pub cost: f64,
}

impl RadixSplit {
    fn empty() -> Self {
        Self {
            radices: Vec::new(),
            cost: 0.0,
        }
    }
}

/// Best known way to transform `2^i` points.
#[derive(Debug, Clone)]
struct Candidate {
    cost: f64,
    radices: Vec<u32>,
}

fn merge(a: &Candidate, b: &Candidate) -> Candidate {
    let mut radices = a.radices.clone();
    radices.extend_from_slice(&b.radices);
    Candidate {
        cost: a.cost + b.cost,
        radices,
    }
}

/// Plans the passes along one axis of an `nx` x `ny` complex transform.
pub struct RadixPlanner<'a> {
    nx: u32,
    ny: u32,
    mode: Mode,
    options: &'a FftOptions,
    wisdom: &'a Wisdom,
}

impl<'a> RadixPlanner<'a> {
    pub fn new(nx: u32, ny: u32, mode: Mode, options: &'a FftOptions, wisdom: &'a Wisdom) -> Self {
        Self {
            nx,
            ny,
            mode,
            options,
            wisdom,
        }
    }

    /// Length of the axis this planner factors.
    pub fn axis_length(&self) -> u32 {
        if self.mode.is_vertical() {
            self.ny
        } else {
            self.nx
        }
    }

    fn linear_options(&self, radix: u32) -> PerformanceOptions {
        let key = WisdomKey::linear(self.nx, self.ny, radix, self.mode, self.options.precision);
        self.wisdom
            .find_optimal_options_or_default(&key, &self.options.performance)
    }

    fn feasible(&self, radix: u32) -> bool {
        let opts = self.linear_options(radix);
        is_radix_feasible(
            self.nx,
            self.ny,
            self.mode,
            opts.vector_size,
            radix,
            WorkgroupSize {
                x: opts.workgroup_size_x,
                y: opts.workgroup_size_y,
                z: radix_to_wg_z(radix),
            },
        )
    }

    /// Cheapest radix factorization of the axis.
    ///
    /// An axis of length 1 needs no passes and yields an empty split.
    pub fn plan(&self) -> Result<RadixSplit, FftError> {
        if self.mode.is_resolve() {
            return Err(FftError::InvalidConfig(format!(
                "{:?} is not a radix mode",
                self.mode
            )));
        }
        let n = self.axis_length();
        if n == 1 {
            return Ok(RadixSplit::empty());
        }
        let log_n = n.trailing_zeros() as usize;

        let model = CostModel::new(self.wisdom, self.options.precision);
        let mut table: Vec<Option<Candidate>> = vec![None; log_n.max(6) + 1];
        for radix in SUPPORTED_RADICES {
            if self.feasible(radix) {
                table[radix.trailing_zeros() as usize] = Some(Candidate {
                    cost: model.cost(self.nx, self.ny, radix, self.mode),
                    radices: vec![radix],
                });
            }
        }

        for i in 4..=log_n {
            let mut best = table[i].clone();
            let mut r = 2;
            while i - r >= r {
                if let (Some(a), Some(b)) = (&table[r], &table[i - r]) {
                    let merged = merge(a, b);
                    if best.as_ref().map_or(true, |c| merged.cost < c.cost) {
                        best = Some(merged);
                    }
                }
                r += 1;
            }
            table[i] = best;
        }

        let Some(best) = table[log_n].take() else {
            return Err(FftError::NoFeasibleSplit { n, mode: self.mode });
        };

        let mut radices = best.radices;
        radices.sort_unstable_by(|a, b| b.cmp(a));
        let product: u32 = radices.iter().product();
        assert_eq!(product, n, "radix split {radices:?} does not multiply to {n}");

        log::debug!(
            "Radix split for N = {} ({:?}): {:?}, cost {:.3e}",
            n,
            self.mode,
            radices,
            best.cost
        );
        Ok(RadixSplit {
            radices,
            cost: best.cost,
        })
    }

    /// Sizes one step per radix of `split`.
    ///
    /// The split was costed with buffer to buffer wisdom. The first and last
    /// steps are re-sized with wisdom for the actual input and output targets,
    /// falling back to the buffer to buffer options.
    pub fn build_steps(
        &self,
        split: &RadixSplit,
        input_target: Target,
        output_target: Target,
        pow2_stride: bool,
    ) -> Vec<RadixStep> {
        let count = split.radices.len();
        split
            .radices
            .iter()
            .enumerate()
            .map(|(index, &radix)| {
                let first = index == 0;
                let last = index + 1 == count;
                let linear = self.linear_options(radix);
                let key = WisdomKey::new(
                    self.nx,
                    self.ny,
                    radix,
                    self.mode,
                    if first { input_target } else { Target::LinearBuffer },
                    if last { output_target } else { Target::LinearBuffer },
                    self.options.precision,
                );
                let opts = self.wisdom.find_optimal_options_or_default(&key, &linear);
                build_step(
                    self.nx,
                    self.ny,
                    self.mode,
                    opts.vector_size,
                    opts.shared_banked,
                    radix,
                    WorkgroupSize {
                        x: opts.workgroup_size_x,
                        y: opts.workgroup_size_y,
                        z: radix_to_wg_z(radix),
                    },
                    pow2_stride,
                )
            })
            .collect()
    }
}
