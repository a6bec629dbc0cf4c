//! Workgroup sizing and dispatch grids for a single radix pass.
//!
//! The same arithmetic decides feasibility during planning (a step with a
//! zero grid in either axis is infeasible) and sizes the final passes.

use super::types::{Mode, WorkgroupSize};

/// One stage of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadixStep {
    pub workgroup_size: WorkgroupSize,
    pub workgroups_x: u32,
    pub workgroups_y: u32,
    pub radix: u32,
    pub vector_size: u32,
    pub shared_banked: bool,
}

impl RadixStep {
    pub fn is_valid(&self) -> bool {
        self.workgroups_x > 0 && self.workgroups_y > 0
    }
}

/// Invocations along Z cooperating on one radix 16 / 64 butterfly.
pub fn radix_to_wg_z(radix: u32) -> u32 {
    match radix {
        16 => 4,
        64 => 8,
        _ => 1,
    }
}

/// Moves `divisor` into `wg_size` as far as it goes.
///
/// Returns false if the division leaves a remainder.
fn reduce(wg_size: &mut u32, divisor: &mut u32) -> bool {
    if *divisor <= 1 {
        return true;
    }
    if *wg_size >= *divisor {
        let exact = *wg_size % *divisor == 0;
        *wg_size /= *divisor;
        *divisor = 1;
        exact
    } else {
        let exact = *divisor % *wg_size == 0;
        *divisor /= *wg_size;
        *wg_size = 1;
        exact
    }
}

/// `n / d`, or 0 when `d` does not divide `n`.
///
/// A truncated grid would leave part of the axis untransformed.
fn exact_div(n: u32, d: u32) -> u32 {
    if d != 0 && n % d == 0 {
        n / d
    } else {
        0
    }
}

/// Builds the step for one radix pass of an `nx` x `ny` complex transform.
///
/// `size.z` is folded into Y and then X so that the total invocation count
/// stays near `size.x * size.y`. Resolve modes are not radix passes; use
/// [`build_resolve_step`] for those. A grid that would not cover the axis
/// exactly comes back empty.
#[allow(clippy::too_many_arguments)]
pub fn build_step(
    nx: u32,
    ny: u32,
    mode: Mode,
    vector_size: u32,
    shared_banked: bool,
    radix: u32,
    mut size: WorkgroupSize,
    pow2_stride: bool,
) -> RadixStep {
    let mut divisor = size.z;
    let exact = reduce(&mut size.y, &mut divisor) & reduce(&mut size.x, &mut divisor);

    let mut vector_size = vector_size;
    let (workgroups_x, workgroups_y) = match mode {
        // A padded pass transforms N / 2 + 1 columns, so one extra workgroup
        // in X covers the Nyquist column at the cost of some garbage work.
        Mode::Vertical => {
            let columns = exact_div(2 * nx, vector_size * size.x);
            (
                if columns > 0 { columns + u32::from(pow2_stride) } else { 0 },
                exact_div(ny, size.y * radix),
            )
        }
        Mode::VerticalDual => {
            vector_size = vector_size.max(4);
            (
                exact_div(4 * nx, vector_size * size.x),
                exact_div(ny, size.y * radix),
            )
        }
        Mode::Horizontal => (
            exact_div(2 * nx, vector_size * radix * size.x),
            exact_div(ny, size.y),
        ),
        Mode::HorizontalDual => {
            vector_size = vector_size.max(4);
            (
                exact_div(4 * nx, vector_size * radix * size.x),
                exact_div(ny, size.y),
            )
        }
        Mode::ResolveRealToComplex | Mode::ResolveComplexToReal => (0, 0),
    };
    let (workgroups_x, workgroups_y) = if exact {
        (workgroups_x, workgroups_y)
    } else {
        (0, 0)
    };

    RadixStep {
        workgroup_size: size,
        workgroups_x,
        workgroups_y,
        radix,
        vector_size,
        shared_banked,
    }
}

/// Resolve passes always run one complex value per invocation.
pub fn build_resolve_step(nx: u32, ny: u32, size: WorkgroupSize) -> RadixStep {
    RadixStep {
        workgroup_size: size,
        workgroups_x: exact_div(nx, size.x),
        workgroups_y: exact_div(ny, size.y),
        radix: 2,
        vector_size: 2,
        shared_banked: false,
    }
}

/// Dry run of [`build_step`] without padding.
///
/// Padding would round an otherwise empty grid up to one workgroup and make
/// an unusable radix look feasible.
pub fn is_radix_feasible(
    nx: u32,
    ny: u32,
    mode: Mode,
    vector_size: u32,
    radix: u32,
    size: WorkgroupSize,
) -> bool {
    build_step(nx, ny, mode, vector_size, false, radix, size, false).is_valid()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wg(x: u32, y: u32, z: u32) -> WorkgroupSize {
        WorkgroupSize { x, y, z }
    }

    #[test]
    fn test_horizontal_grid() {
        let step = build_step(256, 256, Mode::Horizontal, 2, false, 8, wg(4, 1, 1), false);
        assert_eq!(step.workgroup_size, wg(4, 1, 1));
        assert_eq!(step.workgroups_x, 512 / (2 * 8 * 4));
        assert_eq!(step.workgroups_y, 256);
    }

    #[test]
    fn test_z_folds_into_y_then_x() {
        let step = build_step(256, 256, Mode::Horizontal, 2, false, 16, wg(16, 2, 4), false);
        assert_eq!(step.workgroup_size, wg(8, 1, 4));

        let step = build_step(256, 256, Mode::Vertical, 2, false, 64, wg(4, 1, 8), false);
        assert_eq!(step.workgroup_size, wg(1, 1, 8));
    }

    #[test]
    fn test_padded_vertical_adds_one_group() {
        let plain = build_step(64, 64, Mode::Vertical, 2, false, 4, wg(4, 1, 1), false);
        let padded = build_step(64, 64, Mode::Vertical, 2, false, 4, wg(4, 1, 1), true);
        assert_eq!(padded.workgroups_x, plain.workgroups_x + 1);
        assert_eq!(padded.workgroups_y, plain.workgroups_y);
    }

    #[test]
    fn test_dual_bumps_vector_size() {
        let step = build_step(64, 64, Mode::HorizontalDual, 2, false, 4, wg(4, 1, 1), false);
        assert_eq!(step.vector_size, 4);
        assert_eq!(step.workgroups_x, (4 * 64) / (4 * 4 * 4));
    }

    #[test]
    fn test_small_transform_is_infeasible() {
        assert!(!is_radix_feasible(4, 1, Mode::Horizontal, 4, 64, wg(4, 1, 8)));
        assert!(is_radix_feasible(64, 1, Mode::Horizontal, 2, 4, wg(4, 1, 1)));
    }

    #[test]
    fn test_inexact_grid_is_empty() {
        // 512 floats over 4 x 3 x 2 does not divide; truncating would drop a butterfly.
        let step = build_step(256, 4, Mode::Horizontal, 2, false, 4, wg(3, 1, 1), false);
        assert!(!step.is_valid());
        assert!(!is_radix_feasible(256, 4, Mode::Horizontal, 2, 4, wg(3, 1, 1)));

        let step = build_step(256, 256, Mode::Vertical, 2, false, 16, wg(4, 3, 4), true);
        assert!(!step.is_valid());

        assert!(!build_resolve_step(128, 64, wg(3, 1, 1)).is_valid());
    }

    #[test]
    fn test_resolve_step() {
        let step = build_resolve_step(128, 64, wg(4, 1, 1));
        assert_eq!((step.workgroups_x, step.workgroups_y), (32, 64));
        assert_eq!(step.vector_size, 2);
    }
}
