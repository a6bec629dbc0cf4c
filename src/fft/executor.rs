//! Replays a pass list through a backend.

use super::backend::{ComputeBackend, InputSlot};
use super::plan::Pass;
use super::types::{Direction, PixelFormat, Target};
use super::FftError;

/// Rotating read/write indices over a plan's scratch buffers.
///
/// With two buffers the roles alternate. With one buffer, source and
/// destination coincide; a plan only has one when a single intermediate
/// result is ever live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingPong {
    current: usize,
    len: usize,
}

impl PingPong {
    /// Starts so that the first pass writes buffer 0.
    pub fn new(len: usize) -> Self {
        let len = len.max(1);
        Self {
            current: len - 1,
            len,
        }
    }

    pub fn src_index(&self) -> usize {
        self.current
    }

    pub fn dst_index(&self) -> usize {
        (self.current + 1) % self.len
    }

    pub fn swap(&mut self) {
        self.current = self.dst_index();
    }
}

/// Runs `passes` in order.
///
/// The first pass reads the caller's `input`, the last writes the caller's
/// `output`, and everything in between goes through `scratch`. A program is
/// only rebound when it differs from the previous pass's.
pub fn process<B: ComputeBackend>(
    backend: &mut B,
    passes: &[Pass<B::Program>],
    scratch: &[B::Resource],
    output: &B::Resource,
    input: &B::Resource,
    aux: Option<&B::Resource>,
) -> Result<(), FftError> {
    let Some(first) = passes.first() else {
        return Ok(());
    };
    if first.parameters.direction == Direction::InverseConvolve && aux.is_none() {
        return Err(FftError::MissingAuxInput);
    }
    if (passes.len() > 2 && scratch.len() < 2) || (passes.len() == 2 && scratch.is_empty()) {
        return Err(FftError::InvalidConfig(format!(
            "{} passes need scratch storage, got {} buffers",
            passes.len(),
            scratch.len()
        )));
    }

    let last = passes.len() - 1;
    let mut ping_pong = PingPong::new(scratch.len());
    let mut bound: Option<&B::Program> = None;

    for (index, pass) in passes.iter().enumerate() {
        let params = &pass.parameters;

        if bound != Some(&pass.program) {
            backend
                .bind_program(&pass.program)
                .map_err(FftError::backend)?;
            bound = Some(&pass.program);
        }

        let source = if index == 0 {
            input
        } else {
            &scratch[ping_pong.src_index()]
        };
        backend
            .bind_input(InputSlot::Primary, params.input_target, source)
            .map_err(FftError::backend)?;
        if index == 0 && params.direction == Direction::InverseConvolve {
            if let Some(aux) = aux {
                backend
                    .bind_input(InputSlot::Aux, params.input_target, aux)
                    .map_err(FftError::backend)?;
            }
        }

        let destination = if index == last {
            output
        } else {
            &scratch[ping_pong.dst_index()]
        };
        let format = PixelFormat::for_output(params.mode, params.output_target);
        debug_assert!(index == last || params.output_target == Target::LinearBuffer);
        backend
            .bind_output(params.output_target, format, destination)
            .map_err(FftError::backend)?;

        backend
            .dispatch(&pass.uniforms, pass.workgroups_x, pass.workgroups_y)
            .map_err(FftError::backend)?;

        if let Some(barrier) = pass.barrier {
            backend.memory_barrier(barrier).map_err(FftError::backend)?;
        }

        ping_pong.swap();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_pong_pair_alternates() {
        let mut pp = PingPong::new(2);
        assert_eq!(pp.dst_index(), 0);
        pp.swap();
        assert_eq!((pp.src_index(), pp.dst_index()), (0, 1));
        pp.swap();
        assert_eq!((pp.src_index(), pp.dst_index()), (1, 0));
    }

    #[test]
    fn test_ping_pong_single_buffer() {
        let mut pp = PingPong::new(1);
        assert_eq!((pp.src_index(), pp.dst_index()), (0, 0));
        pp.swap();
        assert_eq!((pp.src_index(), pp.dst_index()), (0, 0));
    }
}
