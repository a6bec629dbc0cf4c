//! FFT planning and execution on GPU compute shaders.
//!
//! A plan splits each axis into radix 4/8/16/64 passes chosen by a cost
//! model, compiles one program per distinct pass variant through a shared
//! [`ProgramCache`], and replays the pass list through a [`ComputeBackend`]
//! with ping-ponged scratch storage.

mod backend;
mod cache;
mod executor;
mod options;
mod plan;
mod planner;
mod radix;
mod shader;
mod types;
mod wisdom;

pub mod wgsl;

pub use backend::{BufferDesc, ComputeBackend, ImageDesc, InputSlot};
pub use cache::ProgramCache;
pub use executor::{process, PingPong};
pub use options::{FftOptions, PerformanceOptions};
pub use plan::{FftPlan, FftPlanBuilder, Pass, TransformDesc};
pub use planner::{RadixPlanner, RadixSplit, SUPPORTED_RADICES};
pub use radix::{
    build_resolve_step, build_step, is_radix_feasible, radix_to_wg_z, RadixStep,
};
pub use shader::{Define, ShaderVariant};
pub use types::{
    Barrier, Direction, Mode, Parameters, PassUniforms, PixelFormat, PrecisionOptions, Target,
    TransformKind, WorkgroupSize,
};
pub use wisdom::{
    heuristic_cost, BenchParams, CostModel, StaticWisdom, Tristate, Wisdom, WisdomKey,
    FALLBACK_COST_BIAS,
};

/// Errors raised while building or running an FFT plan.
#[derive(Debug, thiserror::Error)]
pub enum FftError {
    #[error("FFT size must be a power of 2, got {nx}x{ny}")]
    NotPowerOfTwo { nx: u32, ny: u32 },
    #[error("No feasible radix split for N = {n} ({mode:?})")]
    NoFeasibleSplit { n: u32, mode: Mode },
    #[error("Invalid FFT configuration: {0}")]
    InvalidConfig(String),
    #[error("Radix {radix} pass ({mode:?}) has an empty dispatch grid")]
    EmptyDispatch { radix: u32, mode: Mode },
    #[error("Failed to compile program for {parameters:?}: {message}")]
    Compile {
        parameters: Box<Parameters>,
        message: String,
    },
    #[error("Plan convolves its input but no auxiliary input was bound")]
    MissingAuxInput,
    #[error("Backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Wisdom I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl FftError {
    pub(crate) fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        FftError::Backend(Box::new(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = FftError::NotPowerOfTwo { nx: 100, ny: 64 };
        assert!(err.to_string().contains("100x64"));

        let err = FftError::NoFeasibleSplit {
            n: 2,
            mode: Mode::Horizontal,
        };
        assert!(err.to_string().contains("N = 2"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FftError>();
    }
}
