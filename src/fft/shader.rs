//! Shader variant assembly.
//!
//! Every parameter that changes generated code is lowered to a define, the
//! way a GLSL prelude would be built. Backends render or interpret the
//! variant; the define list doubles as a readable program description.

use super::types::{Direction, Mode, Parameters, Target};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Define {
    Flag(&'static str),
    Value(&'static str, u32),
}

impl Define {
    pub fn name(&self) -> &'static str {
        match self {
            Define::Flag(name) | Define::Value(name, _) => name,
        }
    }
}

/// A program variant ready to be compiled.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderVariant {
    pub parameters: Parameters,
    pub defines: Vec<Define>,
}

impl ShaderVariant {
    pub fn from_parameters(params: &Parameters) -> Self {
        let mut defines = Vec::with_capacity(16);

        if params.first_stage {
            defines.push(Define::Flag("FFT_P1"));
        }
        if params.pow2_stride {
            defines.push(Define::Flag("FFT_POW2_STRIDE"));
        }
        if params.precision.fp16 {
            defines.push(Define::Flag("FFT_FP16"));
        }
        if params.precision.input_fp16 {
            defines.push(Define::Flag("FFT_INPUT_FP16"));
        }
        if params.precision.output_fp16 {
            defines.push(Define::Flag("FFT_OUTPUT_FP16"));
        }
        if params.precision.normalize {
            defines.push(Define::Flag("FFT_NORMALIZE"));
        }
        if params.direction == Direction::InverseConvolve {
            defines.push(Define::Flag("FFT_CONVOLVE"));
        }
        defines.push(Define::Value(
            "FFT_SHARED_BANKED",
            u32::from(params.shared_banked),
        ));
        defines.push(Define::Flag(match params.direction {
            Direction::Forward => "FFT_FORWARD",
            Direction::Inverse | Direction::InverseConvolve => "FFT_INVERSE",
        }));
        defines.push(Define::Value("FFT_RADIX", params.radix));

        let mut vector_size = params.vector_size;
        match params.mode {
            Mode::VerticalDual => {
                defines.push(Define::Flag("FFT_DUAL"));
                defines.push(Define::Flag("FFT_VERT"));
            }
            Mode::Vertical => defines.push(Define::Flag("FFT_VERT")),
            Mode::HorizontalDual => {
                defines.push(Define::Flag("FFT_DUAL"));
                defines.push(Define::Flag("FFT_HORIZ"));
            }
            Mode::Horizontal => defines.push(Define::Flag("FFT_HORIZ")),
            Mode::ResolveRealToComplex => {
                defines.push(Define::Flag("FFT_RESOLVE_REAL_TO_COMPLEX"));
                defines.push(Define::Flag("FFT_HORIZ"));
                vector_size = 2;
            }
            Mode::ResolveComplexToReal => {
                defines.push(Define::Flag("FFT_RESOLVE_COMPLEX_TO_REAL"));
                defines.push(Define::Flag("FFT_HORIZ"));
                vector_size = 2;
            }
        }

        match params.input_target {
            Target::RealImage => {
                defines.push(Define::Flag("FFT_INPUT_REAL"));
                defines.push(Define::Flag("FFT_INPUT_TEXTURE"));
            }
            Target::Image => defines.push(Define::Flag("FFT_INPUT_TEXTURE")),
            Target::LinearBuffer => {}
        }

        match params.output_target {
            Target::RealImage => {
                defines.push(Define::Flag("FFT_OUTPUT_REAL"));
                defines.push(Define::Flag("FFT_OUTPUT_IMAGE"));
            }
            Target::Image => defines.push(Define::Flag("FFT_OUTPUT_IMAGE")),
            Target::LinearBuffer => {}
        }

        defines.push(Define::Flag(match vector_size {
            8 => "FFT_VEC8",
            4 => "FFT_VEC4",
            _ => "FFT_VEC2",
        }));

        let size = params.workgroup_size;
        defines.push(Define::Value("LOCAL_SIZE_X", size.x));
        defines.push(Define::Value("LOCAL_SIZE_Y", size.y));
        defines.push(Define::Value("LOCAL_SIZE_Z", size.z));

        Self {
            parameters: *params,
            defines,
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.defines.iter().any(|d| d.name() == name)
    }

    pub fn value(&self, name: &str) -> Option<u32> {
        self.defines.iter().find_map(|d| match d {
            Define::Value(n, v) if *n == name => Some(*v),
            _ => None,
        })
    }

    /// Effective vector width after mode adjustments.
    pub fn vector_size(&self) -> u32 {
        if self.has("FFT_VEC8") {
            8
        } else if self.has("FFT_VEC4") {
            4
        } else {
            2
        }
    }

    /// Preprocessor-style listing of the variant.
    pub fn prelude(&self) -> String {
        let mut out = String::new();
        for define in &self.defines {
            match define {
                Define::Flag(name) => out.push_str(&format!("#define {name}\n")),
                Define::Value(name, value) => {
                    out.push_str(&format!("#define {name} {value}\n"))
                }
            }
        }
        out
    }

    /// Short debug label, e.g. `fft_r8_Horizontal_p1`.
    pub fn label(&self) -> String {
        let params = &self.parameters;
        format!(
            "fft_r{}_{:?}{}",
            params.radix,
            params.mode,
            if params.first_stage { "_p1" } else { "" }
        )
    }
}
