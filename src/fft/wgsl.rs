//! WGSL source generation for FFT pass variants.
//!
//! Each invocation of a radix pass performs `LANES` Stockham butterflies:
//! thread `i` loads `x[i + j * N / R]`, twiddles by `exp(±2πi j k / (p R))`
//! with `k = i mod p`, runs an `R`-point DFT in registers and stores to
//! `(i - k) R + k + j p`. Resolve passes convert between an `N`-point real
//! signal packed as `N / 2` complex values and its `N / 2 + 1` point
//! half spectrum.
//!
//! Bindings: 0 input, 1 output, 2 `PassUniforms`, 3 auxiliary input of a
//! convolving pass.

use super::shader::ShaderVariant;
use super::types::{Mode, Target};

const TAU: &str = "6.283185307179586";

/// Renders `variant` to a complete compute shader.
pub fn generate(variant: &ShaderVariant) -> String {
    let params = &variant.parameters;
    let mut src = String::with_capacity(8 * 1024);

    src.push_str("// Generated FFT pass.\n");
    for line in variant.prelude().lines() {
        src.push_str("// ");
        src.push_str(line);
        src.push('\n');
    }
    src.push('\n');

    emit_constants(&mut src, variant);
    emit_complex_math(&mut src, variant.has("FFT_DUAL"));
    emit_bindings(&mut src, variant);
    emit_load(&mut src, variant, "load_input", "input", params.input_target);
    if variant.has("FFT_CONVOLVE") {
        emit_load(&mut src, variant, "load_aux", "aux", params.input_target);
    }
    emit_fetch(&mut src, variant.has("FFT_CONVOLVE"));
    emit_store(&mut src, variant, params.output_target);

    match params.mode {
        Mode::ResolveRealToComplex => emit_resolve_r2c(&mut src, variant),
        Mode::ResolveComplexToReal => emit_resolve_c2r(&mut src, variant),
        Mode::Horizontal | Mode::HorizontalDual => {
            emit_radix_dft(&mut src);
            emit_horizontal(&mut src, variant);
        }
        Mode::Vertical | Mode::VerticalDual => {
            emit_radix_dft(&mut src);
            emit_vertical(&mut src, variant);
        }
    }
    src
}

fn float(value: f64) -> String {
    let s = format!("{value}");
    if s.contains('.') || s.contains('e') {
        s
    } else {
        format!("{s}.0")
    }
}

fn emit_constants(src: &mut String, variant: &ShaderVariant) {
    let params = &variant.parameters;
    let dual = variant.has("FFT_DUAL");
    let components = if dual { 4 } else { 2 };
    let lanes = (variant.vector_size() / components).max(1);
    let radix = variant.value("FFT_RADIX").unwrap_or(params.radix);
    let direction = if variant.has("FFT_FORWARD") { -1.0 } else { 1.0 };

    let scale = if !variant.has("FFT_NORMALIZE") {
        1.0
    } else if params.mode.is_resolve() {
        0.5
    } else {
        1.0 / f64::from(radix)
    };

    src.push_str(&format!("const RADIX: u32 = {radix}u;\n"));
    src.push_str(&format!("const LOG2_RADIX: u32 = {}u;\n", radix.trailing_zeros()));
    src.push_str(&format!("const LANES: u32 = {lanes}u;\n"));
    src.push_str(&format!("const WG_Z: u32 = {}u;\n", params.workgroup_size.z));
    src.push_str(&format!("const DIRECTION: f32 = {};\n", float(direction)));
    src.push_str(&format!("const OUTPUT_SCALE: f32 = {};\n", float(scale)));
    src.push_str(&format!("const TAU: f32 = {TAU};\n"));
    src.push('\n');
}

fn emit_complex_math(src: &mut String, dual: bool) {
    src.push_str(
        "fn cmul(a: vec2<f32>, b: vec2<f32>) -> vec2<f32> {
    return vec2<f32>(a.x * b.x - a.y * b.y, a.x * b.y + a.y * b.x);
}

fn conj(a: vec2<f32>) -> vec2<f32> {
    return vec2<f32>(a.x, -a.y);
}

fn twiddle_factor(num: u32, den: u32) -> vec2<f32> {
    let angle = DIRECTION * TAU * f32(num) / f32(den);
    return vec2<f32>(cos(angle), sin(angle));
}

",
    );
    if dual {
        src.push_str(
            "alias Cx = vec4<f32>;

fn twiddle(a: Cx, w: vec2<f32>) -> Cx {
    return vec4<f32>(cmul(a.xy, w), cmul(a.zw, w));
}

fn cmul_elem(a: Cx, b: Cx) -> Cx {
    return vec4<f32>(cmul(a.xy, b.xy), cmul(a.zw, b.zw));
}

",
        );
    } else {
        src.push_str(
            "alias Cx = vec2<f32>;

fn twiddle(a: Cx, w: vec2<f32>) -> Cx {
    return cmul(a, w);
}

fn cmul_elem(a: Cx, b: Cx) -> Cx {
    return cmul(a, b);
}

",
        );
    }
}

/// Element type of a storage buffer for the given packing.
fn buffer_type(dual: bool, fp16: bool) -> &'static str {
    match (dual, fp16) {
        (false, false) => "vec2<f32>",
        (true, false) => "vec4<f32>",
        (false, true) => "u32",
        (true, true) => "vec2<u32>",
    }
}

fn emit_input_binding(src: &mut String, binding: u32, name: &str, target: Target, ty: &str) {
    if target.is_image() {
        src.push_str(&format!(
            "@group(0) @binding({binding}) var {name}_image: texture_2d<f32>;\n",
        ));
    } else {
        src.push_str(&format!(
            "@group(0) @binding({binding}) var<storage, read> {name}_data: array<{ty}>;\n",
        ));
    }
}

fn emit_bindings(src: &mut String, variant: &ShaderVariant) {
    let params = &variant.parameters;
    let dual = variant.has("FFT_DUAL");

    src.push_str(
        "struct PassUniforms {
    p: u32,
    width: u32,
    height: u32,
    _pad: u32,
}

",
    );

    let input_ty = buffer_type(dual, variant.has("FFT_INPUT_FP16"));
    emit_input_binding(src, 0, "input", params.input_target, input_ty);

    match params.output_target {
        Target::LinearBuffer => {
            let ty = buffer_type(dual, variant.has("FFT_OUTPUT_FP16"));
            src.push_str(&format!(
                "@group(0) @binding(1) var<storage, read_write> output_data: array<{ty}>;\n",
            ));
        }
        Target::Image => {
            let format = if dual { "rgba16float" } else { "rg32float" };
            src.push_str(&format!(
                "@group(0) @binding(1) var output_image: texture_storage_2d<{format}, write>;\n",
            ));
        }
        Target::RealImage => {
            src.push_str(
                "@group(0) @binding(1) var output_image: texture_storage_2d<r32float, write>;\n",
            );
        }
    }

    src.push_str("@group(0) @binding(2) var<uniform> uniforms: PassUniforms;\n");
    if variant.has("FFT_CONVOLVE") {
        emit_input_binding(src, 3, "aux", params.input_target, input_ty);
    }
    src.push('\n');
}

fn emit_load(src: &mut String, variant: &ShaderVariant, fn_name: &str, name: &str, target: Target) {
    let dual = variant.has("FFT_DUAL");
    let fp16 = variant.has("FFT_INPUT_FP16");

    src.push_str(&format!("fn {fn_name}(x: u32, y: u32, stride: u32) -> Cx {{\n"));
    match target {
        Target::LinearBuffer => {
            src.push_str(&format!("    let v = {name}_data[y * stride + x];\n"));
            src.push_str(match (dual, fp16) {
                (_, false) => "    return v;\n",
                (false, true) => "    return unpack2x16float(v);\n",
                (true, true) => "    return vec4<f32>(unpack2x16float(v.x), unpack2x16float(v.y));\n",
            });
        }
        Target::Image => {
            src.push_str(&format!(
                "    let v = textureLoad({name}_image, vec2<i32>(i32(x), i32(y)), 0);\n",
            ));
            src.push_str(if dual { "    return v;\n" } else { "    return v.xy;\n" });
        }
        Target::RealImage => {
            src.push_str(&format!(
                "    let re = textureLoad({name}_image, vec2<i32>(i32(2u * x), i32(y)), 0).x;\n",
            ));
            src.push_str(&format!(
                "    let im = textureLoad({name}_image, vec2<i32>(i32(2u * x + 1u), i32(y)), 0).x;\n",
            ));
            src.push_str("    return vec2<f32>(re, im);\n");
        }
    }
    src.push_str("}\n\n");
}

fn emit_fetch(src: &mut String, convolve: bool) {
    src.push_str("fn fetch(x: u32, y: u32, stride: u32) -> Cx {\n");
    if convolve {
        src.push_str("    return cmul_elem(load_input(x, y, stride), load_aux(x, y, stride));\n");
    } else {
        src.push_str("    return load_input(x, y, stride);\n");
    }
    src.push_str("}\n\n");
}

fn emit_store(src: &mut String, variant: &ShaderVariant, target: Target) {
    let dual = variant.has("FFT_DUAL");
    let fp16 = variant.has("FFT_OUTPUT_FP16");

    src.push_str("fn store_output(x: u32, y: u32, stride: u32, v: Cx) {\n");
    match target {
        Target::LinearBuffer => src.push_str(match (dual, fp16) {
            (_, false) => "    output_data[y * stride + x] = v;\n",
            (false, true) => "    output_data[y * stride + x] = pack2x16float(v);\n",
            (true, true) => {
                "    output_data[y * stride + x] = vec2<u32>(pack2x16float(v.xy), pack2x16float(v.zw));\n"
            }
        }),
        Target::Image => {
            if dual {
                src.push_str("    textureStore(output_image, vec2<i32>(i32(x), i32(y)), v);\n");
            } else {
                src.push_str(
                    "    textureStore(output_image, vec2<i32>(i32(x), i32(y)), vec4<f32>(v, 0.0, 0.0));\n",
                );
            }
        }
        Target::RealImage => src.push_str(
            "    textureStore(output_image, vec2<i32>(i32(2u * x), i32(y)), vec4<f32>(v.x, 0.0, 0.0, 1.0));
    textureStore(output_image, vec2<i32>(i32(2u * x + 1u), i32(y)), vec4<f32>(v.y, 0.0, 0.0, 1.0));
",
        ),
    }
    src.push_str("}\n\n");
}

fn emit_radix_dft(src: &mut String) {
    // Inputs arrive in bit-reversed order; iterative radix-2 DIT leaves the
    // spectrum in natural order.
    src.push_str(
        "fn radix_dft(v: ptr<function, array<Cx, RADIX>>) {
    for (var span = 2u; span <= RADIX; span = span * 2u) {
        let half_span = span / 2u;
        for (var base = 0u; base < RADIX; base = base + span) {
            for (var j = 0u; j < half_span; j = j + 1u) {
                let a = (*v)[base + j];
                let b = twiddle((*v)[base + j + half_span], twiddle_factor(j, span));
                (*v)[base + j] = a + b;
                (*v)[base + j + half_span] = a - b;
            }
        }
    }
}

fn bit_reverse(j: u32) -> u32 {
    return reverseBits(j) >> (32u - LOG2_RADIX);
}

",
    );
}

fn twiddle_line(variant: &ShaderVariant) -> &'static str {
    if variant.has("FFT_P1") {
        ""
    } else {
        "            x = twiddle(x, twiddle_factor(j * k, p * RADIX));\n"
    }
}

fn emit_workgroup_attr(src: &mut String, variant: &ShaderVariant) {
    let size = variant.parameters.workgroup_size;
    src.push_str(&format!(
        "@compute @workgroup_size({}, {}, {})\n",
        size.x, size.y, size.z,
    ));
}

fn emit_horizontal(src: &mut String, variant: &ShaderVariant) {
    emit_workgroup_attr(src, variant);
    src.push_str(
        "fn main(@builtin(global_invocation_id) gid: vec3<u32>, @builtin(local_invocation_id) lid: vec3<u32>) {
    let p = uniforms.p;
    let stride = uniforms.width;
    let butterflies = uniforms.width / RADIX;
    let row = gid.y;
    if (row >= uniforms.height) {
        return;
    }
    for (var lane = 0u; lane < LANES; lane = lane + 1u) {
        let i = gid.x * LANES + lane;
        if (i >= butterflies) {
            break;
        }
        let k = i & (p - 1u);
        var v: array<Cx, RADIX>;
        for (var j = 0u; j < RADIX; j = j + 1u) {
            var x = fetch(i + j * butterflies, row, stride);
",
    );
    src.push_str(twiddle_line(variant));
    src.push_str(
        "            v[bit_reverse(j)] = x;
        }
        radix_dft(&v);
        let out_base = (i - k) * RADIX + k;
        for (var j = lid.z; j < RADIX; j = j + WG_Z) {
            store_output(out_base + j * p, row, stride, v[j] * OUTPUT_SCALE);
        }
    }
}
",
    );
}

fn emit_vertical(src: &mut String, variant: &ShaderVariant) {
    let (stride, columns) = if variant.has("FFT_POW2_STRIDE") {
        ("2u * uniforms.width", "uniforms.width + 1u")
    } else {
        ("uniforms.width", "uniforms.width")
    };

    emit_workgroup_attr(src, variant);
    src.push_str(
        "fn main(@builtin(global_invocation_id) gid: vec3<u32>, @builtin(local_invocation_id) lid: vec3<u32>) {
    let p = uniforms.p;
",
    );
    src.push_str(&format!("    let stride = {stride};\n"));
    src.push_str(&format!("    let columns = {columns};\n"));
    src.push_str(
        "    let butterflies = uniforms.height / RADIX;
    let i = gid.y;
    if (i >= butterflies) {
        return;
    }
    let k = i & (p - 1u);
    let out_base = (i - k) * RADIX + k;
    for (var lane = 0u; lane < LANES; lane = lane + 1u) {
        let col = gid.x * LANES + lane;
        if (col >= columns) {
            break;
        }
        var v: array<Cx, RADIX>;
        for (var j = 0u; j < RADIX; j = j + 1u) {
            var x = fetch(col, i + j * butterflies, stride);
",
    );
    src.push_str(twiddle_line(variant));
    src.push_str(
        "            v[bit_reverse(j)] = x;
        }
        radix_dft(&v);
        for (var j = lid.z; j < RADIX; j = j + WG_Z) {
            store_output(col, out_base + j * p, stride, v[j] * OUTPUT_SCALE);
        }
    }
}
",
    );
}

fn emit_resolve_r2c(src: &mut String, variant: &ShaderVariant) {
    emit_workgroup_attr(src, variant);
    src.push_str(
        "fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let m = uniforms.width;
    let k = gid.x;
    let row = gid.y;
    if (k >= m || row >= uniforms.height) {
        return;
    }
    let a = fetch(k, row, m);
    let b = conj(fetch((m - k) % m, row, m));
    let even = (a + b) * 0.5;
    let diff = (a - b) * 0.5;
    // odd = diff / i
    let odd = vec2<f32>(diff.y, -diff.x);
    store_output(k, row, 2u * m, (even + cmul(odd, twiddle_factor(k, 2u * m))) * OUTPUT_SCALE);
    if (k == 0u) {
        store_output(m, row, 2u * m, (even - odd) * OUTPUT_SCALE);
    }
}
",
    );
}

fn emit_resolve_c2r(src: &mut String, variant: &ShaderVariant) {
    emit_workgroup_attr(src, variant);
    src.push_str(
        "fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let m = uniforms.width;
    let k = gid.x;
    let row = gid.y;
    if (k >= m || row >= uniforms.height) {
        return;
    }
    let a = fetch(k, row, 2u * m);
    let b = conj(fetch(m - k, row, 2u * m));
    let even = a + b;
    let odd = cmul(a - b, twiddle_factor(k, 2u * m));
    // even + i * odd
    let z = even + vec2<f32>(-odd.y, odd.x);
    store_output(k, row, m, z * OUTPUT_SCALE);
}
",
    );
}
