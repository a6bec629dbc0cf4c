//! CPU versions of the generated pass kernels.
//!
//! Every invocation of the dispatch grid is executed in turn with the same
//! index arithmetic as the WGSL kernels, so a plan that is correct here is
//! correct on the GPU up to floating point.

use std::f64::consts::TAU;
use std::sync::Arc;

use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftDirection, FftPlanner};

use super::{HostError, HostStorage};
use crate::fft::{Direction, Mode, Parameters, PassUniforms, Target};

/// Up to two complex values: one per element, two for dual modes.
type Element = [Complex32; 2];

const ZERO: Element = [Complex32::new(0.0, 0.0), Complex32::new(0.0, 0.0)];

/// Resources and constants of one dispatch.
pub(crate) struct Dispatch<'a> {
    pub params: &'a Parameters,
    pub uniforms: &'a PassUniforms,
    pub input: &'a HostStorage,
    pub aux: Option<&'a HostStorage>,
    pub output: &'a mut HostStorage,
    pub groups_x: u32,
    pub groups_y: u32,
}

fn twiddle(sign: f32, num: u32, den: u32) -> Complex32 {
    let angle = f64::from(sign) * TAU * f64::from(num) / f64::from(den);
    Complex32::new(angle.cos() as f32, angle.sin() as f32)
}

impl Dispatch<'_> {
    fn lanes_per_element(&self) -> usize {
        if self.params.mode.is_dual() {
            2
        } else {
            1
        }
    }

    fn scale(&self) -> f32 {
        let params = self.params;
        if !params.precision.normalize {
            1.0
        } else if params.mode.is_resolve() {
            0.5
        } else {
            1.0 / params.radix as f32
        }
    }

    fn load(&self, storage: &HostStorage, x: u32, y: u32, stride: u32) -> Result<Element, HostError> {
        read_element(
            storage,
            self.params.input_target,
            self.lanes_per_element(),
            (x, y, stride),
        )
    }

    fn fetch(&self, x: u32, y: u32, stride: u32) -> Result<Element, HostError> {
        let mut value = self.load(self.input, x, y, stride)?;
        if self.params.direction == Direction::InverseConvolve {
            let aux = self.aux.ok_or(HostError::Unbound("auxiliary input"))?;
            let factor = self.load(aux, x, y, stride)?;
            for (v, f) in value.iter_mut().zip(factor) {
                *v *= f;
            }
        }
        Ok(value)
    }

    fn store(&mut self, x: u32, y: u32, stride: u32, value: Element) -> Result<(), HostError> {
        let count = self.lanes_per_element();
        write_element(
            self.output,
            self.params.output_target,
            count,
            (x, y, stride),
            &value,
        )
    }

    /// Runs every invocation of the grid.
    pub fn run(mut self, planner: &mut FftPlanner<f32>) -> Result<(), HostError> {
        let size = self.params.workgroup_size;
        let threads_x = self.groups_x * size.x;
        let threads_y = self.groups_y * size.y;

        match self.params.mode {
            Mode::ResolveRealToComplex => {
                for y in 0..threads_y {
                    for x in 0..threads_x {
                        self.resolve_real_to_complex(x, y)?;
                    }
                }
            }
            Mode::ResolveComplexToReal => {
                for y in 0..threads_y {
                    for x in 0..threads_x {
                        self.resolve_complex_to_real(x, y)?;
                    }
                }
            }
            Mode::Horizontal | Mode::HorizontalDual | Mode::Vertical | Mode::VerticalDual => {
                let direction = if self.params.direction == Direction::Forward {
                    FftDirection::Forward
                } else {
                    FftDirection::Inverse
                };
                let fft = planner.plan_fft(self.params.radix as usize, direction);
                for z in 0..size.z {
                    for y in 0..threads_y {
                        for x in 0..threads_x {
                            self.radix_invocation(&fft, [x, y, z])?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn radix_invocation(&mut self, fft: &Arc<dyn Fft<f32>>, gid: [u32; 3]) -> Result<(), HostError> {
        let params = *self.params;
        let uniforms = *self.uniforms;
        let radix = params.radix;
        let p = uniforms.p;
        let sign = params.direction.sign();
        let scale = self.scale();
        let wg_z = params.workgroup_size.z;
        let lanes = (params.vector_size / params.mode.components()).max(1);
        let vertical = params.mode.is_vertical();

        let (stride, columns) = if params.pow2_stride {
            (2 * uniforms.width, uniforms.width + 1)
        } else {
            (uniforms.width, uniforms.width)
        };
        let butterflies = if vertical {
            uniforms.height / radix
        } else {
            uniforms.width / radix
        };

        let count = self.lanes_per_element();
        let mut scratch = [
            vec![Complex32::default(); radix as usize],
            vec![Complex32::default(); radix as usize],
        ];

        for lane in 0..lanes {
            // (butterfly index, fixed coordinate on the other axis)
            let (i, other) = if vertical {
                let col = gid[0] * lanes + lane;
                if gid[1] >= butterflies || col >= columns {
                    break;
                }
                (gid[1], col)
            } else {
                let i = gid[0] * lanes + lane;
                if gid[1] >= uniforms.height || i >= butterflies {
                    break;
                }
                (i, gid[1])
            };
            let k = i & (p - 1);
            let at = |index: u32| if vertical { (other, index) } else { (index, other) };

            for j in 0..radix {
                let (x, y) = at(i + j * butterflies);
                let mut value = self.fetch(x, y, stride)?;
                if !params.first_stage {
                    let w = twiddle(sign, j * k, p * radix);
                    for v in value.iter_mut() {
                        *v *= w;
                    }
                }
                for (c, v) in value.iter().enumerate() {
                    scratch[c][j as usize] = *v;
                }
            }
            for buffer in scratch.iter_mut().take(count) {
                fft.process(buffer);
            }

            let out_base = (i - k) * radix + k;
            let mut j = gid[2];
            while j < radix {
                let (x, y) = at(out_base + j * p);
                let value = [
                    scratch[0][j as usize] * scale,
                    scratch[1][j as usize] * scale,
                ];
                self.store(x, y, stride, value)?;
                j += wg_z;
            }
        }
        Ok(())
    }

    fn resolve_real_to_complex(&mut self, k: u32, row: u32) -> Result<(), HostError> {
        let m = self.uniforms.width;
        if k >= m || row >= self.uniforms.height {
            return Ok(());
        }
        let scale = self.scale();
        let sign = self.params.direction.sign();
        let a = self.fetch(k, row, m)?[0];
        let b = self.fetch((m - k) % m, row, m)?[0].conj();
        let even = (a + b) * 0.5;
        let diff = (a - b) * 0.5;
        let odd = Complex32::new(diff.im, -diff.re);
        let w = twiddle(sign, k, 2 * m);
        self.store(k, row, 2 * m, [(even + odd * w) * scale, ZERO[1]])?;
        if k == 0 {
            self.store(m, row, 2 * m, [(even - odd) * scale, ZERO[1]])?;
        }
        Ok(())
    }

    fn resolve_complex_to_real(&mut self, k: u32, row: u32) -> Result<(), HostError> {
        let m = self.uniforms.width;
        if k >= m || row >= self.uniforms.height {
            return Ok(());
        }
        let scale = self.scale();
        let sign = self.params.direction.sign();
        let a = self.fetch(k, row, 2 * m)?[0];
        let b = self.fetch(m - k, row, 2 * m)?[0].conj();
        let even = a + b;
        let odd = (a - b) * twiddle(sign, k, 2 * m);
        let z = even + Complex32::new(-odd.im, odd.re);
        self.store(k, row, m, [z * scale, ZERO[1]])
    }
}

/// Reads one element at `(x, y)` with a row stride of `stride` elements.
///
/// Buffer reads past the end fail; image reads outside the image return zero.
fn read_element(
    storage: &HostStorage,
    target: Target,
    count: usize,
    (x, y, stride): (u32, u32, u32),
) -> Result<Element, HostError> {
    let mut element = ZERO;
    match (target, storage) {
        (Target::LinearBuffer, HostStorage::Buffer(data)) => {
            let base = (y as usize * stride as usize + x as usize) * 2 * count;
            let floats = data
                .get(base..base + 2 * count)
                .ok_or(HostError::OutOfBounds {
                    index: base + 2 * count,
                    len: data.len(),
                })?;
            for (c, value) in element.iter_mut().take(count).enumerate() {
                *value = Complex32::new(floats[2 * c], floats[2 * c + 1]);
            }
        }
        (Target::Image, HostStorage::Image { .. }) => {
            for (c, value) in element.iter_mut().take(count).enumerate() {
                let c = c as u32;
                *value = Complex32::new(storage.texel(x, y, 2 * c), storage.texel(x, y, 2 * c + 1));
            }
        }
        (Target::RealImage, HostStorage::Image { .. }) => {
            element[0] = Complex32::new(storage.texel(2 * x, y, 0), storage.texel(2 * x + 1, y, 0));
        }
        (target, _) => return Err(HostError::WrongResource(format!("{target:?} input"))),
    }
    Ok(element)
}

/// Image writes outside the image are dropped.
fn write_element(
    storage: &mut HostStorage,
    target: Target,
    count: usize,
    (x, y, stride): (u32, u32, u32),
    value: &Element,
) -> Result<(), HostError> {
    match target {
        Target::LinearBuffer => {
            let HostStorage::Buffer(data) = storage else {
                return Err(HostError::WrongResource("buffer output".into()));
            };
            let base = (y as usize * stride as usize + x as usize) * 2 * count;
            let len = data.len();
            let floats = data
                .get_mut(base..base + 2 * count)
                .ok_or(HostError::OutOfBounds {
                    index: base + 2 * count,
                    len,
                })?;
            for (c, v) in value.iter().take(count).enumerate() {
                floats[2 * c] = v.re;
                floats[2 * c + 1] = v.im;
            }
        }
        Target::Image | Target::RealImage if !storage.is_image() => {
            return Err(HostError::WrongResource(format!("{target:?} output")));
        }
        Target::Image => {
            for (c, v) in value.iter().take(count).enumerate() {
                let c = c as u32;
                storage.set_texel(x, y, 2 * c, v.re);
                storage.set_texel(x, y, 2 * c + 1, v.im);
            }
        }
        Target::RealImage => {
            storage.set_texel(2 * x, y, 0, value[0].re);
            storage.set_texel(2 * x + 1, y, 0, value[0].im);
        }
    }
    Ok(())
}
