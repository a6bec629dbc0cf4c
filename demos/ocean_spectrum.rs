//! Example: Animate an ocean height field from a Phillips spectrum.
//!
//! Builds the frequency-domain spectrum on the CPU for a few time steps and
//! turns it into heights with a complex-to-real inverse FFT, on the GPU when
//! one is available and on the CPU reference backend otherwise.
//!
//! Run with:
//!     cargo run --example ocean_spectrum [wisdom.json]

use anyhow::Context;
use ocean_fft::fft::{Direction, FftPlanBuilder, ProgramCache, TransformKind, Wisdom};
use ocean_fft::gpu::{GpuContext, WgpuBackend};
use ocean_fft::host::HostBackend;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustfft::num_complex::Complex32;
use std::f32::consts::PI;
use std::path::Path;

const N: u32 = 256;
const PATCH_SIZE: f32 = 500.0;
const WIND: [f32; 2] = [24.0, 8.0];
const AMPLITUDE: f32 = 2e-5;
const GRAVITY: f32 = 9.81;

fn wave_vector(x: u32, y: u32) -> [f32; 2] {
    let signed = |i: u32| if i > N / 2 { i as f32 - N as f32 } else { i as f32 };
    let scale = 2.0 * PI / PATCH_SIZE;
    [signed(x) * scale, signed(y) * scale]
}

fn phillips(k: [f32; 2]) -> f32 {
    let k2 = k[0] * k[0] + k[1] * k[1];
    if k2 < 1e-12 {
        return 0.0;
    }
    let wind_speed = (WIND[0] * WIND[0] + WIND[1] * WIND[1]).sqrt();
    let l = wind_speed * wind_speed / GRAVITY;
    let k_dot_w = (k[0] * WIND[0] + k[1] * WIND[1]) / (k2.sqrt() * wind_speed);
    AMPLITUDE * (-1.0 / (k2 * l * l)).exp() / (k2 * k2) * k_dot_w.powi(2)
}

/// Initial amplitudes `h0(k)` over the full N x N grid.
fn initial_spectrum(seed: u64) -> Vec<Complex32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut gaussian = move || {
        // Box-Muller
        let u1: f32 = rng.gen_range(1e-7..1.0);
        let u2: f32 = rng.gen_range(0.0..1.0);
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    };

    (0..N * N)
        .map(|i| {
            let amplitude = (phillips(wave_vector(i % N, i / N)) * 0.5).sqrt();
            Complex32::new(gaussian(), gaussian()) * amplitude
        })
        .collect()
}

/// Half spectrum at time `t`, N / 2 + 1 values per row over a stride of N.
fn spectrum_at(h0: &[Complex32], t: f32) -> Vec<f32> {
    let mut out = vec![0.0; (2 * N * N) as usize];
    for y in 0..N {
        for x in 0..=N / 2 {
            let k = wave_vector(x, y);
            let omega = (GRAVITY * (k[0] * k[0] + k[1] * k[1]).sqrt()).sqrt();
            let phase = Complex32::from_polar(1.0, omega * t);

            let neg = ((N - y) % N * N + (N - x) % N) as usize;
            let h = h0[(y * N + x) as usize] * phase + h0[neg].conj() * phase.conj();

            let at = 2 * (y * N + x) as usize;
            out[at] = h.re;
            out[at + 1] = h.im;
        }
    }
    out
}

fn summarize(frame: usize, heights: &[f32]) {
    let (min, max) = heights
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), &h| (lo.min(h), hi.max(h)));
    let rms = (heights.iter().map(|h| h * h).sum::<f32>() / heights.len() as f32).sqrt();
    println!("  frame {frame}: min {min:+.3} m, max {max:+.3} m, rms {rms:.3} m");
}

fn run_gpu(ctx: &GpuContext, wisdom: &Wisdom, h0: &[Complex32]) -> anyhow::Result<()> {
    let mut gpu = WgpuBackend::from_context(ctx);
    let mut cache = ProgramCache::new();
    let plan = FftPlanBuilder::new(N, N)
        .kind(TransformKind::ComplexToReal)
        .direction(Direction::Inverse)
        .wisdom(wisdom)
        .build(&mut gpu, &mut cache)
        .context("Failed to build GPU plan")?;
    println!(
        "  {} passes, {} programs compiled\n",
        plan.passes().len(),
        cache.compilations()
    );

    let spectrum = gpu.buffer_from("spectrum", &spectrum_at(h0, 0.0));
    let heights = gpu.buffer_from("heights", &vec![0.0; (N * N) as usize]);
    for frame in 0..5 {
        gpu.upload(&spectrum, &spectrum_at(h0, frame as f32 * 0.5))?;
        plan.process(&mut gpu, &heights, &spectrum, None)?;
        summarize(frame, &gpu.read(&heights)?);
    }
    Ok(())
}

fn run_host(wisdom: &Wisdom, h0: &[Complex32]) -> anyhow::Result<()> {
    let mut host = HostBackend::new();
    let mut cache = ProgramCache::new();
    let plan = FftPlanBuilder::new(N, N)
        .kind(TransformKind::ComplexToReal)
        .direction(Direction::Inverse)
        .wisdom(wisdom)
        .build(&mut host, &mut cache)
        .context("Failed to build host plan")?;
    println!("  {} passes\n", plan.passes().len());

    let heights = HostBackend::buffer_from(vec![0.0; (N * N) as usize]);
    for frame in 0..5 {
        let spectrum = HostBackend::buffer_from(spectrum_at(h0, frame as f32 * 0.5));
        plan.process(&mut host, &heights, &spectrum, None)?;
        summarize(frame, &HostBackend::read(&heights));
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("Ocean FFT - Phillips Spectrum Example");
    println!("=====================================\n");
    println!("  Grid: {N}x{N}, patch {PATCH_SIZE} m, wind {WIND:?} m/s");

    let wisdom = match std::env::args().nth(1) {
        Some(path) if Path::new(&path).exists() => {
            Wisdom::load(&path).with_context(|| format!("Failed to load wisdom from {path}"))?
        }
        _ => Wisdom::new(),
    };

    let h0 = initial_spectrum(42);

    match pollster::block_on(GpuContext::new()) {
        Ok(ctx) => {
            println!("  GPU: {}", ctx.adapter_info().name);
            run_gpu(&ctx, &wisdom, &h0)
        }
        Err(e) => {
            println!("  No GPU ({e}), using the CPU reference backend");
            run_host(&wisdom, &h0)
        }
    }
}
