//! Two-dimensional FFT helpers built on row and column passes of `rustfft`.

use ndarray::Array2;
use num_complex::Complex;
use rustfft::FftPlanner;

/// Forward 2-D FFT of a real image.
pub fn fft2d(data: &Array2<f64>) -> Array2<Complex<f64>> {
    let mut result = data.mapv(|v| Complex::new(v, 0.0));
    transform(&mut result, false);
    result
}

/// Inverse 2-D FFT, normalized, keeping the real part.
pub fn ifft2d(data: &Array2<Complex<f64>>) -> Array2<f64> {
    let (h, w) = data.dim();
    let mut work = data.clone();
    transform(&mut work, true);
    let scale = 1.0 / (h * w) as f64;
    work.mapv(|c| c.re * scale)
}

fn transform(data: &mut Array2<Complex<f64>>, inverse: bool) {
    let (h, w) = data.dim();
    let mut planner = FftPlanner::new();
    let (fft_row, fft_col) = if inverse {
        (planner.plan_fft_inverse(w), planner.plan_fft_inverse(h))
    } else {
        (planner.plan_fft_forward(w), planner.plan_fft_forward(h))
    };

    // Row-wise
    let mut buffer = vec![Complex::new(0.0, 0.0); w];
    for row in 0..h {
        for col in 0..w {
            buffer[col] = data[[row, col]];
        }
        fft_row.process(&mut buffer);
        for col in 0..w {
            data[[row, col]] = buffer[col];
        }
    }

    // Column-wise
    let mut buffer = vec![Complex::new(0.0, 0.0); h];
    for col in 0..w {
        for row in 0..h {
            buffer[row] = data[[row, col]];
        }
        fft_col.process(&mut buffer);
        for row in 0..h {
            data[[row, col]] = buffer[row];
        }
    }
}

/// Signed frequency (cycles per sample) of FFT bin `k` of an `n`-point
/// transform.
pub fn frequency(k: usize, n: usize) -> f64 {
    if k <= n / 2 {
        k as f64 / n as f64
    } else {
        (k as f64 - n as f64) / n as f64
    }
}
