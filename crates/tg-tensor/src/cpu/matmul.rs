// Dense matrix kernels used by CpuBackend.

/// Naive row-major C = A @ B. Slice lengths are checked by the caller.
pub(crate) fn matmul(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Vec<f32> {
    let mut c = vec![0.0f32; m * n];
    for i in 0..m {
        for p in 0..k {
            let a_ip = a[i * k + p];
            if a_ip == 0.0 {
                continue;
            }
            let row = &b[p * n..(p + 1) * n];
            for (j, &b_pj) in row.iter().enumerate() {
                c[i * n + j] += a_ip * b_pj;
            }
        }
    }
    c
}

/// Row-major transpose of a [rows, cols] matrix into `out`.
pub(crate) fn transpose_into(a: &[f32], rows: usize, cols: usize, out: &mut [f32]) {
    for r in 0..rows {
        for c in 0..cols {
            out[c * rows + r] = a[r * cols + c];
        }
    }
}

pub(crate) fn sum_rows(a: &[f32], rows: usize, cols: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; cols];
    for r in 0..rows {
        for (c, acc) in out.iter_mut().enumerate() {
            *acc += a[r * cols + c];
        }
    }
    out
}
