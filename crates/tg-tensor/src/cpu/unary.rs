// Element-wise activation kernels and their output-based gradients.

pub(crate) fn relu(x: &[f32]) -> Vec<f32> {
    x.iter().map(|&v| v.max(0.0)).collect()
}

pub(crate) fn sigmoid(x: &[f32]) -> Vec<f32> {
    x.iter().map(|&v| 1.0 / (1.0 + (-v).exp())).collect()
}

pub(crate) fn tanh(x: &[f32]) -> Vec<f32> {
    x.iter().map(|&v| v.tanh()).collect()
}

pub(crate) fn relu_grad(y: &[f32], grad: &[f32]) -> Vec<f32> {
    y.iter()
        .zip(grad)
        .map(|(&y, &g)| if y > 0.0 { g } else { 0.0 })
        .collect()
}

pub(crate) fn sigmoid_grad(y: &[f32], grad: &[f32]) -> Vec<f32> {
    y.iter().zip(grad).map(|(&y, &g)| g * y * (1.0 - y)).collect()
}

pub(crate) fn tanh_grad(y: &[f32], grad: &[f32]) -> Vec<f32> {
    y.iter().zip(grad).map(|(&y, &g)| g * (1.0 - y * y)).collect()
}
