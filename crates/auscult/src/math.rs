//! Activation kernels and small vector helpers for classifier inference.

pub fn relu_inplace(x: &mut [f32]) {
    for v in x {
        if *v < 0.0 {
            *v = 0.0;
        }
    }
}

pub fn tanh_inplace(x: &mut [f32]) {
    for v in x {
        *v = v.tanh();
    }
}

pub fn sigmoid_inplace(x: &mut [f32]) {
    for v in x {
        *v = 1.0 / (1.0 + (-*v).exp());
    }
}

pub fn softmax_inplace(x: &mut [f32]) {
    if x.is_empty() {
        return;
    }
    let mut max_v = x[0];
    for &v in &x[1..] {
        if v > max_v {
            max_v = v;
        }
    }

    let mut sum = 0.0f32;
    for v in x.iter_mut() {
        *v = (*v - max_v).exp();
        sum += *v;
    }
    if sum > 0.0 {
        for v in x {
            *v /= sum;
        }
    }
}

/// Index of the largest value; ties go to the lowest index.
///
/// Returns `None` for an empty slice or when every value is NaN.
#[must_use]
pub fn argmax(x: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in x.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::{argmax, relu_inplace, sigmoid_inplace, softmax_inplace, tanh_inplace};

    #[test]
    fn activations_smoke() {
        let mut r = [-1.0f32, 0.0, 2.0];
        relu_inplace(&mut r);
        assert_eq!(r, [0.0, 0.0, 2.0]);

        let mut t = [0.0f32, 10.0];
        tanh_inplace(&mut t);
        assert!(t[0].abs() < 1e-6);
        assert!((t[1] - 1.0).abs() < 1e-4);

        let mut s = [0.0f32];
        sigmoid_inplace(&mut s);
        assert!((s[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn softmax_sums_to_one() {
        let mut s = [1.0f32, 2.0, 3.0];
        softmax_inplace(&mut s);
        let sum: f32 = s.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(s[2] > s[1] && s[1] > s[0]);

        // Large logits must not overflow.
        let mut big = [1000.0f32, 1000.0];
        softmax_inplace(&mut big);
        assert!((big[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn argmax_prefers_first_maximum() {
        assert_eq!(argmax(&[0.5, 0.5, 0.0]), Some(0));
        assert_eq!(argmax(&[0.1, 0.7, 0.7, 0.2]), Some(1));
        assert_eq!(argmax(&[f32::NAN, 0.2]), Some(1));
        assert_eq!(argmax(&[]), None);
    }
}
