/// Resample mono float audio to a target rate using linear interpolation.
///
/// The device's native rate is observed at runtime, so no fixed ratio is
/// assumed. When the rates already match the input is returned unchanged.
///
/// Output length is `ceil(input.len() / (src_rate / target_rate))`.
pub fn resample(input: &[f32], src_rate: u32, target_rate: u32) -> Vec<f32> {
    if src_rate == target_rate {
        return input.to_vec();
    }

    if input.is_empty() {
        return Vec::new();
    }

    let ratio = src_rate as f64 / target_rate as f64;
    let new_len = (input.len() as f64 / ratio).ceil() as usize;
    let mut output = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_index = i as f64 * ratio;
        let index1 = src_index.floor() as usize;
        // The final output index can land exactly on the last source sample;
        // clamp so the interpolation never reads past the end.
        let index2 = (src_index.ceil() as usize).min(input.len() - 1);
        let weight = (src_index - index1 as f64) as f32;

        output.push(input[index1] * (1.0 - weight) + input[index2] * weight);
    }

    output
}
