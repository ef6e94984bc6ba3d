use ndarray::ArrayView2;

/// Maps raw values linearly onto `[0, 1]` using the finite extrema of a slice.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    min: f32,
    range: f32,
}

impl Normalizer {
    pub fn from_slice(slice: ArrayView2<'_, f32>) -> Self {
        let (min, max) = slice
            .iter()
            .filter(|value| value.is_finite())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), &value| {
                (min.min(value), max.max(value))
            });

        if min.is_finite() && max > min {
            Self {
                min,
                range: max - min,
            }
        } else {
            // constant or empty slice
            Self {
                min: if min.is_finite() { min } else { 0.0 },
                range: 0.0,
            }
        }
    }

    pub fn apply(&self, value: f32) -> f32 {
        if self.range == 0.0 || !value.is_finite() {
            return 0.0;
        }
        ((value - self.min) / self.range).clamp(0.0, 1.0)
    }
}

pub fn gray(t: f32) -> [f32; 3] {
    let level = t * 255.0;
    [level, level, level]
}

/// The classic blue-cyan-yellow-red "jet" colormap.
pub fn jet(t: f32) -> [f32; 3] {
    let channel = |center: f32| (1.5 - (4.0 * t - center).abs()).clamp(0.0, 1.0) * 255.0;
    [channel(3.0), channel(2.0), channel(1.0)]
}

/// Alpha-blends `top` over `bottom` and quantizes to 8-bit.
pub fn blend(bottom: [f32; 3], top: [f32; 3], alpha: f32) -> [u8; 3] {
    let mix = |index: usize| {
        ((1.0 - alpha) * bottom[index] + alpha * top[index])
            .round()
            .clamp(0.0, 255.0) as u8
    };
    [mix(0), mix(1), mix(2)]
}
