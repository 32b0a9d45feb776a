use num_traits::Float;

/// Produce `n` evenly spaced integer coordinates starting at `start`, as the
/// floating point pixel axis of a spectrum.
pub fn arange<T: Float>(start: usize, end: usize) -> Vec<T> {
    (start..end).map(|i| T::from(i).unwrap_or_else(T::nan)).collect()
}

/// The index of the smallest value, the first one on ties. `NaN` values are
/// never selected.
pub fn argmin<T: Float>(values: &[T]) -> Option<usize> {
    let mut best: Option<(usize, T)> = None;
    for (i, v) in values.iter().copied().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, current)) if current <= v => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

pub fn minmax<T: Float>(values: &[T]) -> (T, T) {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold((T::infinity(), T::neg_infinity()), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        })
}

/// Evenly spaced values from `start` up to, but not including, `end`
#[cfg(test)]
pub(crate) fn gridspace<T: Float>(start: T, end: T, step: T) -> Vec<T> {
    let distance = end - start;
    let steps = (distance / step).to_usize().unwrap_or_default();
    let mut result = Vec::with_capacity(steps);
    for i in 0..steps {
        result.push(start + T::from(i).unwrap_or_else(T::zero) * step);
    }
    result
}
