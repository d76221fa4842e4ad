/// Fill the gaps in a forecast with the last known value.
///
/// Leading gaps take the first known value, trailing gaps are cut off so that the horizon ends
/// with the last known value. A forecast without any known value is all zeros.
pub fn forward_fill<T: Copy + Default>(values: &[Option<T>]) -> Vec<T> {
    let Some(first) = values.iter().flatten().next() else {
        return vec![T::default(); values.len()];
    };
    let end = values.iter().rposition(Option::is_some).map_or(0, |last| last + 1);
    values[..end]
        .iter()
        .scan(*first, |last, value| {
            if let Some(value) = value {
                *last = *value;
            }
            Some(*last)
        })
        .collect()
}
