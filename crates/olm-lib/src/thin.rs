use olm_core::errors::{ErrorInfo, OlmError};

/// Indices retained when keeping every `keep_every`-th step.
///
/// The first and last index are always kept. Walking the interior, an index
/// is kept once `keep_every` steps have elapsed since the previous kept one,
/// so the result is `0, N, 2N, ...` followed by `len - 1`.
pub fn thinned_indices(len: usize, keep_every: usize) -> Result<Vec<usize>, OlmError> {
    if keep_every == 0 {
        return Err(OlmError::Configuration(
            ErrorInfo::new("keep_every_zero", "keep_every must be at least 1")
                .with_hint("use 1 to keep every burnup step"),
        ));
    }
    let mut kept = Vec::with_capacity(len / keep_every + 2);
    let mut since_kept = keep_every;
    for index in 0..len {
        if index == 0 || index + 1 == len || since_kept >= keep_every {
            kept.push(index);
            since_kept = 0;
        }
        since_kept += 1;
    }
    Ok(kept)
}

/// Retains the items at [`thinned_indices`].
pub fn thin<T: Clone>(items: &[T], keep_every: usize) -> Result<Vec<T>, OlmError> {
    Ok(thinned_indices(items.len(), keep_every)?
        .into_iter()
        .map(|index| items[index].clone())
        .collect())
}
