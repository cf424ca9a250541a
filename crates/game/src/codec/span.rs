use super::CodecError;

/// Copies all of `src` into the front of `dst`.
///
/// Fails without touching `dst` when it is shorter than `src`. An empty source
/// always succeeds.
pub fn copy_span<T: Copy>(src: &[T], dst: &mut [T]) -> Result<usize, CodecError> {
    if dst.len() < src.len() {
        return Err(CodecError::OutputBufferTooSmall {
            needed: src.len(),
            available: dst.len(),
        });
    }

    dst[..src.len()].copy_from_slice(src);
    Ok(src.len())
}
