/// Free bytes needed before a transfer of `size` bytes may start.
pub fn required_bytes(size: u64, buffer: u64) -> u64 {
    size.saturating_add(buffer)
}

/// Whether a leftover temp file of `existing` bytes counts as complete.
///
/// Size-only: anything no more than `tolerance` bytes short of `expected` is
/// accepted without looking at its contents.
pub fn is_resumable(existing: u64, expected: u64, tolerance: u64) -> bool {
    existing >= expected.saturating_sub(tolerance)
}
