use std::ops::Range;

/// Splits `0..total` into consecutive waves of at most `width` chunk indices.
///
/// Each wave is dispatched concurrently and awaited as a whole before the
/// next one starts.
pub fn plan_waves(total: u64, width: usize) -> impl Iterator<Item = Range<u64>> {
    let width = width.max(1) as u64;
    (0..total.div_ceil(width)).map(move |wave| {
        let start = wave * width;
        start..(start + width).min(total)
    })
}
