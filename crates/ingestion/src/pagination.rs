//! Pagination planning.

/// Decide the next search result position, or `None` when pagination for
/// the window is exhausted.
///
/// `total_matches` is `None` when the device did not report a usable total;
/// in that case a short page (fewer records than requested) signals the
/// last page.
pub fn next_position(
    current: u64,
    returned: u64,
    total_matches: Option<u64>,
    page_size: u32,
) -> Option<u64> {
    if returned == 0 {
        return None;
    }
    let next = current + returned;
    if let Some(total) = total_matches {
        if next > total {
            return None;
        }
    } else if returned < page_size as u64 {
        return None;
    }
    Some(next)
}
