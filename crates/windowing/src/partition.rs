//! Day partitioning for bounded historical pulls.

use chrono::{DateTime, Days, FixedOffset, NaiveTime};
use contracts::TimeWindow;

/// Split a large range into day-aligned slices.
///
/// Devices answer day-sized queries reliably; month-long spans time out or
/// truncate on several firmwares. Slices are contiguous and cover
/// `[start, end)` exactly; the offsets of the inputs are preserved.
pub fn partition_by_day(
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
) -> Vec<TimeWindow> {
    if end < start {
        return Vec::new();
    }
    if start == end {
        return vec![TimeWindow::new(start, end)];
    }

    let mut slices = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let next_midnight = (cursor.date_naive() + Days::new(1))
            .and_time(NaiveTime::MIN)
            .and_local_timezone(*cursor.offset())
            .single();

        let slice_end = match next_midnight {
            Some(midnight) if midnight < end => midnight,
            _ => end,
        };
        slices.push(TimeWindow::new(cursor, slice_end));
        cursor = slice_end;
    }
    slices
}
