//! Windows FILETIME conversions.
//!
//! FILETIME counts 100-nanosecond ticks since 1601-01-01. The rest of this
//! crate treats timestamp/UTF-16 conversion as library calls (out of scope
//! per the spec); this module is the thin adapter onto `time`.

use time::OffsetDateTime;

/// Ticks between the FILETIME epoch (1601-01-01) and the Unix epoch (1970-01-01).
const EPOCH_DIFFERENCE_NS: i128 = 11_644_473_600_000_000_000;

/// Convert a FILETIME tick count into nanoseconds since the Unix epoch.
pub fn ticks_to_unix_nanos(ticks: u64) -> i128 {
    (ticks as i128) * 100 - EPOCH_DIFFERENCE_NS
}

/// Convert a FILETIME tick count into a wall-clock `OffsetDateTime` (UTC).
///
/// Returns `None` if the resulting instant is out of `time`'s representable
/// range; callers that only need the raw nanosecond count should prefer
/// [`ticks_to_unix_nanos`].
pub fn ticks_to_datetime(ticks: u64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(ticks_to_unix_nanos(ticks)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_round_trips() {
        // 1601-01-01 itself: ticks == 0.
        assert_eq!(ticks_to_unix_nanos(0), -EPOCH_DIFFERENCE_NS);
    }

    #[test]
    fn unix_epoch_ticks() {
        let dt = ticks_to_datetime(116_444_736_000_000_000).unwrap();
        assert_eq!(dt.unix_timestamp(), 0);
    }
}
