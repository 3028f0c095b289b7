//! Sortable, time-encoded task identifiers.
//!
//! Ids are UUIDv7 strings: 48 bits of unix milliseconds followed by random
//! bits. The hyphenated lowercase form compares lexicographically the same
//! way the underlying bytes do, so id order is due-time order, and the due
//! time decodes back out of the id at millisecond granularity. Ids minted
//! for the same millisecond differ only in their random tail — they are
//! distinguishable but carry no defined order among themselves.

use uuid::{NoContext, Timestamp, Uuid};

use crate::error::{AlarmError, Result};

/// Largest unix-millisecond value representable in a v7 id (48 bits).
const MAX_UNIX_MS: i64 = (1 << 48) - 1;

/// Mint a fresh id whose sort position encodes `due_ms`.
pub fn mint(due_ms: i64) -> Result<String> {
    let ms = check_range(due_ms)?;
    let ts = Timestamp::from_unix(NoContext, ms / 1000, ((ms % 1000) * 1_000_000) as u32);
    Ok(Uuid::new_v7(ts).to_string())
}

/// Smallest possible id for `due_ms`: the timestamp with an all-zero random
/// tail. Sorts at-or-before every id minted for `due_ms` and strictly after
/// every id minted for an earlier millisecond — the exclusive upper bound
/// used when listing due tasks.
pub fn lower_bound(due_ms: i64) -> Result<String> {
    let ms = check_range(due_ms)?;
    let mut bytes = [0u8; 16];
    bytes[..6].copy_from_slice(&ms.to_be_bytes()[2..]);
    bytes[6] = 0x70; // version 7
    bytes[8] = 0x80; // RFC 4122 variant
    Ok(Uuid::from_bytes(bytes).to_string())
}

/// Recover the due timestamp encoded in `id`.
pub fn decode_ms(id: &str) -> Result<i64> {
    let uuid = Uuid::parse_str(id).map_err(|e| AlarmError::BadId(format!("{id}: {e}")))?;
    let ts = uuid
        .get_timestamp()
        .ok_or_else(|| AlarmError::BadId(format!("{id}: not a time-ordered id")))?;
    let (secs, nanos) = ts.to_unix();
    Ok(secs as i64 * 1000 + i64::from(nanos) / 1_000_000)
}

fn check_range(due_ms: i64) -> Result<u64> {
    if !(0..=MAX_UNIX_MS).contains(&due_ms) {
        return Err(AlarmError::BadId(format!(
            "timestamp out of range: {due_ms}"
        )));
    }
    Ok(due_ms as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_recovers_the_minted_timestamp() {
        for ms in [0, 1, 999, 1_700_000_000_123, MAX_UNIX_MS] {
            let id = mint(ms).unwrap();
            assert_eq!(decode_ms(&id).unwrap(), ms, "round trip for {ms}");
        }
    }

    #[test]
    fn ids_sort_by_timestamp() {
        let earlier = mint(1_700_000_000_000).unwrap();
        let later = mint(1_700_000_000_001).unwrap();
        assert!(earlier < later);
    }

    #[test]
    fn lower_bound_precedes_minted_ids_of_same_millisecond() {
        let ms = 1_700_000_000_500;
        let bound = lower_bound(ms).unwrap();
        for _ in 0..32 {
            let id = mint(ms).unwrap();
            assert!(bound <= id);
        }
        // ...and follows everything minted a millisecond earlier.
        assert!(mint(ms - 1).unwrap() < bound);
        assert_eq!(decode_ms(&bound).unwrap(), ms);
    }

    #[test]
    fn same_millisecond_ids_are_distinct() {
        let a = mint(1_700_000_000_000).unwrap();
        let b = mint(1_700_000_000_000).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn out_of_range_timestamps_are_rejected() {
        assert!(mint(-1).is_err());
        assert!(mint(MAX_UNIX_MS + 1).is_err());
    }

    #[test]
    fn garbage_ids_fail_to_decode() {
        assert!(decode_ms("not-a-uuid").is_err());
        // v4 ids carry no timestamp
        assert!(decode_ms("936da01f-9abd-4d9d-80c7-02af85c822a8").is_err());
    }
}
