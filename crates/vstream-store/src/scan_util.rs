//! Shared offset/prefix-skip logic for [`crate::driver::StoreDriver::scan`]
//! implementations.
//!
//! Every backend iterates its own storage engine differently, but the
//! "skip until the offset suffix, then emit or skip it, then continue"
//! semantics in §4.3 of the contract are identical across all of them. This
//! is factored out once so the three backends cannot drift from each other.

use crate::driver::{ScanHandler, ScanOptions};
use crate::error::{StoreError, StoreResult};
use crate::keycodec::Key;

/// Drives `iter` (already restricted to the scan's prefix, in key order)
/// through the offset-skip / include-offset / handler-stop rules shared by
/// every backend.
///
/// `unpack` turns a raw key back into a [`Key`]; it differs between the
/// primary and secondary namespaces.
pub fn drive<I>(
    iter: I,
    opts: &ScanOptions,
    unpack: impl Fn(&[u8]) -> StoreResult<Key>,
    handler: ScanHandler<'_>,
) -> StoreResult<()>
where
    I: Iterator<Item = StoreResult<(Vec<u8>, Vec<u8>)>>,
{
    let mut seen = opts.offset.is_empty();

    for item in iter {
        let (raw_key, raw_value) = item?;

        let has_suffix = raw_key.ends_with(&opts.offset);

        if !seen && !has_suffix {
            continue;
        }
        seen = true;

        if has_suffix && !opts.include_offset {
            continue;
        }

        let key = unpack(&raw_key).map_err(|_| StoreError::InvalidKeyFormat(raw_key.clone()))?;
        let value = if opts.fetch_values {
            raw_value
        } else {
            Vec::new()
        };

        if !handler(key, value) {
            break;
        }
    }

    Ok(())
}
