//! `ELIST` — grounded on `commands/events/commands.go`.

use vstream_protocol::RespValue;
use vstream_store::ScanOptions;

use crate::context::AppContext;
use crate::error::CmdError;

pub fn elist(ctx: &AppContext, args: &[Vec<u8>]) -> Result<RespValue, CmdError> {
    let Some(stream) = args.first() else {
        return Err(CmdError::Client(
            "ELIST must have at least 1 argument, ELIST <stream> [<offset> [<limit>]]".to_owned(),
        ));
    };

    let offset = args.get(1).cloned().unwrap_or_default();
    let limit: usize = match args.get(2) {
        Some(raw) => std::str::from_utf8(raw)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0),
        None => 0,
    };

    let mut data: Vec<RespValue> = Vec::new();
    let mut loaded = 0usize;

    ctx.store.scan(
        ScanOptions {
            prefix: stream.clone(),
            offset: offset.clone(),
            include_offset: offset.is_empty(),
            fetch_values: true,
            ..Default::default()
        },
        &mut |k, v| {
            if limit > 0 && loaded >= limit {
                return false;
            }
            data.push(version_as_integer(&k.version));
            data.push(RespValue::bulk(v));
            loaded += 1;
            true
        },
    )?;

    if data.is_empty() {
        return Ok(RespValue::null_array());
    }

    Ok(RespValue::Array(Some(data)))
}

/// `PUBLISH` already rejected any non-integer version before this event
/// could exist, so parsing here cannot fail for data this server wrote.
fn version_as_integer(version: &[u8]) -> RespValue {
    match std::str::from_utf8(version).ok().and_then(|s| s.parse().ok()) {
        Some(v) => RespValue::Integer(v),
        None => RespValue::null_bulk(),
    }
}
