//! `DELETE`, `EXISTS`, `SLIST` — grounded on `commands/stream/commands.go`.

use std::collections::HashMap;

use vstream_protocol::RespValue;
use vstream_store::ScanOptions;

use crate::context::AppContext;
use crate::error::CmdError;

pub fn delete(ctx: &AppContext, args: &[Vec<u8>]) -> Result<RespValue, CmdError> {
    if args.is_empty() {
        return Err(CmdError::Client(
            "DELETE command must have at least 1 argument: DELETE <stream> [<stream2> ...]"
                .to_owned(),
        ));
    }

    ctx.store.del(args)?;
    Ok(RespValue::ok())
}

/// Reimplemented per the REDESIGN FLAG in §9: a one-row prefix scan against
/// the primary namespace, correct for every backend — unlike the source's
/// `Get`-with-zero-version trick, which only happened to work for the
/// bucket-style backend.
pub fn exists(ctx: &AppContext, args: &[Vec<u8>]) -> Result<RespValue, CmdError> {
    let Some(stream) = args.first() else {
        return Err(CmdError::Client(
            "EXISTS command must have at least 1 argument: EXISTS <stream>".to_owned(),
        ));
    };

    let mut found = false;
    ctx.store.scan(
        ScanOptions {
            prefix: stream.clone(),
            include_offset: true,
            fetch_values: false,
            ..Default::default()
        },
        &mut |_k, _v| {
            found = true;
            false
        },
    )?;

    Ok(RespValue::Integer(i64::from(found)))
}

pub fn slist(ctx: &AppContext, _args: &[Vec<u8>]) -> Result<RespValue, CmdError> {
    let mut counts: HashMap<Vec<u8>, i64> = HashMap::new();

    ctx.store.scan(
        ScanOptions {
            include_offset: true,
            fetch_values: false,
            ..Default::default()
        },
        &mut |k, _v| {
            *counts.entry(k.stream).or_insert(0) += 1;
            true
        },
    )?;

    let mut items = Vec::with_capacity(counts.len() * 2);
    for (stream, count) in counts {
        items.push(RespValue::bulk(stream));
        items.push(RespValue::Integer(count));
    }
    Ok(RespValue::Array(Some(items)))
}
