//! `PUBLISH`, `SUBSCRIBE`, `SUBSCRIBEALL` — grounded on
//! `commands/pubsub/commands.go`.
//!
//! `SUBSCRIBE`/`SUBSCRIBEALL` apply the subscribe replay/live join
//! REDESIGN FLAG from SPEC_FULL.md §9: the broadcaster listener is acquired
//! *before* the replay scan (not after, as in the source), the replay is
//! bounded to what the scan itself turns up, and any live event matching an
//! already-replayed `(stream, version)` pair is dropped — closing the gap
//! and the duplicate window the source leaves open.

use std::collections::HashSet;

use futures::SinkExt;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::debug;
use ulid::Ulid;
use vstream_protocol::{RespCodec, RespValue};
use vstream_bus::Receiver;
use vstream_store::{Key, ScanOptions};

use crate::context::{AppContext, PublishedEvent};
use crate::error::CmdError;

pub fn publish(ctx: &AppContext, args: &[Vec<u8>]) -> Result<RespValue, CmdError> {
    if args.len() < 3 {
        return Err(CmdError::Client(
            "PUBLISH command must have all required arguments: PUBLISH <stream> <version> <payload>"
                .to_owned(),
        ));
    }
    let stream = &args[0];
    let version = &args[1];
    let payload = &args[2];

    if std::str::from_utf8(version)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .is_none()
    {
        return Err(CmdError::Client(
            "PUBLISH command must have an integer version string".to_owned(),
        ));
    }

    let id = vstream_store::gen_ulid();
    let key = Key::new(id, stream.clone(), version.clone());
    ctx.store.set(&key, payload)?;

    ctx.bus.publish(PublishedEvent {
        stream: stream.clone(),
        event_id: id,
        version: version.clone(),
        data: payload.clone(),
    });

    Ok(RespValue::ok())
}

fn push_frame(event: &PublishedEvent) -> RespValue {
    RespValue::Array(Some(vec![
        RespValue::bulk(event.stream.clone()),
        RespValue::bulk(event.event_id.to_string().into_bytes()),
        RespValue::bulk(event.version.clone()),
        RespValue::bulk(event.data.clone()),
    ]))
}

/// `SUBSCRIBE <stream> [<offset>]`. Takes ownership of the connection for
/// the rest of its life; the dispatcher never resumes its request/response
/// loop on `conn` once this is called.
pub async fn subscribe(
    ctx: &AppContext,
    args: &[Vec<u8>],
    conn: &mut Framed<TcpStream, RespCodec>,
) -> Result<(), CmdError> {
    let Some(stream) = args.first().cloned() else {
        conn.send(
            CmdError::Client(
                "SUBSCRIBE must have at least 1 argument, SUBSCRIBE <stream> [<offset>]"
                    .to_owned(),
            )
            .into_resp(),
        )
        .await
        .ok();
        return Ok(());
    };
    let offset = args.get(1).cloned().unwrap_or_default();

    // Acquire the listener before replaying, per the REDESIGN FLAG.
    let mut listener = ctx.bus.listen().await;

    let mut seen: HashSet<(Vec<u8>, Vec<u8>)> = HashSet::new();
    let mut replay = Vec::new();
    ctx.store.scan(
        ScanOptions {
            prefix: stream.clone(),
            offset: offset.clone(),
            include_offset: offset.is_empty(),
            fetch_values: true,
            ..Default::default()
        },
        &mut |k, v| {
            seen.insert((k.stream.clone(), k.version.clone()));
            replay.push(RespValue::Array(Some(vec![
                RespValue::bulk(k.stream),
                RespValue::bulk(Ulid::nil().to_string().into_bytes()),
                RespValue::bulk(k.version),
                RespValue::bulk(v),
            ])));
            true
        },
    )?;

    for frame in replay {
        conn.send(frame).await.map_err(|e| CmdError::Fatal(e.to_string()))?;
    }

    live_loop(conn, &mut listener, seen, move |evt| evt.stream == stream).await
}

/// `SUBSCRIBEALL [<timePrefix>]`. Same handover as `subscribe`, scanning
/// the secondary time index instead of a single stream's primary rows.
pub async fn subscribe_all(
    ctx: &AppContext,
    args: &[Vec<u8>],
    conn: &mut Framed<TcpStream, RespCodec>,
) -> Result<(), CmdError> {
    let time_prefix = args.first().cloned().unwrap_or_default();
    let include_offset = time_prefix.is_empty();

    let mut listener = ctx.bus.listen().await;

    let mut seen: HashSet<(Vec<u8>, Vec<u8>)> = HashSet::new();
    let mut replay = Vec::new();
    ctx.store.scan(
        ScanOptions {
            prefix: time_prefix,
            include_offset,
            fetch_values: true,
            index: true,
            ..Default::default()
        },
        &mut |k, v| {
            seen.insert((k.stream.clone(), k.version.clone()));
            replay.push(RespValue::Array(Some(vec![
                RespValue::bulk(k.stream),
                RespValue::bulk(k.id.to_string().into_bytes()),
                RespValue::bulk(k.version),
                RespValue::bulk(v),
            ])));
            true
        },
    )?;

    for frame in replay {
        conn.send(frame).await.map_err(|e| CmdError::Fatal(e.to_string()))?;
    }

    live_loop(conn, &mut listener, seen, |_evt: &PublishedEvent| true).await
}

/// Drains the broadcaster onto `conn` forever (until the client disconnects
/// or the broadcaster shuts down), applying `scope` to restrict which
/// events this subscription cares about and dropping anything already
/// covered by the replay in `seen`.
async fn live_loop(
    conn: &mut Framed<TcpStream, RespCodec>,
    listener: &mut Receiver<PublishedEvent>,
    mut seen: HashSet<(Vec<u8>, Vec<u8>)>,
    scope: impl Fn(&PublishedEvent) -> bool,
) -> Result<(), CmdError> {
    while let Some(event) = listener.read().await {
        if !scope(&event) {
            continue;
        }
        if seen.remove(&(event.stream.clone(), event.version.clone())) {
            continue;
        }
        if let Err(err) = conn.send(push_frame(&event)).await {
            debug!(error = %err, "subscriber disconnected");
            break;
        }
    }
    Ok(())
}
