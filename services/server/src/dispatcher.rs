//! Accept loop and per-connection command dispatch, grounded on
//! `server/server.go`'s request loop plus this codebase's panic-boundary
//! idiom (`services/streamer/src/main.rs` wraps each inbound frame
//! similarly).

use std::io;
use std::panic::AssertUnwindSafe;

use futures::{FutureExt, SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tracing::{debug, error, info, warn};
use vstream_protocol::{RespCodec, RespValue};

use crate::context::AppContext;
use crate::error::CmdError;
use crate::handlers::{events, pubsub, stream};

/// Writes one reply frame, translating a codec-level write failure into an
/// `io::Error` so callers can propagate it with `?`.
async fn reply(conn: &mut Framed<TcpStream, RespCodec>, value: RespValue) -> io::Result<()> {
    conn.send(value)
        .await
        .map_err(|err| io::Error::other(err.to_string()))
}

/// Serves connections accepted on `listener` until `shutdown` resolves.
/// Each connection is handled on its own task; a panic inside one command
/// doesn't bring down the listener or any other connection.
pub async fn serve(
    listener: TcpListener,
    ctx: AppContext,
    shutdown: impl std::future::Future<Output = ()>,
) -> std::io::Result<()> {
    info!(addr = ?listener.local_addr(), "server listening");

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (socket, peer) = accepted?;
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    debug!(%peer, "connection accepted");
                    if let Err(err) = handle_connection(socket, ctx).await {
                        warn!(%peer, error = %err, "connection ended with an error");
                    }
                });
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, no longer accepting connections");
                return Ok(());
            }
        }
    }
}

/// Uppercase-folds and trims the verb, and trims the leading/trailing ASCII
/// whitespace of every structural argument, mirroring the source's
/// `strings.TrimSpace`/`bytes.TrimSpace` normalization in
/// `server/server_resp.go`. Deviates from the source for `PUBLISH`'s last
/// argument — the event payload is opaque data, not a command token, and
/// trimming it would silently corrupt a payload that happens to start or
/// end with whitespace bytes.
fn trim_structural_args(verb: &str, args: &[Vec<u8>]) -> Vec<Vec<u8>> {
    let payload_index = (verb == "PUBLISH").then(|| args.len().saturating_sub(1));
    args.iter()
        .enumerate()
        .map(|(i, arg)| {
            if Some(i) == payload_index {
                arg.clone()
            } else {
                arg.trim_ascii().to_vec()
            }
        })
        .collect()
}

async fn handle_connection(socket: TcpStream, ctx: AppContext) -> std::io::Result<()> {
    let mut conn = Framed::new(socket, RespCodec::default());

    while let Some(frame) = conn.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                debug!(error = %err, "connection closed on a protocol error");
                return Ok(());
            }
        };

        let args = match frame.into_command_args() {
            Ok(args) if !args.is_empty() => args,
            Ok(_) => {
                reply(&mut conn, CmdError::Client("expected a non-empty command array".into()).into_resp()).await?;
                continue;
            }
            Err(err) => {
                reply(&mut conn, CmdError::Client(err.to_string()).into_resp()).await?;
                continue;
            }
        };

        let verb = String::from_utf8_lossy(args[0].trim_ascii()).to_ascii_uppercase();
        let rest = trim_structural_args(&verb, &args[1..]);
        let rest = rest.as_slice();

        if verb == "QUIT" {
            reply(&mut conn, RespValue::ok()).await?;
            return Ok(());
        }
        if verb == "PING" {
            reply(&mut conn, RespValue::SimpleString("PONG".into())).await?;
            continue;
        }

        // SUBSCRIBE/SUBSCRIBEALL hand the connection off and never return
        // to this request/response loop.
        if verb == "SUBSCRIBE" {
            let outcome = AssertUnwindSafe(pubsub::subscribe(&ctx, rest, &mut conn))
                .catch_unwind()
                .await;
            finish_subscription(outcome, &mut conn).await?;
            return Ok(());
        }
        if verb == "SUBSCRIBEALL" {
            let outcome = AssertUnwindSafe(pubsub::subscribe_all(&ctx, rest, &mut conn))
                .catch_unwind()
                .await;
            finish_subscription(outcome, &mut conn).await?;
            return Ok(());
        }

        let reply_value = dispatch(&verb, rest, &ctx).await;
        reply(&mut conn, reply_value).await?;
    }

    Ok(())
}

/// Reports the outcome of a finished subscription, converting a caught
/// panic into a best-effort error reply. The connection is about to be
/// torn down either way since the subscription owned it for its remaining
/// lifetime once it started.
async fn finish_subscription(
    outcome: std::thread::Result<Result<(), CmdError>>,
    conn: &mut Framed<TcpStream, RespCodec>,
) -> std::io::Result<()> {
    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => reply(conn, err.into_resp()).await,
        Err(_) => {
            error!("panic while serving a subscription");
            reply(conn, CmdError::Fatal("internal error".into()).into_resp()).await
        }
    }
}

/// Looks up and runs the handler for `verb`, translating both ordinary
/// command errors and a caught panic into a RESP error reply. Mirrors the
/// source's static verb-to-handler map (`server/commands.go`).
async fn dispatch(verb: &str, args: &[Vec<u8>], ctx: &AppContext) -> RespValue {
    let outcome = AssertUnwindSafe(async {
        match verb {
            "PUBLISH" => pubsub::publish(ctx, args),
            "DELETE" => stream::delete(ctx, args),
            "EXISTS" => stream::exists(ctx, args),
            "SLIST" => stream::slist(ctx, args),
            "ELIST" => events::elist(ctx, args),
            other => Err(CmdError::Unknown(other.to_owned())),
        }
    })
    .catch_unwind()
    .await;

    match outcome {
        Ok(Ok(value)) => value,
        Ok(Err(err)) => err.into_resp(),
        Err(_) => {
            error!(%verb, "panic while handling command");
            CmdError::Fatal("internal error".into()).into_resp()
        }
    }
}
