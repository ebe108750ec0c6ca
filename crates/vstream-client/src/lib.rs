//! A small typed RESP client, grounded on the original's Go
//! `client/client.go` and `client/resp.go`.
//!
//! Exists for integration tests and any external embedder that wants a
//! non-stringly-typed way to drive a `vstream-server`; the server itself
//! never depends on this crate.

use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use vstream_protocol::{RespCodec, RespError, RespValue};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] RespError),
    #[error("server error: {0}")]
    Server(String),
    #[error("connection closed")]
    Closed,
    #[error("unexpected reply shape: {0:?}")]
    UnexpectedReply(RespValue),
}

type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamCount {
    pub stream: Vec<u8>,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleEvent {
    pub version: i64,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullEvent {
    pub stream: Vec<u8>,
    pub event_id: String,
    pub version: Vec<u8>,
    pub data: Vec<u8>,
}

/// A connection in request/response mode.
pub struct Client {
    conn: Framed<TcpStream, RespCodec>,
}

impl Client {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            conn: Framed::new(stream, RespCodec),
        })
    }

    async fn call(&mut self, args: Vec<Vec<u8>>) -> Result<RespValue> {
        let command = RespValue::Array(Some(args.into_iter().map(RespValue::bulk).collect()));
        self.conn.send(command).await?;
        match self.conn.next().await {
            Some(Ok(RespValue::Error(msg))) => Err(ClientError::Server(msg)),
            Some(Ok(value)) => Ok(value),
            Some(Err(e)) => Err(e.into()),
            None => Err(ClientError::Closed),
        }
    }

    pub async fn ping(&mut self) -> Result<()> {
        self.call(vec![b"PING".to_vec()]).await?;
        Ok(())
    }

    pub async fn delete(&mut self, streams: &[&[u8]]) -> Result<()> {
        let mut args = vec![b"DELETE".to_vec()];
        args.extend(streams.iter().map(|s| s.to_vec()));
        self.call(args).await?;
        Ok(())
    }

    pub async fn exists(&mut self, stream: &[u8]) -> Result<bool> {
        match self.call(vec![b"EXISTS".to_vec(), stream.to_vec()]).await? {
            RespValue::Integer(n) => Ok(n != 0),
            other => Err(ClientError::UnexpectedReply(other)),
        }
    }

    pub async fn slist(&mut self) -> Result<Vec<StreamCount>> {
        match self.call(vec![b"SLIST".to_vec()]).await? {
            RespValue::Array(Some(items)) => {
                let mut out = Vec::with_capacity(items.len() / 2);
                let mut iter = items.into_iter();
                while let (Some(stream), Some(count)) = (iter.next(), iter.next()) {
                    out.push(StreamCount {
                        stream: expect_bulk(stream)?,
                        count: expect_int(count)?,
                    });
                }
                Ok(out)
            }
            RespValue::Array(None) => Ok(Vec::new()),
            other => Err(ClientError::UnexpectedReply(other)),
        }
    }

    pub async fn elist(
        &mut self,
        stream: &[u8],
        offset: Option<&[u8]>,
        limit: Option<u32>,
    ) -> Result<Vec<SimpleEvent>> {
        let mut args = vec![b"ELIST".to_vec(), stream.to_vec()];
        if let Some(offset) = offset {
            args.push(offset.to_vec());
            if let Some(limit) = limit {
                args.push(limit.to_string().into_bytes());
            }
        }

        match self.call(args).await? {
            RespValue::Array(Some(items)) => {
                let mut out = Vec::with_capacity(items.len() / 2);
                let mut iter = items.into_iter();
                while let (Some(version), Some(data)) = (iter.next(), iter.next()) {
                    out.push(SimpleEvent {
                        version: expect_int(version)?,
                        data: expect_bulk(data)?,
                    });
                }
                Ok(out)
            }
            RespValue::Array(None) | RespValue::BulkString(None) => Ok(Vec::new()),
            other => Err(ClientError::UnexpectedReply(other)),
        }
    }

    pub async fn publish(&mut self, stream: &[u8], version: &[u8], payload: &[u8]) -> Result<()> {
        self.call(vec![
            b"PUBLISH".to_vec(),
            stream.to_vec(),
            version.to_vec(),
            payload.to_vec(),
        ])
        .await?;
        Ok(())
    }

    /// Sends `SUBSCRIBE` and converts this connection into a push-only
    /// [`Subscription`]. The server never replies to anything sent after
    /// this point except pushed event frames.
    pub async fn subscribe(mut self, stream: &[u8], offset: Option<&[u8]>) -> Result<Subscription> {
        let mut args = vec![b"SUBSCRIBE".to_vec(), stream.to_vec()];
        if let Some(offset) = offset {
            args.push(offset.to_vec());
        }
        let command = RespValue::Array(Some(args.into_iter().map(RespValue::bulk).collect()));
        self.conn.send(command).await?;
        Ok(Subscription { conn: self.conn })
    }

    /// Sends `SUBSCRIBEALL` and converts this connection into a push-only
    /// [`Subscription`] over the secondary time index.
    pub async fn subscribe_all(mut self, time_prefix: Option<&[u8]>) -> Result<Subscription> {
        let mut args = vec![b"SUBSCRIBEALL".to_vec()];
        if let Some(prefix) = time_prefix {
            args.push(prefix.to_vec());
        }
        let command = RespValue::Array(Some(args.into_iter().map(RespValue::bulk).collect()));
        self.conn.send(command).await?;
        Ok(Subscription { conn: self.conn })
    }
}

/// A connection that has been handed over to the server's live-push loop.
/// No further commands can be sent on it.
pub struct Subscription {
    conn: Framed<TcpStream, RespCodec>,
}

impl Subscription {
    /// Waits for the next pushed event, or `None` if the server closed the
    /// connection.
    pub async fn next_event(&mut self) -> Result<Option<FullEvent>> {
        match self.conn.next().await {
            None => Ok(None),
            Some(Err(e)) => Err(e.into()),
            Some(Ok(RespValue::Array(Some(items)))) if items.len() == 4 => {
                let mut iter = items.into_iter();
                let stream = expect_bulk(iter.next().unwrap())?;
                let event_id = String::from_utf8_lossy(&expect_bulk(iter.next().unwrap())?).into_owned();
                let version = expect_bulk(iter.next().unwrap())?;
                let data = expect_bulk(iter.next().unwrap())?;
                Ok(Some(FullEvent {
                    stream,
                    event_id,
                    version,
                    data,
                }))
            }
            Some(Ok(other)) => Err(ClientError::UnexpectedReply(other)),
        }
    }
}

fn expect_bulk(value: RespValue) -> Result<Vec<u8>> {
    match value {
        RespValue::BulkString(Some(b)) => Ok(b),
        other => Err(ClientError::UnexpectedReply(other)),
    }
}

fn expect_int(value: RespValue) -> Result<i64> {
    match value {
        RespValue::Integer(i) => Ok(i),
        // ELIST's version field round-trips as an integer reply, but
        // `expect_int` is also handed SLIST's count, which is one too —
        // both are plain RESP integers on the wire.
        other => Err(ClientError::UnexpectedReply(other)),
    }
}
