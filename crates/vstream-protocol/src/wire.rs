use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// One RESP value, request or reply side.
///
/// `BulkString(None)` and `Array(None)` both encode the RESP null (`$-1\r\n`
/// / `*-1\r\n`); callers pick whichever the reply in question conventionally
/// uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(Option<Vec<u8>>),
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_owned())
    }

    pub fn null_bulk() -> Self {
        RespValue::BulkString(None)
    }

    pub fn null_array() -> Self {
        RespValue::Array(None)
    }

    pub fn bulk(data: impl Into<Vec<u8>>) -> Self {
        RespValue::BulkString(Some(data.into()))
    }

    pub fn error(msg: impl Into<String>) -> Self {
        RespValue::Error(msg.into())
    }

    /// If this value is a request-shaped array of bulk strings, return the
    /// decoded argument vector. Anything else (nested arrays, integers,
    /// simple strings as elements) is not a command this server accepts.
    pub fn into_command_args(self) -> Result<Vec<Vec<u8>>, RespError> {
        match self {
            RespValue::Array(Some(items)) => items
                .into_iter()
                .map(|item| match item {
                    RespValue::BulkString(Some(b)) => Ok(b),
                    other => Err(RespError::Protocol(format!(
                        "expected bulk string command argument, got {other:?}"
                    ))),
                })
                .collect(),
            other => Err(RespError::Protocol(format!(
                "expected array of bulk strings, got {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Error)]
pub enum RespError {
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Finds the offset of the first `\r\n` in `buf`, if complete.
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn parse_line(buf: &[u8]) -> Option<(&[u8], usize)> {
    let idx = find_crlf(buf)?;
    Some((&buf[..idx], idx + 2))
}

/// Parses one RESP value from the front of `buf`. Returns the value and the
/// number of bytes it consumed, or `None` if `buf` does not yet contain a
/// complete value.
fn parse_value(buf: &[u8]) -> Result<Option<(RespValue, usize)>, RespError> {
    if buf.is_empty() {
        return Ok(None);
    }

    let tag = buf[0];
    let rest = &buf[1..];

    match tag {
        b'+' => Ok(parse_line(rest).map(|(line, n)| {
            (
                RespValue::SimpleString(String::from_utf8_lossy(line).into_owned()),
                n + 1,
            )
        })),
        b'-' => Ok(parse_line(rest).map(|(line, n)| {
            (
                RespValue::Error(String::from_utf8_lossy(line).into_owned()),
                n + 1,
            )
        })),
        b':' => {
            let Some((line, n)) = parse_line(rest) else {
                return Ok(None);
            };
            let text = std::str::from_utf8(line)
                .map_err(|_| RespError::Protocol("non-utf8 integer".into()))?;
            let value = text
                .parse::<i64>()
                .map_err(|_| RespError::Protocol(format!("invalid integer {text:?}")))?;
            Ok(Some((RespValue::Integer(value), n + 1)))
        }
        b'$' => {
            let Some((line, n)) = parse_line(rest) else {
                return Ok(None);
            };
            let text = std::str::from_utf8(line)
                .map_err(|_| RespError::Protocol("non-utf8 bulk length".into()))?;
            let len = text
                .parse::<i64>()
                .map_err(|_| RespError::Protocol(format!("invalid bulk length {text:?}")))?;
            let mut consumed = 1 + n;
            if len < 0 {
                return Ok(Some((RespValue::BulkString(None), consumed)));
            }
            let len = len as usize;
            let body_start = consumed;
            if buf.len() < body_start + len + 2 {
                return Ok(None);
            }
            let data = buf[body_start..body_start + len].to_vec();
            if &buf[body_start + len..body_start + len + 2] != b"\r\n" {
                return Err(RespError::Protocol("bulk string missing terminator".into()));
            }
            consumed += len + 2;
            Ok(Some((RespValue::BulkString(Some(data)), consumed)))
        }
        b'*' => {
            let Some((line, n)) = parse_line(rest) else {
                return Ok(None);
            };
            let text = std::str::from_utf8(line)
                .map_err(|_| RespError::Protocol("non-utf8 array length".into()))?;
            let len = text
                .parse::<i64>()
                .map_err(|_| RespError::Protocol(format!("invalid array length {text:?}")))?;
            let mut consumed = 1 + n;
            if len < 0 {
                return Ok(Some((RespValue::Array(None), consumed)));
            }
            let mut items = Vec::with_capacity(len as usize);
            for _ in 0..len {
                match parse_value(&buf[consumed..])? {
                    Some((item, item_len)) => {
                        consumed += item_len;
                        items.push(item);
                    }
                    None => return Ok(None),
                }
            }
            Ok(Some((RespValue::Array(Some(items)), consumed)))
        }
        other => Err(RespError::Protocol(format!(
            "unknown RESP type byte {other:#x}"
        ))),
    }
}

fn encode_value(value: &RespValue, dst: &mut BytesMut) {
    match value {
        RespValue::SimpleString(s) => {
            dst.put_u8(b'+');
            dst.put_slice(s.as_bytes());
            dst.put_slice(b"\r\n");
        }
        RespValue::Error(s) => {
            dst.put_u8(b'-');
            dst.put_slice(s.as_bytes());
            dst.put_slice(b"\r\n");
        }
        RespValue::Integer(i) => {
            dst.put_u8(b':');
            dst.put_slice(i.to_string().as_bytes());
            dst.put_slice(b"\r\n");
        }
        RespValue::BulkString(None) => dst.put_slice(b"$-1\r\n"),
        RespValue::BulkString(Some(data)) => {
            dst.put_u8(b'$');
            dst.put_slice(data.len().to_string().as_bytes());
            dst.put_slice(b"\r\n");
            dst.put_slice(data);
            dst.put_slice(b"\r\n");
        }
        RespValue::Array(None) => dst.put_slice(b"*-1\r\n"),
        RespValue::Array(Some(items)) => {
            dst.put_u8(b'*');
            dst.put_slice(items.len().to_string().as_bytes());
            dst.put_slice(b"\r\n");
            for item in items {
                encode_value(item, dst);
            }
        }
    }
}

/// Length-delimited codec for [`RespValue`], suitable for wrapping a
/// `TcpStream` with `tokio_util::codec::Framed`.
#[derive(Debug, Default)]
pub struct RespCodec;

impl Decoder for RespCodec {
    type Item = RespValue;
    type Error = RespError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match parse_value(src)? {
            Some((value, consumed)) => {
                src.advance(consumed);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

impl Encoder<RespValue> for RespCodec {
    type Error = RespError;

    fn encode(&mut self, item: RespValue, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_value(&item, dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: RespValue) {
        let mut buf = BytesMut::new();
        let mut codec = RespCodec;
        codec.encode(value.clone(), &mut buf).unwrap();
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, value);
        assert!(buf.is_empty());
    }

    #[test]
    fn roundtrips_simple_string() {
        roundtrip(RespValue::SimpleString("OK".into()));
    }

    #[test]
    fn roundtrips_integer() {
        roundtrip(RespValue::Integer(-42));
    }

    #[test]
    fn roundtrips_bulk_string() {
        roundtrip(RespValue::bulk(b"hello world".to_vec()));
    }

    #[test]
    fn roundtrips_null_bulk() {
        roundtrip(RespValue::null_bulk());
    }

    #[test]
    fn roundtrips_command_array() {
        roundtrip(RespValue::Array(Some(vec![
            RespValue::bulk(b"PUBLISH".to_vec()),
            RespValue::bulk(b"stream-a".to_vec()),
            RespValue::bulk(b"1".to_vec()),
        ])));
    }

    #[test]
    fn incomplete_frame_returns_none() {
        let mut buf = BytesMut::from(&b"*2\r\n$3\r\nfoo\r\n"[..]);
        let mut codec = RespCodec;
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn into_command_args_extracts_bulk_strings() {
        let value = RespValue::Array(Some(vec![
            RespValue::bulk(b"EXISTS".to_vec()),
            RespValue::bulk(b"stream-a".to_vec()),
        ]));
        let args = value.into_command_args().unwrap();
        assert_eq!(args, vec![b"EXISTS".to_vec(), b"stream-a".to_vec()]);
    }
}
