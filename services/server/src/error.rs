use thiserror::Error;
use vstream_protocol::RespValue;
use vstream_store::StoreError;

/// Every way a command handler can fail, converted to a RESP error at the
/// dispatcher boundary (§4.5 step 5 / §7). None of these close the
/// connection; only a socket write failure during a subscription does that.
#[derive(Debug, Error)]
pub enum CmdError {
    #[error("{0}")]
    Client(String),
    #[error("unknown commands [{0}]")]
    Unknown(String),
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("fatal error: {0}")]
    Fatal(String),
}

impl CmdError {
    pub fn into_resp(self) -> RespValue {
        RespValue::error(self.to_string())
    }
}
