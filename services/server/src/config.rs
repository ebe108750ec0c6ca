use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BackendArg {
    Sled,
    Redb,
    Rocksdb,
}

impl From<BackendArg> for vstream_store::BackendKind {
    fn from(value: BackendArg) -> Self {
        match value {
            BackendArg::Sled => vstream_store::BackendKind::Sled,
            BackendArg::Redb => vstream_store::BackendKind::Redb,
            BackendArg::Rocksdb => vstream_store::BackendKind::Rocksdb,
        }
    }
}

/// `vstream-server`: an append-only event-stream server speaking RESP.
#[derive(Debug, Parser)]
#[command(name = "vstream-server", version, about)]
pub struct Cli {
    /// TCP port to listen on.
    #[arg(short, long, default_value_t = 6379)]
    pub port: u16,

    /// Storage backend to use.
    #[arg(long, value_enum, default_value = "sled")]
    pub r#type: BackendArg,

    /// Directory to persist the store in.
    #[arg(long)]
    pub out: PathBuf,

    /// Raise the log level from `info` to `debug` and log each dispatched
    /// command (mirroring the source's verbose command/argument log line).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub backend: vstream_store::BackendKind,
    pub out: PathBuf,
    pub verbose: bool,
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        Self {
            port: cli.port,
            backend: cli.r#type.into(),
            out: cli.out,
            verbose: cli.verbose,
        }
    }
}
