use std::sync::Arc;

use ulid::Ulid;
use vstream_store::StoreDriver;

/// What gets pushed onto the broadcaster for every successful `PUBLISH`,
/// and what every `SUBSCRIBE`/`SUBSCRIBEALL` listener ultimately receives.
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub stream: Vec<u8>,
    pub event_id: Ulid,
    pub version: Vec<u8>,
    pub data: Vec<u8>,
}

pub type Bus = vstream_bus::Broadcaster<PublishedEvent>;

/// Shared, per-server state handed to every command handler. Not shared
/// across connections beyond these two handles, both of which are safe to
/// call from any task (§5).
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn StoreDriver>,
    pub bus: Bus,
}
