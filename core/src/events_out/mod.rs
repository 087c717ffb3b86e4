mod record;
mod writer;

pub use crate::config::EventsOutConfig;
pub use record::EventRecord;
pub use writer::{start_events_out, EventsOut, EventsOutTx};
