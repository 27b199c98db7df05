//! Log records and the pluggable stages around the tailing engine.
//!
//! A [`LineParser`] turns a raw line into a [`LogRecord`]; a [`Sink`]
//! receives every record in emission order.

mod entry;
mod parser;
mod sink;

pub use entry::LogRecord;
pub use parser::{service_from_path, DefaultParser, LineParser, ServiceLabeler};
pub use sink::{ChannelSink, ConsoleSink, Sink, SinkError};
