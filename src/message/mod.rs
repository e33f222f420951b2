//! The message fabric: wire types, the static router, and TCP framing.

pub mod codec;
pub mod router;
pub mod text;
pub mod types;

pub use codec::{MessageCodec, WireMessage};
pub use router::{EndpointKind, Router};
pub use text::{
    CloseConnectionPayload, FileQueryCommand, FileQueryPayload, FileQueryResultPayload,
    FileQueryStatus, Importance, ModuleAvailablePayload, SendTextPayload, TextType,
    UpdateStatusPayload, handle_file_query,
};
pub use types::{Envelope, MessageType, RouteFlags};
