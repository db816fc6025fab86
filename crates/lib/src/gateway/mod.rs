//! Gateway: the chat platform's webhook endpoint.
//!
//! Single route accepts POSTed turns; `GET /` is a health check. All failure policy
//! (status codes, fallback text) lives in `server`.

mod protocol;
mod server;

pub use protocol::{
    ErrorBody, InboundMessage, OutboundPayload, INTENT_ATTRIBUTE, MISSING_FIELDS_TEXT,
};
pub use server::{build_router, run_gateway, run_turn, GatewayState, FALLBACK_TEXT, SECRET_HEADER};
