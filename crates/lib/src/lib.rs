//! fuelbridge core library — config, Dialogflow client, session gateway, response
//! normalizer and the webhook server used by the CLI.

pub mod config;
pub mod dialogflow;
pub mod error;
pub mod gateway;
pub mod normalize;
pub mod session;
