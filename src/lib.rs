//! A UDP DNS server that answers client queries by forwarding them to an
//! upstream resolver, or by resolving them iteratively from a root server.

pub mod buffer;
pub mod cli;
pub mod codec;
pub mod config;
pub mod errors;
pub mod packet;
pub mod processor;
pub mod protocol;
pub mod record;
pub mod resolver;
pub mod response_builder;
pub mod server;

pub mod actors;
pub mod handlers;
