pub mod pending_handler;
