pub mod messages;
pub mod pending_actor;
