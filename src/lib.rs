//! Campfire - chat bridge between game server logs and a messaging platform
//!
//! Polls the chat logs of every world through the server-management API and
//! fans new lines out to opted-in private and group sessions; platform
//! messages are relayed back into the game as announcements.

pub mod adapters;
pub mod bridge;
pub mod common;
pub mod config;
