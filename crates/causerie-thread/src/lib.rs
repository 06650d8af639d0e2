//! # causerie-thread
//!
//! The chat thread core: projects the causally-ordered node log of one
//! channel into a display-ready message list, and mediates every write
//! (post, edit, react, delete) back into that log.
//!
//! The channel identity rules live in [`channel`], the per-message
//! projection in [`message`], and the controller binding them to a live
//! view window in [`controller`]. Storage, sync, and CRDT annotation
//! merging stay behind the `causerie-node` traits.

pub mod channel;
pub mod controller;
pub mod message;

mod error;

pub use channel::{channel_name, is_private_channel, license_targets};
pub use controller::MessageController;
pub use error::ThreadError;
pub use message::{reaction_verb, Message, ReactionVerb};
