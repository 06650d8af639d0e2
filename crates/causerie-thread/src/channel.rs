//! Channel identity rules: privacy classification, display naming, and
//! license target derivation. All pure; a channel's classification and
//! participant set never change after creation.

use causerie_node::DataNode;
use causerie_shared::constants::UNNAMED_CHANNEL;
use causerie_shared::PublicKey;

/// A channel with a non-empty `ref_id` is a private channel between two
/// peers: the node's owner and the holder of the key in `ref_id`.
pub fn is_private_channel(channel: &DataNode) -> bool {
    channel.ref_id().map_or(false, |r| !r.is_empty())
}

/// Display name of a channel from `viewer`'s point of view.
///
/// For a private channel the name is the *other* participant's public key
/// in hex, whichever side is looking. For a public channel it is the
/// channel content, or a placeholder when there is none.
pub fn channel_name(channel: &DataNode, viewer: &PublicKey) -> String {
    if is_private_channel(channel) {
        let ref_id = channel.ref_id().unwrap_or_default();
        if ref_id == viewer.as_bytes() {
            return channel.owner().to_hex();
        }
        return hex::encode(ref_id);
    }

    if channel.data().is_empty() {
        UNNAMED_CHANNEL.to_string()
    } else {
        String::from_utf8_lossy(channel.data()).into_owned()
    }
}

/// Identities that must receive a license for a write in this channel to
/// reach its audience.
///
/// Public channels get an empty set: their permission policy is left open
/// for now. Private channels get both participants, with a degenerate
/// self-referential channel contributing the owner only once.
pub fn license_targets(channel: &DataNode) -> Vec<PublicKey> {
    if !is_private_channel(channel) {
        return Vec::new();
    }

    let mut targets = vec![*channel.owner()];

    let peer = channel.ref_id().and_then(PublicKey::from_bytes);
    if let Some(peer) = peer {
        if &peer != channel.owner() {
            targets.push(peer);
        }
    }

    targets
}
