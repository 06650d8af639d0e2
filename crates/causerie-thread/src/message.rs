//! The display-ready projection of one message node, and the pure pieces
//! of reaction handling.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use causerie_node::{AnnotationResolver, DataNode, ReactionEntry};
use causerie_shared::constants::REACTION_SEPARATOR;

/// The collected data needed to display a message.
///
/// Owned by the view window and recomputed in place on every change to the
/// underlying node or its annotation state; never partially stale.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Message {
    pub text: String,
    /// Sender's public key, hex encoded.
    pub public_key: String,
    /// Primary node id, hex encoded.
    pub id1: String,
    pub creation_timestamp: DateTime<Utc>,
    /// Winning edit, when the message has been edited. An empty string here
    /// is a hidden message.
    pub edited_text: Option<String>,
    /// Reaction name to endorser set, straight from the merge engine.
    pub reactions: Option<BTreeMap<String, ReactionEntry>>,
    pub has_blob: bool,
    pub blob_length: Option<u64>,
}

/// Recompute `message` from `node`.
///
/// Base fields always reflect the node. Edit and reaction state reflect the
/// annotation blob when it parses; an unparsable blob is ignored and the
/// previous edit/reaction state stands.
pub fn make_data(resolver: &dyn AnnotationResolver, node: &DataNode, message: &mut Message) {
    message.text = String::from_utf8_lossy(node.data()).into_owned();
    message.public_key = node.owner().to_hex();
    message.id1 = node.id1().to_hex();
    message.creation_timestamp = node.creation_time();
    message.has_blob = node.has_blob();
    message.blob_length = node.blob_length();

    let Some(raw) = node.annotations() else {
        return;
    };

    match resolver.resolve(raw) {
        Ok(merged) => {
            if let Some(edit_node) = merged.edit_node {
                message.edited_text =
                    Some(String::from_utf8_lossy(edit_node.data()).into_owned());
            }
            message.reactions = Some(merged.reactions);
        }
        Err(error) => {
            debug!(id1 = %node.id1(), %error, "ignoring unparsable annotations");
        }
    }
}

/// Whether a toggle should add or withdraw the viewer's endorsement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionVerb {
    React,
    Unreact,
}

impl std::fmt::Display for ReactionVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReactionVerb::React => write!(f, "react"),
            ReactionVerb::Unreact => write!(f, "unreact"),
        }
    }
}

impl ReactionVerb {
    /// Wire payload for a reaction node, e.g. `react/thumbsup`.
    pub fn payload(&self, reaction: &str) -> String {
        format!("{self}{REACTION_SEPARATOR}{reaction}")
    }
}

/// Toggle decision: already an endorser means withdraw, otherwise endorse.
pub fn reaction_verb(message: &Message, reaction: &str, viewer_hex: &str) -> ReactionVerb {
    let member = message
        .reactions
        .as_ref()
        .and_then(|map| map.get(reaction))
        .map_or(false, |entry| entry.public_keys.contains(viewer_hex));

    if member {
        ReactionVerb::Unreact
    } else {
        ReactionVerb::React
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use causerie_node::{BincodeResolver, MergedAnnotations, NodeFields};
    use causerie_shared::PublicKey;

    use super::*;

    fn node(owner: PublicKey, text: &str) -> DataNode {
        DataNode::create(NodeFields {
            owner,
            data: Bytes::copy_from_slice(text.as_bytes()),
            ref_id: None,
            parent_id: None,
            blob_length: None,
            licensed: false,
            creation_time: Utc::now(),
        })
    }

    #[test]
    fn test_base_fields() {
        let owner = PublicKey([5u8; 32]);
        let n = node(owner, "hi");
        let mut message = Message::default();
        make_data(&BincodeResolver, &n, &mut message);

        assert_eq!(message.text, "hi");
        assert_eq!(message.public_key, owner.to_hex());
        assert_eq!(message.id1, n.id1().to_hex());
        assert_eq!(message.creation_timestamp, n.creation_time());
        assert_eq!(message.edited_text, None);
        assert_eq!(message.reactions, None);
        assert!(!message.has_blob);
    }

    #[test]
    fn test_annotations_fill_edit_and_reactions() {
        let owner = PublicKey([5u8; 32]);
        let mut merged = MergedAnnotations::default();
        merged.edit_node = Some(node(owner, "hi, edited"));
        merged
            .reactions
            .entry("wave".to_string())
            .or_default()
            .public_keys
            .insert(owner.to_hex());

        let raw = Bytes::from(merged.to_bytes().unwrap());
        let n = node(owner, "hi").with_annotations(raw);

        let mut message = Message::default();
        make_data(&BincodeResolver, &n, &mut message);

        assert_eq!(message.text, "hi");
        assert_eq!(message.edited_text.as_deref(), Some("hi, edited"));
        let reactions = message.reactions.unwrap();
        assert!(reactions["wave"].public_keys.contains(&owner.to_hex()));
    }

    #[test]
    fn test_malformed_annotations_keep_prior_state() {
        let owner = PublicKey([5u8; 32]);
        let n = node(owner, "hi").with_annotations(Bytes::from_static(&[0xde, 0xad]));

        let mut message = Message::default();
        message.edited_text = Some("earlier edit".to_string());
        make_data(&BincodeResolver, &n, &mut message);

        // Base fields recomputed, annotation state untouched.
        assert_eq!(message.text, "hi");
        assert_eq!(message.edited_text.as_deref(), Some("earlier edit"));
        assert_eq!(message.reactions, None);
    }

    #[test]
    fn test_reaction_toggle_decision() {
        let viewer = PublicKey([7u8; 32]).to_hex();
        let mut message = Message::default();

        // No reactions yet: endorse.
        assert_eq!(reaction_verb(&message, "thumbsup", &viewer), ReactionVerb::React);

        let mut map = BTreeMap::new();
        let mut entry = ReactionEntry::default();
        entry.public_keys.insert(viewer.clone());
        map.insert("thumbsup".to_string(), entry);
        message.reactions = Some(map);

        // Already a member: withdraw.
        assert_eq!(
            reaction_verb(&message, "thumbsup", &viewer),
            ReactionVerb::Unreact
        );
        // Different reaction name: endorse.
        assert_eq!(reaction_verb(&message, "wave", &viewer), ReactionVerb::React);
    }

    #[test]
    fn test_verb_payload() {
        assert_eq!(ReactionVerb::React.payload("thumbsup"), "react/thumbsup");
        assert_eq!(ReactionVerb::Unreact.payload("wave"), "unreact/wave");
    }
}
