use std::time::Duration;

/// Ed25519 public key size in bytes
pub const PUBKEY_SIZE: usize = 32;

/// Grace window between the hide-edit of a deleted message and the
/// destroy request sent to storage. The hide annotation must get a
/// chance to spread to remote peers before the node itself is removed.
pub const DELETE_GRACE: Duration = Duration::from_millis(1000);

/// Number of messages the view window grows by per load-history call.
pub const HISTORY_PAGE: usize = 10;

/// Initial size of a thread's view window.
pub const DEFAULT_TAIL: usize = 30;

/// Display name for a public channel whose node carries no content.
pub const UNNAMED_CHANNEL: &str = "<no name>";

/// Separator between the verb and the reaction name in reaction node
/// content, e.g. `react/thumbsup`.
pub const REACTION_SEPARATOR: char = '/';

/// Node kind for chat messages and their annotations.
pub const KIND_MESSAGE: &str = "message";

/// License template used for every grant issued by the thread layer.
pub const LICENSE_KIND_DEFAULT: &str = "default";

/// How recently an identity must have written to count as active in
/// presence listings.
pub const PRESENCE_ACTIVE_WINDOW: Duration = Duration::from_secs(60);
