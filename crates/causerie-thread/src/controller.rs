//! The message thread controller: binds one channel to a live view window,
//! projects its nodes into [`Message`]s, and turns caller writes into node
//! creation, annotation, and license calls against storage.

use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use causerie_node::{
    AnnotationResolver, DataNode, PostParams, ThreadApi, ThreadParams, ThreadView, ViewEvent,
};
use causerie_shared::constants::{DELETE_GRACE, HISTORY_PAGE, KIND_MESSAGE, LICENSE_KIND_DEFAULT};
use causerie_shared::{NodeId, PublicKey};

use crate::channel;
use crate::error::{Result, ThreadError};
use crate::message::{self, Message};

/// Capacity of the coalesced change-notification channel.
const CHANGE_CAPACITY: usize = 64;

/// Controller for one chat thread.
///
/// License targets are computed once at construction and never change, like
/// the channel's participant set they derive from. The view window is only
/// mutated through [`apply`](Self::apply); writes read it synchronously (to
/// capture the ref chain) but never hold it across a suspension.
pub struct MessageController<T, R> {
    thread: T,
    resolver: R,
    channel: DataNode,
    public_key: PublicKey,
    params: ThreadParams,
    /// License targets, fixed for the controller's lifetime.
    targets: Vec<PublicKey>,
    view: Mutex<ThreadView<Message>>,
    changed: broadcast::Sender<()>,
}

impl<T, R> MessageController<T, R>
where
    T: ThreadApi,
    R: AnnotationResolver + Send + Sync + 'static,
{
    /// Bind a controller to `channel`. The thread's parent linkage is set to
    /// the channel's id and the license target set is cached.
    pub fn new(
        thread: T,
        resolver: R,
        mut params: ThreadParams,
        public_key: PublicKey,
        channel: DataNode,
    ) -> Self {
        params.defaults.parent_id = Some(*channel.id1());
        let targets = channel::license_targets(&channel);
        let view = Mutex::new(ThreadView::new(params.tail));
        let (changed, _) = broadcast::channel(CHANGE_CAPACITY);

        Self {
            thread,
            resolver,
            channel,
            public_key,
            params,
            targets,
            view,
            changed,
        }
    }

    /// Coalesced change notifications: one `()` per applied view event.
    /// A receiver obtained before a mutation observes that mutation once.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.changed.subscribe()
    }

    pub fn channel(&self) -> &DataNode {
        &self.channel
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn license_targets(&self) -> &[PublicKey] {
        &self.targets
    }

    /// Name of the bound channel from the viewer's perspective.
    pub fn get_name(&self) -> String {
        channel::channel_name(&self.channel, &self.public_key)
    }

    /// Feed one view event into the window, recomputing the affected
    /// projection in place, and republish a change notification.
    pub fn apply(&self, event: ViewEvent) -> Result<()> {
        let changed = {
            let mut view = self.view()?;
            view.apply(event, |node, data| {
                message::make_data(&self.resolver, node, data)
            })
        };
        if changed {
            // No receivers is fine; nobody is listening yet.
            let _ = self.changed.send(());
        }
        Ok(())
    }

    /// Spawn a task pumping a view feed into this controller.
    pub fn spawn_feed(
        self: &Arc<Self>,
        mut rx: mpsc::UnboundedReceiver<ViewEvent>,
    ) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(error) = controller.apply(event) {
                    warn!(%error, "dropping view event");
                }
            }
            debug!("view feed closed");
        })
    }

    /// Snapshot of the current window's projections, in thread order.
    pub fn messages(&self) -> Result<Vec<Message>> {
        Ok(self.view()?.items().iter().map(|i| i.data.clone()).collect())
    }

    /// Snapshot of nodes and projections, for callers that need node
    /// handles to edit, react, or delete.
    pub fn items(&self) -> Result<Vec<(DataNode, Message)>> {
        Ok(self
            .view()?
            .items()
            .iter()
            .map(|i| (i.node.clone(), i.data.clone()))
            .collect())
    }

    pub fn find(&self, id1: &NodeId) -> Result<Option<(DataNode, Message)>> {
        Ok(self
            .view()?
            .find(id1)
            .map(|i| (i.node.clone(), i.data.clone())))
    }

    /// Post a message to the thread. The ref chain pointer is captured
    /// synchronously, before the write suspends; that capture is the only
    /// ordering input this controller supplies.
    pub async fn send_message(&self, text: &str) -> Result<DataNode> {
        let ref_id = self.last_ref()?;
        let params = PostParams {
            ref_id,
            data: Bytes::copy_from_slice(text.as_bytes()),
            parent_id: self.params.defaults.parent_id,
            blob_length: None,
        };

        let node = self.thread.post(KIND_MESSAGE, params).await?;
        self.license_if_needed(&node).await?;
        Ok(node)
    }

    /// Record a new version of `target`'s text. An empty string is a valid
    /// edit and hides the message.
    pub async fn edit_message(&self, target: &DataNode, text: &str) -> Result<DataNode> {
        let params = PostParams {
            ref_id: None,
            data: Bytes::copy_from_slice(text.as_bytes()),
            parent_id: self.params.defaults.parent_id,
            blob_length: None,
        };

        let node = self.thread.post_edit(KIND_MESSAGE, target, params).await?;
        self.license_if_needed(&node).await?;
        Ok(node)
    }

    /// Toggle the viewer's endorsement of `reaction` on `target`.
    pub async fn toggle_reaction(
        &self,
        message: &Message,
        target: &DataNode,
        reaction: &str,
    ) -> Result<DataNode> {
        let verb = message::reaction_verb(message, reaction, &self.public_key.to_hex());
        let params = PostParams {
            ref_id: None,
            data: Bytes::from(verb.payload(reaction)),
            parent_id: self.params.defaults.parent_id,
            blob_length: None,
        };

        let node = self.thread.post_reaction(KIND_MESSAGE, target, params).await?;
        self.license_if_needed(&node).await?;
        Ok(node)
    }

    /// Delete `target` in two phases.
    ///
    /// Phase 1 hides the message right away with an edit-to-empty, which
    /// spreads like any other annotation. Phase 2 destroys the node, but
    /// only after [`DELETE_GRACE`]: destroying immediately would race the
    /// hide annotation and remote peers would keep showing the message.
    /// Once scheduled, phase 2 is not cancellable; its failures are logged,
    /// not surfaced.
    pub async fn delete_message(&self, target: &DataNode) -> Result<()> {
        self.edit_message(target, "").await?;

        let thread = self.thread.clone();
        let targets = self.targets.clone();
        let node = target.clone();
        tokio::spawn(async move {
            tokio::time::sleep(DELETE_GRACE).await;

            let destroyed = match thread.destroy(&node).await {
                Ok(destroyed) => destroyed,
                Err(error) => {
                    warn!(%error, id1 = %node.id1(), "deferred destroy failed");
                    return;
                }
            };

            // Destruction records can themselves need a trailing license to
            // be distributable, just like posts.
            for gone in destroyed {
                if gone.is_licensed() && gone.license_min_distance() == 0 {
                    if let Err(error) = thread
                        .post_license(LICENSE_KIND_DEFAULT, &gone, &targets)
                        .await
                    {
                        warn!(%error, id1 = %gone.id1(), "post-destroy license failed");
                    }
                }
            }
        });

        Ok(())
    }

    /// Widen the window backwards by one history page.
    pub async fn load_history(&self) -> Result<()> {
        let tail = self.view()?.extend_tail(HISTORY_PAGE);
        let parent = *self.channel.id1();
        self.thread.update_stream(&parent, tail).await?;
        Ok(())
    }

    async fn license_if_needed(&self, node: &DataNode) -> Result<()> {
        if node.is_licensed() {
            self.thread
                .post_license(LICENSE_KIND_DEFAULT, node, &self.targets)
                .await?;
        }
        Ok(())
    }

    fn last_ref(&self) -> Result<Option<Bytes>> {
        Ok(self
            .view()?
            .last_item()
            .map(|item| Bytes::copy_from_slice(item.node.id1().as_bytes())))
    }

    fn view(&self) -> Result<MutexGuard<'_, ThreadView<Message>>> {
        self.view.lock().map_err(|_| ThreadError::LockPoisoned)
    }
}
