//! Interactive chat session: command dispatch and thread rendering.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use causerie_node::{BincodeResolver, MemoryHub, MemoryThread, ThreadParams};
use causerie_shared::{Identity, PublicKey};
use causerie_thread::{channel_name, is_private_channel, Message, MessageController};

type Controller = MessageController<MemoryThread, BincodeResolver>;

struct ActiveChannel {
    controller: Arc<Controller>,
    feed: JoinHandle<()>,
    redraw: JoinHandle<()>,
}

impl Drop for ActiveChannel {
    fn drop(&mut self) {
        self.feed.abort();
        self.redraw.abort();
    }
}

pub struct ChatApp {
    hub: MemoryHub,
    identity: Identity,
    active: Option<ActiveChannel>,
}

impl ChatApp {
    pub fn new(hub: MemoryHub, identity: Identity) -> Self {
        Self {
            hub,
            identity,
            active: None,
        }
    }

    /// Handle one line of input. Lines starting with `/` are commands,
    /// everything else posts to the active channel.
    pub async fn handle_line(&mut self, line: &str) -> anyhow::Result<()> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        if let Some(command) = line.strip_prefix('/') {
            return self.handle_command(command).await;
        }
        self.send_chat(line).await
    }

    async fn handle_command(&mut self, command: &str) -> anyhow::Result<()> {
        let (verb, rest) = match command.split_once(' ') {
            Some((v, r)) => (v, r.trim()),
            None => (command, ""),
        };

        match verb {
            "help" => self.show_help(),
            "presence" => self.show_presence()?,
            "channels" => self.show_channels()?,
            "new" => {
                if rest.is_empty() {
                    eprintln!("Usage: /new <channel name>");
                    return Ok(());
                }
                let node = self
                    .hub
                    .create_channel(&self.identity, rest.as_bytes(), None)?;
                info!(id1 = %node.id1(), name = rest, "channel created");
            }
            "q" => self.open_private(rest)?,
            "open" => self.open_channel(rest).await?,
            "history" => {
                if let Some(active) = &self.active {
                    active.controller.load_history().await?;
                } else {
                    eprintln!("No channel opened");
                }
            }
            other => eprintln!("Unknown command: /{other}"),
        }
        Ok(())
    }

    async fn send_chat(&self, text: &str) -> anyhow::Result<()> {
        let Some(active) = &self.active else {
            eprintln!("No channel opened");
            return Ok(());
        };
        active.controller.send_message(text).await?;
        Ok(())
    }

    fn show_help(&self) {
        println!(
            "The following commands are available:\n\
             /help (shows this help)\n\
             /presence (list all public keys seen)\n\
             /channels (list all channels available)\n\
             /new <name> (create a public channel)\n\
             /q <presence index> (create a private channel to that public key)\n\
             /open <channel index> (open and activate a channel for messaging)\n\
             /history (load older messages into the active channel)"
        );
    }

    fn show_presence(&self) -> anyhow::Result<()> {
        let me = self.identity.public_key();
        for (index, entry) in self.hub.presence()?.iter().enumerate() {
            let state = if entry.active { "active" } else { "inactive" };
            let you = if entry.public_key == me {
                " (this is you)"
            } else {
                ""
            };
            println!("{index} {} ({state}){you}", entry.public_key);
        }
        Ok(())
    }

    fn show_channels(&self) -> anyhow::Result<()> {
        println!("Channels:");
        let me = self.identity.public_key();
        let open_id = self
            .active
            .as_ref()
            .map(|a| *a.controller.channel().id1());
        for (index, channel) in self.hub.channels()?.iter().enumerate() {
            let name = channel_name(channel, &me);
            let is_open = open_id.as_ref() == Some(channel.id1());
            let is_private = is_private_channel(channel);
            println!("{index} {name}, isOpen: {is_open}, isPrivate: {is_private}");
        }
        Ok(())
    }

    fn open_private(&mut self, index: &str) -> anyhow::Result<()> {
        let index: usize = index.parse()?;
        let entries = self.hub.presence()?;
        let Some(peer) = entries.get(index).map(|e| e.public_key) else {
            eprintln!("No such presence index: {index}");
            return Ok(());
        };

        info!(peer = %peer, "creating private channel");
        let node = self.hub.create_channel(&self.identity, b"", Some(peer))?;
        println!("Channel created: {}", node.id1());
        Ok(())
    }

    async fn open_channel(&mut self, index: &str) -> anyhow::Result<()> {
        let index: usize = index.parse()?;
        let channels = self.hub.channels()?;
        let Some(channel) = channels.get(index).cloned() else {
            eprintln!("No such channel index: {index}");
            return Ok(());
        };

        // Dropping the previous active channel aborts its pump tasks.
        self.active = None;

        let params = ThreadParams::default();
        let thread = self.hub.thread(self.identity.clone());
        let rx = thread.open_view(channel.id1(), params.tail)?;
        let controller = Arc::new(MessageController::new(
            thread,
            BincodeResolver,
            params,
            self.identity.public_key(),
            channel,
        ));

        info!(name = %controller.get_name(), "channel opened");

        let feed = controller.spawn_feed(rx);
        let redraw = spawn_redraw(Arc::clone(&controller), self.identity.public_key());

        self.active = Some(ActiveChannel {
            controller,
            feed,
            redraw,
        });
        Ok(())
    }
}

fn spawn_redraw(controller: Arc<Controller>, me: PublicKey) -> JoinHandle<()> {
    let mut changed = controller.subscribe();
    tokio::spawn(async move {
        loop {
            match changed.recv().await {
                Ok(()) => match controller.messages() {
                    Ok(messages) => redraw(&controller.get_name(), &messages, &me),
                    Err(error) => warn!(%error, "redraw failed"),
                },
                // Missed notifications coalesce; just render the newest state.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn redraw(name: &str, messages: &[Message], me: &PublicKey) {
    println!("--- {name} ---");
    for message in messages {
        println!("{}", render_line(message, me));
    }
}

fn render_line(message: &Message, me: &PublicKey) -> String {
    let time = message.creation_timestamp.format("%H:%M:%S");
    let who = if message.public_key == me.to_hex() {
        "you".to_string()
    } else {
        message.public_key.chars().take(8).collect()
    };

    let (text, marker) = match message.edited_text.as_deref() {
        Some("") => ("<deleted>", ""),
        Some(edited) => (edited, " (edited)"),
        None => (message.text.as_str(), ""),
    };

    let mut line = format!("{time} {who}: {text}{marker}");

    if let Some(reactions) = &message.reactions {
        for (reaction, entry) in reactions {
            line.push_str(&format!(" [{}:{}]", reaction, entry.public_keys.len()));
        }
    }
    line
}
