//! Events driving the command-line consumer.

use color_eyre::eyre::{OptionExt, Result};
use log::*;
use tokio::sync::{
    broadcast,
    mpsc::{self, UnboundedReceiver, UnboundedSender},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The monitor finished the given tick.
    Updated(u64),
    App(AppEvent),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    Reload,
    Quit,
}

#[derive(Debug)]
pub struct EventHandler {
    sender: UnboundedSender<Event>,
    receiver: UnboundedReceiver<Event>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self { sender, receiver }
    }

    pub fn clone_sender(&self) -> UnboundedSender<Event> {
        self.sender.clone()
    }

    pub fn send(&self, event: AppEvent) {
        // The receiver lives as long as self.
        let _ = self.sender.send(Event::App(event));
    }

    pub async fn next(&mut self) -> Result<Event> {
        self.receiver.recv().await.ok_or_eyre("Event channel closed")
    }

    /// Turn monitor update notifications into [`Event::Updated`].
    pub fn forward_updates(&self, mut updates: broadcast::Receiver<u64>) {
        let sender = self.clone_sender();
        tokio::spawn(async move {
            loop {
                match updates.recv().await {
                    Ok(tick) => {
                        if sender.send(Event::Updated(tick)).is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(target: "App", "Missed {} monitor updates", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });
    }

    /// Send [`AppEvent::Quit`] on Ctrl-C.
    pub fn quit_on_ctrl_c(&self) {
        let sender = self.clone_sender();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    let _ = sender.send(Event::App(AppEvent::Quit));
                }
                Err(e) => error!(target: "App", "Can't listen for Ctrl-C: {}", e),
            }
        });
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}
