//! Main loop.
//!
//! [`App`] drives the terminal: it turns [`Event`]s into [`AppMessage`]s,
//! applies them to [`AppState`] one at a time, and spawns the commands the
//! state asks for. Commands report back over the same message channel.

mod message;
mod state;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use color_eyre::Result;
use futures::FutureExt;
use ratatui::layout::Rect;
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info};

use crate::Theme;
use crate::azure::ResourceClient;
use crate::commands::Command;
use crate::config::{AppConfig, KeyResolver};
use crate::model::Scope;
use crate::tui::{Event, Tui};

pub use message::AppMessage;
pub use state::AppState;

pub struct App {
    state: AppState,
    frame_rate: f64,
    tick_rate: f64,
    message_tx: UnboundedSender<AppMessage>,
    message_rx: UnboundedReceiver<AppMessage>,
}

impl App {
    pub fn new(
        config: &AppConfig,
        client: Arc<dyn ResourceClient>,
        resolver: Arc<KeyResolver>,
        theme: Theme,
        start: &Scope,
    ) -> Self {
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        Self {
            state: AppState::new(config, client, resolver, theme, start),
            frame_rate: config.ui.frame_rate,
            tick_rate: config.ui.tick_rate,
            message_tx,
            message_rx,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut tui = Tui::new(self.frame_rate, self.tick_rate)?;
        tui.enter()?;

        let size = tui.size()?;
        self.state.resize(size.width, size.height);
        let commands = self.state.start(Instant::now());
        self.spawn_all(commands);

        loop {
            self.handle_events(&mut tui).await?;
            self.handle_messages(&mut tui)?;
            if self.state.should_suspend() {
                info!("Suspending");
                tui.suspend()?;
                self.message_tx.send(AppMessage::Resume)?;
                self.message_tx.send(AppMessage::ClearScreen)?;
                tui.resume()?;
            } else if self.state.should_quit() {
                break;
            }
        }

        tui.exit()?;
        info!("Exited");
        Ok(())
    }

    async fn handle_events(&mut self, tui: &mut Tui) -> Result<()> {
        let Some(event) = tui.next_event().await else {
            return Ok(());
        };

        match event {
            Event::Quit => self.message_tx.send(AppMessage::Quit)?,
            Event::Suspend => self.message_tx.send(AppMessage::Suspend)?,
            Event::Tick => self.message_tx.send(AppMessage::Tick)?,
            Event::Render => self.message_tx.send(AppMessage::Render)?,
            Event::Resize(width, height) => {
                self.message_tx.send(AppMessage::Resize(width, height))?;
            }
            Event::Key(key) => {
                let commands = self.state.handle_key(key, Instant::now());
                self.spawn_all(commands);
            }
            Event::Error(message) => error!(%message, "Terminal event error"),
            Event::Init => {}
        }
        Ok(())
    }

    fn handle_messages(&mut self, tui: &mut Tui) -> Result<()> {
        while let Ok(message) = self.message_rx.try_recv() {
            if !message.is_periodic() {
                debug!("Handling message: {}", message.summary());
            }

            match message {
                AppMessage::Render => self.render(tui)?,
                AppMessage::ClearScreen => tui.clear()?,
                AppMessage::Resize(width, height) => {
                    tui.resize(Rect::new(0, 0, width, height))?;
                    self.state.resize(width, height);
                    self.render(tui)?;
                }
                message => {
                    let commands = self.state.update(message, Instant::now());
                    self.spawn_all(commands);
                }
            }
        }
        Ok(())
    }

    fn render(&mut self, tui: &mut Tui) -> Result<()> {
        let now = Instant::now();
        tui.draw(|frame| self.state.render(frame, now))?;
        Ok(())
    }

    fn spawn_all(&mut self, commands: Vec<Box<dyn Command>>) {
        for command in commands {
            self.spawn(command);
        }
    }

    /// Run a command on its own task. Errors and panics become an error
    /// dialog; completion is always reported for the commands panel.
    fn spawn(&mut self, command: Box<dyn Command>) {
        let name = command.name();
        let id = self.state.track_command(name.clone(), Instant::now());
        let tx = self.message_tx.clone();

        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(command.execute(tx.clone()))
                .catch_unwind()
                .await;
            let success = match outcome {
                Ok(Ok(())) => true,
                Ok(Err(error)) => {
                    error!(command = %name, error = %error, "Command failed");
                    let _ = tx.send(AppMessage::DisplayError(format!("{name} failed: {error}")));
                    false
                }
                Err(_) => {
                    error!(command = %name, "Command panicked");
                    let _ = tx.send(AppMessage::DisplayError(format!(
                        "{name} stopped unexpectedly"
                    )));
                    false
                }
            };
            let _ = tx.send(AppMessage::CommandCompleted { id, success });
        });
    }
}
