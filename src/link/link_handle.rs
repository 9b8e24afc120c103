//! Link Handle - async API for the control link
//!
//! Runs a [`ControlLink`] on its own tokio task. The task is the only owner of
//! the socket, the scheduler and every timer; callers talk to it through a
//! command channel and observe it through a `watch` channel.
//!
//! ```text
//! LinkHandle ─[LinkCommand]──────► ┌───────────┐ ──[Frame]──► Transport
//!            ◄─[LinkStatus watch]─ │ link task │ ◄─[TransportEvent]─┘
//!                                  └───────────┘
//!                                   timers: sleep_until(next_deadline)
//! ```

use super::clock::SystemClock;
use super::control_link::ControlLink;
use super::state::{LinkStats, LinkStatus};
use super::transport::{Transport, TransportEvent};
use super::ws_transport::WsTransport;
use crate::codec::FrameEncoder;
use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::scheduler::SubmitOptions;
use crate::shaping::{AxisConfig, StickConfig};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Requests processed by the link task
#[derive(Debug)]
pub enum LinkCommand {
    Connect {
        url: String,
        reply: oneshot::Sender<Result<(), LinkError>>,
    },
    Disconnect,
    SubmitControl {
        control_id: u16,
        raw: f32,
        config: AxisConfig,
        options: SubmitOptions,
    },
    SubmitStick {
        x_id: u16,
        y_id: u16,
        x: f32,
        y: f32,
        config: StickConfig,
    },
    SubmitValue {
        control_id: u16,
        value: f32,
        options: SubmitOptions,
    },
    Stats {
        reply: oneshot::Sender<LinkStats>,
    },
}

/// Handle to a running control link task
///
/// Submissions are non-blocking (`try_send`): when the command buffer is full
/// the update is refused rather than delaying the UI thread. Dropping the handle
/// stops the task.
pub struct LinkHandle {
    commands: mpsc::Sender<LinkCommand>,
    status: watch::Receiver<LinkStatus>,
    shutdown: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl LinkHandle {
    /// Spawns the link task with a websocket transport
    ///
    /// # Errors
    ///
    /// * [`LinkError::Config`] - `config` failed validation
    pub fn spawn(config: LinkConfig, encoder: FrameEncoder) -> Result<Self, LinkError> {
        Self::spawn_with(config, encoder, WsTransport::new)
    }

    /// Spawns the link task with a transport built by `make_transport`
    ///
    /// The closure receives the sender the transport must report its events on.
    pub fn spawn_with<T, F>(
        config: LinkConfig,
        encoder: FrameEncoder,
        make_transport: F,
    ) -> Result<Self, LinkError>
    where
        T: Transport + 'static,
        F: FnOnce(mpsc::UnboundedSender<TransportEvent>) -> T,
    {
        config.validate()?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let transport = make_transport(event_tx);
        let link = ControlLink::new(transport, &config, encoder);

        let (command_tx, command_rx) = mpsc::channel(config.command_buffer);
        let (status_tx, status_rx) = watch::channel(link.status());
        let shutdown = CancellationToken::new();

        let task = LinkTask {
            link,
            commands: command_rx,
            events: event_rx,
            status: status_tx,
            shutdown: shutdown.clone(),
        };
        let task_handle = tokio::spawn(task.run());

        debug!(
            "Control link spawned (protocol {:?}, throttle {}ms, queue {})",
            config.protocol, config.throttle_interval_ms, config.queue_capacity
        );

        Ok(Self {
            commands: command_tx,
            status: status_rx,
            shutdown,
            task_handle: Some(task_handle),
        })
    }

    pub async fn connect(&self, url: &str) -> Result<(), LinkError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(LinkCommand::Connect {
                url: url.to_string(),
                reply,
            })
            .await
            .map_err(|e| LinkError::ChannelError(format!("Failed to send connect: {}", e)))?;
        response
            .await
            .map_err(|e| LinkError::ChannelError(format!("Link task dropped connect: {}", e)))?
    }

    pub async fn disconnect(&self) -> Result<(), LinkError> {
        self.commands
            .send(LinkCommand::Disconnect)
            .await
            .map_err(|e| LinkError::ChannelError(format!("Failed to send disconnect: {}", e)))
    }

    /// Shapes and submits a raw control value, throttled
    pub fn submit_control(
        &self,
        control_id: u16,
        raw: f32,
        config: &AxisConfig,
    ) -> Result<(), LinkError> {
        self.submit_control_with(control_id, raw, config, SubmitOptions::default())
    }

    pub fn submit_control_with(
        &self,
        control_id: u16,
        raw: f32,
        config: &AxisConfig,
        options: SubmitOptions,
    ) -> Result<(), LinkError> {
        self.try_command(LinkCommand::SubmitControl {
            control_id,
            raw,
            config: config.clone(),
            options,
        })
    }

    pub fn submit_stick(
        &self,
        x_id: u16,
        y_id: u16,
        x: f32,
        y: f32,
        config: &StickConfig,
    ) -> Result<(), LinkError> {
        self.try_command(LinkCommand::SubmitStick {
            x_id,
            y_id,
            x,
            y,
            config: config.clone(),
        })
    }

    pub fn submit_value(
        &self,
        control_id: u16,
        value: f32,
        options: SubmitOptions,
    ) -> Result<(), LinkError> {
        self.try_command(LinkCommand::SubmitValue {
            control_id,
            value,
            options,
        })
    }

    /// Current `{state, connected, latency_ms, reconnect_attempt}`
    pub fn status(&self) -> LinkStatus {
        self.status.borrow().clone()
    }

    /// Receiver that is notified on every status change
    pub fn subscribe(&self) -> watch::Receiver<LinkStatus> {
        self.status.clone()
    }

    pub async fn stats(&self) -> Result<LinkStats, LinkError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(LinkCommand::Stats { reply })
            .await
            .map_err(|e| LinkError::ChannelError(format!("Failed to request stats: {}", e)))?;
        response
            .await
            .map_err(|e| LinkError::ChannelError(format!("Link task dropped stats: {}", e)))
    }

    /// Stops the task, closing the socket normally, and waits for it
    pub async fn shutdown(&mut self) -> Result<(), LinkError> {
        debug!("Sending shutdown signal to control link");
        self.shutdown.cancel();

        if let Some(handle) = self.task_handle.take() {
            match handle.await {
                Ok(()) => {
                    debug!("Control link task completed");
                    Ok(())
                }
                Err(e) => {
                    error!("Control link task panicked: {}", e);
                    Err(LinkError::ThreadError(format!(
                        "Control link task panicked: {}",
                        e
                    )))
                }
            }
        } else {
            debug!("Control link already shut down");
            Ok(())
        }
    }

    fn try_command(&self, command: LinkCommand) -> Result<(), LinkError> {
        self.commands.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => {
                warn!("Link command buffer full, dropping submission");
                LinkError::ChannelError("Command buffer full".to_string())
            }
            TrySendError::Closed(_) => LinkError::ChannelError("Link task stopped".to_string()),
        })
    }
}

impl Drop for LinkHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct LinkTask<T: Transport> {
    link: ControlLink<T, SystemClock>,
    commands: mpsc::Receiver<LinkCommand>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    status: watch::Sender<LinkStatus>,
    shutdown: CancellationToken,
}

impl<T: Transport> LinkTask<T> {
    async fn run(mut self) {
        info!("Starting control link loop");

        loop {
            let deadline = self
                .link
                .next_deadline()
                .map(|offset| self.link.clock().instant_at(offset));

            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    info!("Shutdown signal received for control link");
                    break;
                }

                Some(event) = self.events.recv() => {
                    self.link.handle_transport_event(event);
                }

                command = self.commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command),
                        None => {
                            info!("All link handles dropped, stopping");
                            break;
                        }
                    }
                }

                _ = sleep_until(deadline) => {
                    self.link.poll();
                }
            }

            self.publish_status();
        }

        self.link.disconnect();
        self.publish_status();
        info!("Control link loop stopped");
    }

    fn handle_command(&mut self, command: LinkCommand) {
        match command {
            LinkCommand::Connect { url, reply } => {
                let result = self.link.connect(&url);
                if reply.send(result).is_err() {
                    debug!("Connect caller went away");
                }
            }
            LinkCommand::Disconnect => self.link.disconnect(),
            LinkCommand::SubmitControl {
                control_id,
                raw,
                config,
                options,
            } => {
                if let Err(e) = self
                    .link
                    .submit_control_with(control_id, raw, &config, options)
                {
                    warn!("Submission for control {} failed: {}", control_id, e);
                }
            }
            LinkCommand::SubmitStick {
                x_id,
                y_id,
                x,
                y,
                config,
            } => {
                if let Err(e) = self.link.submit_stick(x_id, y_id, x, y, &config) {
                    warn!("Stick submission failed: {}", e);
                }
            }
            LinkCommand::SubmitValue {
                control_id,
                value,
                options,
            } => {
                if let Err(e) = self.link.submit_value(control_id, value, options) {
                    warn!("Submission for control {} failed: {}", control_id, e);
                }
            }
            LinkCommand::Stats { reply } => {
                if reply.send(self.link.stats()).is_err() {
                    debug!("Stats caller went away");
                }
            }
        }
    }

    fn publish_status(&self) {
        let status = self.link.status();
        self.status.send_if_modified(|current| {
            if *current != status {
                debug!(
                    "Link status: {} (latency {:?})",
                    status.state, status.latency_ms
                );
                *current = status;
                true
            } else {
                false
            }
        });
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
