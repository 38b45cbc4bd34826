//! Client-side copy of the display list, kept in step with the backend.
//!
//! The [DisplaySynchronizer] task is the only owner of the [DisplayState].
//! Brightness changes are applied to it optimistically, before the backend
//! is asked to apply them, and a failed backend call is only logged. The
//! displayed value can therefore diverge from what the hardware has, but the
//! controls stay responsive even when the backend is completely broken.

use crate::{
    armaf::{ActorPort, ActorReceiver, ActorRequestError, Request},
    control::display_list::{DisplayList, DisplayState},
    external::backend::{DisplayBackend, DisplayDescriptor},
};
use anyhow::Result;
use std::{collections::HashMap, time::Duration};
use thiserror::Error;
use tokio::{
    select,
    sync::watch,
    task::{JoinError, JoinSet},
    time,
};

/// How long tear-down waits for brightness calls still in flight before
/// abandoning them.
const TEARDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Commands accepted by the synchronizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncCommand {
    /// The user moved the brightness control of a display
    ChangeBrightness { id: String, value: u16 },
    /// Fetch the display list from the backend again
    Reload,
}

/// How the synchronizer handled a [SyncCommand]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The local state was updated and the backend call issued
    Applied,
    /// No display with the id is known, nothing happened
    UnknownIdIgnored,
    /// A new listing was requested from the backend
    ReloadStarted,
    /// A listing was already in flight, its result will be used
    ReloadPending,
}

/// Backend failures. They are reported and otherwise ignored.
#[derive(Debug, Error)]
pub enum SyncFailure {
    #[error("couldn't list displays: {0:#}")]
    LoadFailure(anyhow::Error),

    #[error("couldn't set brightness of {id} to {value}: {cause:#}")]
    BrightnessSetFailure {
        id: String,
        value: u16,
        cause: anyhow::Error,
    },
}

type CommandReceiver = ActorReceiver<SyncCommand, SyncOutcome, ()>;

/// The rendering surface's handle on a running [DisplaySynchronizer].
///
/// Dropping every clone of the port ends the synchronizer's session.
#[derive(Debug, Clone)]
pub struct SynchronizerPort(ActorPort<SyncCommand, SyncOutcome, ()>);

impl SynchronizerPort {
    /// Input callback for the brightness control of a display.
    ///
    /// Returns once the local state has been updated and the backend call
    /// issued, without waiting for the backend.
    pub async fn change_brightness(
        &self,
        id: &str,
        value: u16,
    ) -> Result<SyncOutcome, ActorRequestError<()>> {
        self.0
            .request(SyncCommand::ChangeBrightness {
                id: id.to_owned(),
                value,
            })
            .await
    }

    pub async fn reload(&self) -> Result<SyncOutcome, ActorRequestError<()>> {
        self.0.request(SyncCommand::Reload).await
    }

    /// Drop this port and wait until the synchronizer has finished, including
    /// the backend calls it still had in flight.
    pub async fn await_shutdown(self) {
        self.0.await_shutdown().await
    }
}

pub struct DisplaySynchronizer<B: DisplayBackend> {
    backend: B,
    state: watch::Sender<DisplayState>,
    loads: JoinSet<Result<Vec<DisplayDescriptor>>>,
    brightness_requests: JoinSet<Result<(String, u16), SyncFailure>>,
    /// Values issued while a listing is in flight. The listing may predate
    /// them, so they are laid over its result.
    changes_during_load: HashMap<String, u16>,
}

impl<B: DisplayBackend> DisplaySynchronizer<B> {
    pub fn new(backend: B) -> DisplaySynchronizer<B> {
        let (state, _) = watch::channel(DisplayState::Loading);
        DisplaySynchronizer {
            backend,
            state,
            loads: JoinSet::new(),
            brightness_requests: JoinSet::new(),
            changes_during_load: HashMap::new(),
        }
    }

    /// Start the synchronizer task, which immediately starts loading the
    /// display list.
    ///
    /// Returns the port for sending input events and a receiver through which
    /// the current [DisplayState] can be read.
    pub fn spawn(mut self) -> (SynchronizerPort, watch::Receiver<DisplayState>) {
        let (port, mut command_receiver) = ActorPort::make();
        let state_receiver = self.state.subscribe();
        tokio::spawn(async move {
            self.start_load();
            self.main_loop(&mut command_receiver).await;
            self.tear_down().await;
            // Must go last, its drop is what completes await_shutdown
            drop(command_receiver);
        });
        (SynchronizerPort(port), state_receiver)
    }

    async fn main_loop(&mut self, commands: &mut CommandReceiver) {
        loop {
            select! {
                request = commands.recv() => {
                    match request {
                        Some(request) => self.handle_request(request),
                        None => {
                            log::debug!("All synchronizer ports dropped, stopping");
                            return;
                        }
                    }
                }
                Some(result) = self.loads.join_next() => {
                    self.finish_load(result);
                }
                Some(result) = self.brightness_requests.join_next() => {
                    Self::finish_brightness_request(result);
                }
            }
        }
    }

    fn handle_request(&mut self, request: Request<SyncCommand, SyncOutcome, ()>) {
        let outcome = match &request.payload {
            SyncCommand::ChangeBrightness { id, value } => {
                self.change_brightness(id.clone(), *value)
            }
            SyncCommand::Reload => self.start_load(),
        };
        if request.respond(Ok(outcome)).is_err() {
            log::debug!("Requester went away before receiving {:?}", outcome);
        }
    }

    fn start_load(&mut self) -> SyncOutcome {
        if !self.loads.is_empty() {
            log::debug!("Display listing already in flight");
            return SyncOutcome::ReloadPending;
        }
        log::debug!("Requesting display list");
        self.changes_during_load.clear();
        let backend = self.backend.clone();
        self.loads.spawn(async move { backend.list_displays().await });
        SyncOutcome::ReloadStarted
    }

    fn finish_load(&mut self, result: Result<Result<Vec<DisplayDescriptor>>, JoinError>) {
        match result {
            Ok(Ok(displays)) => {
                let mut list = DisplayList::from(displays);
                log::info!("Loaded {} displays", list.len());
                for (id, value) in self.changes_during_load.drain() {
                    if list.set_brightness(&id, value) {
                        log::debug!(
                            "Keeping brightness {} of {}, issued during listing",
                            value,
                            id
                        );
                    }
                }
                self.state.send_replace(DisplayState::Loaded(list));
            }
            Ok(Err(e)) => log::error!("{}", SyncFailure::LoadFailure(e)),
            Err(e) => log::error!("Display listing task failed: {}", e),
        }
        self.changes_during_load.clear();
    }

    fn change_brightness(&mut self, id: String, value: u16) -> SyncOutcome {
        let previous = self
            .state
            .borrow()
            .displays()
            .and_then(|list| list.get(&id))
            .map(|d| d.brightness);
        // Local state first, the backend call is only issued afterwards
        let applied = self
            .state
            .send_if_modified(|state| state.set_brightness(&id, value));
        if !applied {
            if self.state.borrow().is_loading() {
                log::debug!("Ignoring brightness change of {}, displays not loaded yet", id);
            } else {
                log::debug!("Ignoring brightness change of unknown display {}", id);
            }
            return SyncOutcome::UnknownIdIgnored;
        }
        log::debug!("Brightness of {}: {:?} -> {}", id, previous, value);
        if !self.loads.is_empty() {
            self.changes_during_load.insert(id.clone(), value);
        }

        let backend = self.backend.clone();
        self.brightness_requests.spawn(async move {
            let result = backend.set_brightness(&id, value).await;
            match result {
                Ok(()) => Ok((id, value)),
                Err(cause) => Err(SyncFailure::BrightnessSetFailure { id, value, cause }),
            }
        });
        SyncOutcome::Applied
    }

    fn finish_brightness_request(result: Result<Result<(String, u16), SyncFailure>, JoinError>) {
        match result {
            Ok(Ok((id, value))) => log::debug!("Backend applied brightness {} to {}", value, id),
            Ok(Err(failure)) => log::error!("{}", failure),
            Err(e) => log::error!("Brightness request task failed: {}", e),
        }
    }

    async fn tear_down(mut self) {
        log::debug!(
            "Tearing down, waiting for {} brightness requests",
            self.brightness_requests.len()
        );
        // Nobody could observe a listing anymore
        self.loads.shutdown().await;
        let requests = &mut self.brightness_requests;
        let drained = time::timeout(TEARDOWN_GRACE_PERIOD, async {
            while let Some(result) = requests.join_next().await {
                Self::finish_brightness_request(result);
            }
        })
        .await;
        if drained.is_err() {
            log::warn!(
                "Abandoning {} brightness requests the backend didn't finish",
                self.brightness_requests.len()
            );
            self.brightness_requests.shutdown().await;
        }
        log::debug!("Stopped");
    }
}
