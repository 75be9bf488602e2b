//! Worker lifecycle state machine.

use color_eyre::{eyre::eyre, Result};

/// Lifecycle state of one worker instance (one deployed version).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  /// Constructed, no lifecycle event handled yet
  Parsed,
  /// Shell resources are being fetched into the temp store
  Installing,
  /// Shell is in the temp store, waiting to activate
  Installed,
  /// Reconciling the temp store into the content store
  Activating,
  /// Serving fetches from the content store
  Active,
  /// Install or activation failed
  Failed,
}

impl WorkerState {
  /// Whether a worker in this state intercepts page fetches.
  ///
  /// Fetches may arrive while activation is still in flight.
  pub fn controls_clients(self) -> bool {
    matches!(self, WorkerState::Activating | WorkerState::Active)
  }
}

impl std::fmt::Display for WorkerState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let label = match self {
      Self::Parsed => "parsed",
      Self::Installing => "installing",
      Self::Installed => "installed",
      Self::Activating => "activating",
      Self::Active => "active",
      Self::Failed => "failed",
    };
    f.write_str(label)
  }
}

/// Mutable lifecycle bookkeeping guarded by the synchronizer.
#[derive(Debug)]
pub struct Lifecycle {
  state: WorkerState,
  /// Activate as soon as installed, without waiting for older instances
  skip_waiting: bool,
  /// Whether this instance has taken control of open pages
  clients_claimed: bool,
}

impl Default for Lifecycle {
  fn default() -> Self {
    Self {
      state: WorkerState::Parsed,
      skip_waiting: false,
      clients_claimed: false,
    }
  }
}

impl Lifecycle {
  pub fn state(&self) -> WorkerState {
    self.state
  }

  pub fn skip_waiting(&self) -> bool {
    self.skip_waiting
  }

  pub fn clients_claimed(&self) -> bool {
    self.clients_claimed
  }

  pub fn request_skip_waiting(&mut self) {
    self.skip_waiting = true;
  }

  pub fn claim_clients(&mut self) {
    self.clients_claimed = true;
  }

  /// Installed and allowed to activate without waiting.
  pub fn ready_to_activate(&self) -> bool {
    self.state == WorkerState::Installed && self.skip_waiting
  }

  pub fn begin_install(&mut self) -> Result<()> {
    match self.state {
      WorkerState::Parsed | WorkerState::Failed => {
        self.state = WorkerState::Installing;
        Ok(())
      }
      other => Err(eyre!("Cannot install a worker that is {}", other)),
    }
  }

  pub fn finish_install(&mut self, succeeded: bool) {
    self.state = if succeeded {
      WorkerState::Installed
    } else {
      WorkerState::Failed
    };
  }

  pub fn begin_activate(&mut self) -> Result<()> {
    match self.state {
      WorkerState::Installed => {
        self.state = WorkerState::Activating;
        Ok(())
      }
      other => Err(eyre!("Cannot activate a worker that is {}", other)),
    }
  }

  pub fn finish_activate(&mut self, succeeded: bool) {
    if succeeded {
      self.state = WorkerState::Active;
    } else {
      self.state = WorkerState::Failed;
      self.clients_claimed = false;
    }
  }

  /// Adopt a state recovered from persistent stores on startup.
  pub fn restore(&mut self, state: WorkerState) -> Result<()> {
    if self.state != WorkerState::Parsed {
      return Err(eyre!("Cannot restore a worker that is {}", self.state));
    }
    self.state = state;
    if state == WorkerState::Active {
      self.clients_claimed = true;
    }
    Ok(())
  }
}
