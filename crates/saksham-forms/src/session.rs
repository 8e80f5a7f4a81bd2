//! Submission state for one open form.
//!
//! A session validates locally, guards against double submits, runs the
//! form's flow and settles with either a result card or one failure
//! notification.

use crate::{validate, AdvisoryForm, FieldErrors, Notification, Notifier, RawForm, ResultCard, ValidatedForm};
use saksham_common::SakshamError;
use saksham_flows::{Flow, FlowError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(thiserror::Error, Debug)]
pub enum SubmitError {
    #[error("failed to read upload: {0}")]
    FileRead(#[from] SakshamError),

    #[error("no file selected for '{0}'")]
    MissingFile(&'static str),

    #[error(transparent)]
    Flow(#[from] FlowError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Succeeded(ResultCard),
    Failed(Notification),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Phase {
    #[default]
    Idle,
    InFlight,
    Settled(Outcome),
}

/// What one call to [`FormSession::submit`] produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Another submission is still in flight; nothing was done.
    Busy,
    /// Local validation failed; the flow was not invoked.
    Invalid(FieldErrors),
    Completed(ResultCard),
    Failed(Notification),
}

fn lock(phase: &Mutex<Phase>) -> MutexGuard<'_, Phase> {
    phase.lock().unwrap_or_else(|e| e.into_inner())
}

/// Puts the session back to `Idle` if the submitting future is dropped
/// before it settles.
struct InFlight<'a> {
    phase: &'a Mutex<Phase>,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(mut self, outcome: Outcome) {
        *lock(self.phase) = Phase::Settled(outcome);
        self.settled = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let mut phase = lock(self.phase);
            if *phase == Phase::InFlight {
                debug!("Submission dropped in flight, back to idle");
                *phase = Phase::Idle;
            }
        }
    }
}

pub struct FormSession<F: AdvisoryForm> {
    form: F,
    flow: Arc<F::Flow>,
    notifier: Arc<dyn Notifier>,
    phase: Mutex<Phase>,
}

impl<F: AdvisoryForm> FormSession<F> {
    pub fn new(form: F, flow: Arc<F::Flow>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            form,
            flow,
            notifier,
            phase: Mutex::new(Phase::Idle),
        }
    }

    pub fn form(&self) -> &F {
        &self.form
    }

    pub fn phase(&self) -> Phase {
        lock(&self.phase).clone()
    }

    pub fn is_submitting(&self) -> bool {
        *lock(&self.phase) == Phase::InFlight
    }

    pub async fn submit(&self, raw: RawForm) -> Submission {
        let validated = {
            let mut phase = lock(&self.phase);
            if *phase == Phase::InFlight {
                debug!("Ignoring submit on '{}' while one is in flight", self.form.id());
                return Submission::Busy;
            }
            match validate(&self.form.fields(), &raw) {
                Ok(validated) => {
                    *phase = Phase::InFlight;
                    validated
                }
                Err(errors) => return Submission::Invalid(errors),
            }
        };
        let guard = InFlight {
            phase: &self.phase,
            settled: false,
        };

        let start = Instant::now();
        match self.run(validated).await {
            Ok(card) => {
                info!("✅ '{}' answered in {:?}", self.form.id(), start.elapsed());
                guard.settle(Outcome::Succeeded(card.clone()));
                Submission::Completed(card)
            }
            Err(e) => {
                warn!("❌ '{}' submission failed: {}", self.form.id(), e);
                let notification = self.form.failure();
                self.notifier.notify(notification.clone());
                guard.settle(Outcome::Failed(notification.clone()));
                Submission::Failed(notification)
            }
        }
    }

    async fn run(&self, form: ValidatedForm) -> Result<ResultCard, SubmitError> {
        let request = self.form.build_request(form).await?;
        let output = self.flow.run(request).await?;
        Ok(self.form.card(&output))
    }
}
