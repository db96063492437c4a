//! Trigger Bus - Post-Generation Notifications

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::DocgenConfig;
use crate::host::{Proposal, User};

pub const PROPAL_BUILDDOC: &str = "PROPAL_BUILDDOC";

/// Listeners failed; the messages are kept in firing order
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Trigger dispatch failed: {}", .errors.join("; "))]
pub struct TriggerError {
    pub errors: Vec<String>,
}

pub struct TriggerEvent<'a> {
    pub id: Uuid,
    pub name: &'static str,
    pub fired_at: DateTime<Utc>,
    pub proposal: &'a Proposal,
    pub user: &'a User,
    pub lang: &'a str,
    pub config: &'a DocgenConfig,
}

impl<'a> TriggerEvent<'a> {
    pub fn new(
        name: &'static str,
        proposal: &'a Proposal,
        user: &'a User,
        lang: &'a str,
        config: &'a DocgenConfig,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            fired_at: Utc::now(),
            proposal,
            user,
            lang,
            config,
        }
    }
}

/// Broadcasts domain events to whatever the host has registered
pub trait TriggerBus {
    fn run_triggers(&self, event: &TriggerEvent<'_>) -> Result<(), TriggerError>;
}

pub trait TriggerListener {
    fn name(&self) -> &str;
    fn on_event(&self, event: &TriggerEvent<'_>) -> Result<(), String>;
}

/// Runs every listener in registration order; one failure does not stop the rest
#[derive(Default)]
pub struct TriggerDispatcher {
    listeners: Vec<Box<dyn TriggerListener>>,
}

impl TriggerDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: Box<dyn TriggerListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl TriggerBus for TriggerDispatcher {
    fn run_triggers(&self, event: &TriggerEvent<'_>) -> Result<(), TriggerError> {
        let mut errors = vec![];

        for listener in &self.listeners {
            if let Err(message) = listener.on_event(event) {
                warn!(
                    trigger = listener.name(),
                    event = event.name,
                    error = %message,
                    "trigger failed"
                );
                errors.push(message);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(TriggerError { errors })
        }
    }
}

/// Logs each event
pub struct TracingListener;

impl TriggerListener for TracingListener {
    fn name(&self) -> &str {
        "tracing"
    }

    fn on_event(&self, event: &TriggerEvent<'_>) -> Result<(), String> {
        info!(
            event_id = %event.id,
            event = event.name,
            proposal = %event.proposal.reference,
            user = %event.user.login,
            lang = event.lang,
            "trigger fired"
        );
        Ok(())
    }
}
