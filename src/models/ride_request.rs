use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, services::store::Document};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Accepted,
    Cancelled,
    Fulfilled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "Pending",
            RequestStatus::Accepted => "Accepted",
            RequestStatus::Cancelled => "Cancelled",
            RequestStatus::Fulfilled => "Fulfilled",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A request for a ride to an event, awaiting acceptance by a driver.
///
/// The descriptive fields and the requester are fixed at creation; the only
/// mutable state is the status, the accepter and the append-only note list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideRequest {
    pub id: String,
    pub event: String,
    pub date: DateTime<Utc>,
    pub start_location: String,
    pub end_location: String,
    pub requester: String,
    #[serde(default)]
    pub accepted_by: Option<String>,
    pub status: RequestStatus,
    #[serde(default)]
    pub notes: Vec<Note>,
    pub created_at: DateTime<Utc>,
}

impl RideRequest {
    pub fn new(
        event: String,
        date: DateTime<Utc>,
        start_location: String,
        end_location: String,
        requester: &str,
    ) -> Result<Self, AppError> {
        if event.trim().is_empty()
            || start_location.trim().is_empty()
            || end_location.trim().is_empty()
        {
            return Err(AppError::BadRequest(
                "event, startLocation and endLocation are required".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            event,
            date,
            start_location,
            end_location,
            requester: requester.to_string(),
            accepted_by: None,
            status: RequestStatus::Pending,
            notes: Vec::new(),
            created_at: Utc::now(),
        })
    }

    /// A pending request may be claimed by anyone except its own requester.
    pub fn accept(&mut self, caller: &str) -> Result<(), AppError> {
        if caller == self.requester {
            return Err(AppError::Forbidden);
        }
        if self.status != RequestStatus::Pending {
            return Err(AppError::Conflict(
                "ride request is no longer pending".to_string(),
            ));
        }
        self.status = RequestStatus::Accepted;
        self.accepted_by = Some(caller.to_string());
        Ok(())
    }

    /// Only the current accepter may back out; the request returns to the
    /// open pool.
    pub fn unaccept(&mut self, caller: &str) -> Result<(), AppError> {
        if self.accepted_by.as_deref() != Some(caller) {
            return Err(AppError::Forbidden);
        }
        self.status = RequestStatus::Pending;
        self.accepted_by = None;
        Ok(())
    }

    /// Both the requester and the current accepter may cancel, from any
    /// status. Cancelled is terminal for accept/unaccept/fulfill.
    pub fn cancel(&mut self, caller: &str) -> Result<(), AppError> {
        if caller != self.requester && self.accepted_by.as_deref() != Some(caller) {
            return Err(AppError::Forbidden);
        }
        self.status = RequestStatus::Cancelled;
        self.accepted_by = None;
        Ok(())
    }

    /// Notes carry no permissions beyond authentication and are never
    /// removed.
    pub fn add_note(&mut self, author: &str, content: &str) -> Result<(), AppError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::BadRequest("note content is required".to_string()));
        }
        self.notes.push(Note {
            author: author.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    /// Marks the request as answered by a freshly created carpool. The
    /// carpool itself is built by the caller from this request's fields.
    pub fn fulfill(&mut self) -> Result<(), AppError> {
        if self.status != RequestStatus::Pending {
            return Err(AppError::Conflict(
                "ride request is no longer pending".to_string(),
            ));
        }
        self.status = RequestStatus::Fulfilled;
        Ok(())
    }
}

impl Document for RideRequest {
    const FILE: &'static str = "ride_requests.json";

    fn id(&self) -> &str {
        &self.id
    }
}
