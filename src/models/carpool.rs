use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::ride_request::RideRequest,
    services::store::Document,
};

/// A scheduled ride with one driver and a set of passengers. The passenger
/// list keeps set semantics: a user appears at most once and the driver is
/// never a passenger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Carpool {
    pub id: String,
    pub event: String,
    pub date: DateTime<Utc>,
    pub start_location: String,
    pub end_location: String,
    pub driver: String,
    #[serde(default)]
    pub passengers: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Carpool {
    pub fn new(
        event: String,
        date: DateTime<Utc>,
        start_location: String,
        end_location: String,
        driver: &str,
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
            driver: driver.to_string(),
            passengers: Vec::new(),
            created_at: Utc::now(),
        })
    }

    /// A fulfilled ride request becomes a carpool with the same itinerary.
    pub fn from_request(request: &RideRequest, driver: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event: request.event.clone(),
            date: request.date,
            start_location: request.start_location.clone(),
            end_location: request.end_location.clone(),
            driver: driver.to_string(),
            passengers: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn join(&mut self, user: &str) -> Result<(), AppError> {
        if user == self.driver {
            return Err(AppError::Conflict(
                "the driver cannot join their own carpool as a passenger".to_string(),
            ));
        }
        if self.passengers.iter().any(|p| p == user) {
            return Err(AppError::Conflict(
                "already a passenger in this carpool".to_string(),
            ));
        }
        self.passengers.push(user.to_string());
        Ok(())
    }

    pub fn leave(&mut self, user: &str) -> Result<(), AppError> {
        if !self.passengers.iter().any(|p| p == user) {
            return Err(AppError::Conflict(
                "not a passenger in this carpool".to_string(),
            ));
        }
        self.passengers.retain(|p| p != user);
        Ok(())
    }
}

impl Document for Carpool {
    const FILE: &'static str = "carpools.json";

    fn id(&self) -> &str {
        &self.id
    }
}
