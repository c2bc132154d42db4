//! Complete travel use case.
//!
//! Resolves an in-progress session: charges the travel ticks against the
//! world clock, marks the session completed with its arrival tick, and
//! reports the destination's availability under the new phase.

use std::sync::Arc;

use serde::Serialize;

use gumshoe_domain::{
    CityMap, DomainEventKind, DomainEventRecord, LocationAvailability, TravelSession,
    TravelSessionId, TravelStatus, UserId, WorldClock,
};

use crate::infrastructure::ports::{ClockPort, EventLogRepo, TravelRepo, WorldRepo};
use crate::use_cases::world::ensure_clock;

use super::error::TravelError;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelCompleteOutcome {
    pub session: TravelSession,
    pub world_clock: WorldClock,
    pub location_availability: LocationAvailability,
}

pub struct CompleteTravel {
    travel_repo: Arc<dyn TravelRepo>,
    world_repo: Arc<dyn WorldRepo>,
    event_log: Arc<dyn EventLogRepo>,
    clock: Arc<dyn ClockPort>,
    city: Arc<CityMap>,
}

impl CompleteTravel {
    pub fn new(
        travel_repo: Arc<dyn TravelRepo>,
        world_repo: Arc<dyn WorldRepo>,
        event_log: Arc<dyn EventLogRepo>,
        clock: Arc<dyn ClockPort>,
        city: Arc<CityMap>,
    ) -> Self {
        Self {
            travel_repo,
            world_repo,
            event_log,
            clock,
            city,
        }
    }

    /// Complete a session. Only valid on the caller's own in-progress
    /// session; completing twice or completing a missing session is a
    /// typed failure, never a silent no-op.
    pub async fn execute(
        &self,
        user_id: UserId,
        session_id: TravelSessionId,
    ) -> Result<TravelCompleteOutcome, TravelError> {
        let mut session = self
            .travel_repo
            .get_session(session_id)
            .await?
            .filter(|session| session.user_id == user_id)
            .ok_or(TravelError::SessionNotFound)?;

        if !session.is_in_progress() {
            return Err(TravelError::AlreadyFinished);
        }

        let current = ensure_clock(self.world_repo.as_ref(), &user_id).await?;
        let delta = session.completion_ticks();
        let next = current.advanced(delta);
        self.world_repo.save_clock(user_id.clone(), &next).await?;

        session.status = TravelStatus::Completed;
        session.arrival_tick = Some(next.tick);
        self.travel_repo.save_session(&session).await?;

        self.event_log
            .append(&DomainEventRecord::new(
                user_id.clone(),
                next.tick,
                DomainEventKind::WorldTickAdvanced,
                serde_json::json!({
                    "actionType": "travel",
                    "delta": delta,
                    "fromTick": current.tick,
                    "toTick": next.tick,
                }),
                self.clock.now(),
            ))
            .await?;
        self.event_log
            .append(&DomainEventRecord::new(
                user_id,
                next.tick,
                DomainEventKind::TravelCompleted,
                serde_json::json!({
                    "sessionId": session.id,
                    "toLocationId": session.to_location_id,
                    "beatType": session.beat.kind_str(),
                }),
                self.clock.now(),
            ))
            .await?;

        let location_availability = self.city.availability(&session.to_location_id, next.phase);
        Ok(TravelCompleteOutcome {
            session,
            world_clock: next,
            location_availability,
        })
    }
}
