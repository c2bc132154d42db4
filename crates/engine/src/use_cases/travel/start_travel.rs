//! Start travel use case.
//!
//! Opens an in-progress session between two locations. The ETA comes from
//! the authored route when one exists, otherwise from the mode default;
//! the beat is chosen once here and rides on the session.

use std::sync::Arc;

use serde::Serialize;

use gumshoe_domain::{
    travel_beat_for, CaseId, CityMap, DomainEventKind, DomainEventRecord, LocationId, TravelMode,
    TravelSession, UserId, WorldClock,
};

use crate::infrastructure::ports::{ClockPort, EventLogRepo, TravelRepo, WorldRepo};
use crate::use_cases::world::ensure_clock;

use super::error::TravelError;

/// A freshly opened session plus where the clock will stand on arrival.
/// The prediction is informational; nothing is persisted from it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelStartOutcome {
    pub session: TravelSession,
    pub predicted_arrival: WorldClock,
}

pub struct StartTravel {
    travel_repo: Arc<dyn TravelRepo>,
    world_repo: Arc<dyn WorldRepo>,
    event_log: Arc<dyn EventLogRepo>,
    clock: Arc<dyn ClockPort>,
    city: Arc<CityMap>,
}

impl StartTravel {
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

    /// Open a session. At most one session per user may be in progress;
    /// starting a second is a typed failure, not a queue.
    pub async fn execute(
        &self,
        user_id: UserId,
        from: LocationId,
        to: LocationId,
        mode: TravelMode,
        case_id: Option<CaseId>,
    ) -> Result<TravelStartOutcome, TravelError> {
        if self
            .travel_repo
            .find_in_progress(user_id.clone())
            .await?
            .is_some()
        {
            return Err(TravelError::AlreadyTraveling);
        }

        let world_clock = ensure_clock(self.world_repo.as_ref(), &user_id).await?;
        let route = self
            .travel_repo
            .find_route(from.clone(), to.clone(), mode)
            .await?;

        let eta_ticks = route
            .as_ref()
            .map(|r| r.eta_ticks.max(1))
            .unwrap_or_else(|| mode.default_eta_ticks());
        let risk_level = route.as_ref().map(|r| r.risk_level).unwrap_or(0);
        let beat = travel_beat_for(&self.city, risk_level, &to, case_id.as_ref());

        let session = TravelSession::start(
            user_id.clone(),
            from,
            to,
            route.map(|r| r.id),
            mode,
            world_clock.tick,
            eta_ticks,
            beat,
        );
        self.travel_repo.save_session(&session).await?;

        self.event_log
            .append(&DomainEventRecord::new(
                user_id,
                world_clock.tick,
                DomainEventKind::TravelStarted,
                serde_json::json!({
                    "sessionId": session.id,
                    "fromLocationId": session.from_location_id,
                    "toLocationId": session.to_location_id,
                    "mode": session.mode,
                    "etaTicks": session.eta_ticks,
                }),
                self.clock.now(),
            ))
            .await?;

        let predicted_arrival = world_clock.advanced(eta_ticks);
        Ok(TravelStartOutcome {
            session,
            predicted_arrival,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::ports::{MockEventLogRepo, MockTravelRepo, MockWorldRepo};
    use chrono::Utc;
    use gumshoe_domain::{Route, RouteId, TravelBeat, TravelStatus};

    fn user() -> UserId {
        UserId::new("user_test")
    }

    fn use_case(
        travel_repo: MockTravelRepo,
        world_repo: MockWorldRepo,
        event_log: MockEventLogRepo,
    ) -> StartTravel {
        StartTravel::new(
            Arc::new(travel_repo),
            Arc::new(world_repo),
            Arc::new(event_log),
            Arc::new(FixedClock(Utc::now())),
            Arc::new(CityMap::freiburg_1905()),
        )
    }

    #[tokio::test]
    async fn when_route_exists_then_session_uses_its_eta_and_id() {
        let mut travel_repo = MockTravelRepo::new();
        travel_repo.expect_find_in_progress().returning(|_| Ok(None));
        travel_repo.expect_find_route().returning(|from, to, mode| {
            Ok(Some(Route {
                id: RouteId::new("route_hbf_bank_tram"),
                from_location_id: from,
                to_location_id: to,
                mode,
                eta_ticks: 1,
                risk_level: 0,
                active: true,
            }))
        });
        travel_repo
            .expect_save_session()
            .withf(|session| {
                session.status == TravelStatus::InProgress
                    && session.eta_ticks == 1
                    && session.started_tick == 4
                    && session.arrival_tick.is_none()
            })
            .returning(|_| Ok(()));

        let mut world_repo = MockWorldRepo::new();
        world_repo
            .expect_get_clock()
            .returning(|_| Ok(Some(WorldClock::new(4))));

        let mut event_log = MockEventLogRepo::new();
        event_log
            .expect_append()
            .withf(|record| {
                record.kind == DomainEventKind::TravelStarted
                    && record.tick == 4
                    && record.payload["etaTicks"] == 1
            })
            .returning(|_| Ok(()));

        let outcome = use_case(travel_repo, world_repo, event_log)
            .execute(
                user(),
                LocationId::new("loc_hbf"),
                LocationId::new("loc_freiburg_bank"),
                TravelMode::Tram,
                Some(CaseId::new("case_01_bank")),
            )
            .await
            .unwrap();

        assert_eq!(outcome.session.route_id, Some(RouteId::new("route_hbf_bank_tram")));
        assert_eq!(outcome.predicted_arrival.tick, 5);
        // Bank destination during the bank case carries the tape
        assert!(matches!(outcome.session.beat, TravelBeat::IntelAudio { .. }));
    }

    #[tokio::test]
    async fn when_no_route_matches_then_mode_default_eta_applies() {
        let mut travel_repo = MockTravelRepo::new();
        travel_repo.expect_find_in_progress().returning(|_| Ok(None));
        travel_repo.expect_find_route().returning(|_, _, _| Ok(None));
        travel_repo
            .expect_save_session()
            .withf(|session| session.eta_ticks == 2 && session.route_id.is_none())
            .returning(|_| Ok(()));

        let mut world_repo = MockWorldRepo::new();
        world_repo
            .expect_get_clock()
            .returning(|_| Ok(Some(WorldClock::new(0))));

        let mut event_log = MockEventLogRepo::new();
        event_log.expect_append().returning(|_| Ok(()));

        let outcome = use_case(travel_repo, world_repo, event_log)
            .execute(
                user(),
                LocationId::new("loc_hbf"),
                LocationId::new("loc_pub"),
                TravelMode::Walk,
                None,
            )
            .await
            .unwrap();

        assert_eq!(outcome.session.eta_ticks, 2);
        assert_eq!(outcome.session.beat, TravelBeat::None);
    }

    #[tokio::test]
    async fn when_a_session_is_open_then_start_is_rejected() {
        let mut travel_repo = MockTravelRepo::new();
        travel_repo.expect_find_in_progress().returning(|user_id| {
            Ok(Some(TravelSession::start(
                user_id,
                LocationId::new("loc_hbf"),
                LocationId::new("loc_pub"),
                None,
                TravelMode::Walk,
                0,
                2,
                TravelBeat::None,
            )))
        });

        let world_repo = MockWorldRepo::new();
        let event_log = MockEventLogRepo::new();

        let result = use_case(travel_repo, world_repo, event_log)
            .execute(
                user(),
                LocationId::new("loc_hbf"),
                LocationId::new("loc_pub"),
                TravelMode::Walk,
                None,
            )
            .await;

        assert!(matches!(result, Err(TravelError::AlreadyTraveling)));
    }
}
