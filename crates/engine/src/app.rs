//! Application state and composition.

use std::sync::Arc;

use gumshoe_domain::{CaseId, CityMap, UserId};

use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::memory::MemoryRepositories;
use crate::infrastructure::ports::ClockPort;
use crate::session::GameSession;
use crate::stores::WorldSession;
use crate::use_cases::case::AdvanceCase;
use crate::use_cases::content::GameContent;
use crate::use_cases::evidence::DiscoverEvidence;
use crate::use_cases::progression::ApplyProgression;
use crate::use_cases::travel::{CompleteTravel, StartTravel};
use crate::use_cases::world::{GetWorldSnapshot, TickTime};
use crate::use_cases::{
    CaseUseCases, EvidenceUseCases, ProgressionUseCases, TravelUseCases, WorldUseCases,
};

/// Main application state.
///
/// Holds the repositories, the world-service use cases, and the loaded
/// content pack. Player sessions are spawned from here and share the
/// same world services.
pub struct App {
    pub repositories: MemoryRepositories,
    pub use_cases: UseCases,
    pub content: Arc<GameContent>,
    city: Arc<CityMap>,
}

/// Container for the world-service use cases.
pub struct UseCases {
    pub world: Arc<WorldUseCases>,
    pub travel: Arc<TravelUseCases>,
    pub cases: Arc<CaseUseCases>,
    pub progression: Arc<ProgressionUseCases>,
    pub evidence: Arc<EvidenceUseCases>,
}

impl App {
    /// Create a new App with all dependencies wired up. Seeds the
    /// repositories with the pack's routes and authored case objectives.
    pub fn new(content: GameContent) -> Self {
        let clock: Arc<dyn ClockPort> = Arc::new(SystemClock::new());
        let repositories = MemoryRepositories::new();
        repositories.travel.seed_routes(content.routes.clone());
        for case in &content.cases {
            repositories
                .world
                .seed_case_objectives(case.id.clone(), case.objectives.clone());
        }

        let city = Arc::new(content.city.clone());
        let catalog = Arc::new(content.evidence.clone());

        let world = Arc::new(WorldUseCases::new(
            Arc::new(GetWorldSnapshot::new(
                repositories.world.clone(),
                repositories.travel.clone(),
                city.clone(),
            )),
            Arc::new(TickTime::new(
                repositories.world.clone(),
                repositories.event_log.clone(),
                clock.clone(),
            )),
        ));
        let travel = Arc::new(TravelUseCases::new(
            Arc::new(StartTravel::new(
                repositories.travel.clone(),
                repositories.world.clone(),
                repositories.event_log.clone(),
                clock.clone(),
                city.clone(),
            )),
            Arc::new(CompleteTravel::new(
                repositories.travel.clone(),
                repositories.world.clone(),
                repositories.event_log.clone(),
                clock.clone(),
                city.clone(),
            )),
        ));
        let cases = Arc::new(CaseUseCases::new(Arc::new(AdvanceCase::new(
            repositories.world.clone(),
            repositories.event_log.clone(),
            clock.clone(),
            city.clone(),
        ))));
        let progression = Arc::new(ProgressionUseCases::new(Arc::new(ApplyProgression::new(
            repositories.world.clone(),
            repositories.event_log.clone(),
            clock.clone(),
        ))));
        let evidence = Arc::new(EvidenceUseCases::new(Arc::new(DiscoverEvidence::new(
            repositories.world.clone(),
            repositories.event_log.clone(),
            clock,
            catalog,
        ))));

        Self {
            repositories,
            use_cases: UseCases {
                world,
                travel,
                cases,
                progression,
                evidence,
            },
            content: Arc::new(content),
            city,
        }
    }

    /// Spawn a session for one player. Call `bootstrap` on it before use.
    pub fn session(&self, user_id: UserId, case_id: Option<CaseId>) -> GameSession {
        let world = Arc::new(WorldSession::new(
            user_id.clone(),
            case_id.clone(),
            &self.city,
            self.use_cases.world.clone(),
            self.use_cases.travel.clone(),
            self.use_cases.cases.clone(),
            self.use_cases.progression.clone(),
            self.use_cases.evidence.clone(),
        ));
        GameSession::new(
            user_id,
            case_id,
            self.content.clone(),
            world,
            self.repositories.save_game.clone(),
        )
    }
}
