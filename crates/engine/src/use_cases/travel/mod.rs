//! Travel use cases.
//!
//! Travel is two-step at the service boundary: start opens an in-progress
//! session with an ETA and a narrative beat, complete charges the ticks
//! and lands the player. The world clock only moves on completion.

mod complete_travel;
mod error;
mod start_travel;

use std::sync::Arc;

pub use complete_travel::{CompleteTravel, TravelCompleteOutcome};
pub use error::TravelError;
pub use start_travel::{StartTravel, TravelStartOutcome};

/// Container for travel use cases.
pub struct TravelUseCases {
    pub start_travel: Arc<StartTravel>,
    pub complete_travel: Arc<CompleteTravel>,
}

impl TravelUseCases {
    pub fn new(start_travel: Arc<StartTravel>, complete_travel: Arc<CompleteTravel>) -> Self {
        Self {
            start_travel,
            complete_travel,
        }
    }
}
