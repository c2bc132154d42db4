//! Gumshoe Engine - Main entry point.
//!
//! Runs a short scripted patrol against the loaded content pack so the
//! engine can be exercised end to end without a frontend attached.

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gumshoe_domain::{CaseId, ItemId, MerchantId, UserId};
use gumshoe_engine::stores::{TravelCall, TravelParams};
use gumshoe_engine::use_cases::content::{ContentService, GameContent};
use gumshoe_engine::App;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv_from_repo_root();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gumshoe_engine=debug,gumshoe_domain=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Gumshoe Engine");

    // Load configuration
    let content_dir = std::env::var("GUMSHOE_CONTENT_DIR").unwrap_or_else(|_| "content".into());
    let case_id = CaseId::new(std::env::var("GUMSHOE_CASE").unwrap_or_else(|_| "case_01_bank".into()));
    let user_id = UserId::new(std::env::var("GUMSHOE_USER").unwrap_or_else(|_| "detective-1".into()));

    let content = match ContentService::new(&content_dir).load() {
        Ok(pack) => {
            info!(
                dir = %content_dir,
                quests = pack.quests.len(),
                points = pack.points.len(),
                merchants = pack.merchants.len(),
                "Content pack loaded"
            );
            pack
        }
        Err(error) => {
            warn!(%error, "Content pack failed to load, falling back to built-in content");
            GameContent::builtin()
        }
    };

    let app = App::new(content);
    let session = app.session(user_id, Some(case_id));
    if !session.bootstrap().await {
        warn!("World snapshot unavailable, session state is cold");
    }

    let view = session.world.view().await;
    info!(
        tick = view.world_clock.tick,
        phase = ?view.world_clock.phase,
        location = %view.current_location_id,
        money = session.inventory.money().await,
        "Session ready"
    );

    // Walk to the bank and let the arrival bindings run.
    let outing = session.travel(TravelParams::to("loc_freiburg_bank")).await;
    match &outing.call {
        TravelCall::Arrived {
            session: leg,
            world_clock,
            availability,
        } => {
            info!(
                eta = leg.eta_ticks,
                tick = world_clock.tick,
                beat = leg.beat.kind_str(),
                open = availability.open,
                "Arrived at the bank"
            );
        }
        TravelCall::SameLocation => info!("Already at the bank"),
        TravelCall::Busy { holder } => warn!(holder = holder.as_str(), "Travel refused"),
        TravelCall::Failed => warn!("Travel failed"),
    }
    for signal in &outing.batch.signals {
        info!(?signal, "Frontend signal");
    }
    for quest_id in outing.batch.completed_quests() {
        info!(%quest_id, "Quest completed");
    }

    // Quest board after the trip.
    for (quest_id, stage) in session.quests.stage_views().await {
        info!(%quest_id, stage = ?stage.current, "Quest stage");
    }

    // Browse the fence's counter.
    let fence = MerchantId::new("the_fence");
    match session.merchant_stock(&fence).await {
        Ok(stock) => {
            for row in stock {
                info!(item = %row.item_id, quantity = row.quantity, "Fence offers");
            }
        }
        Err(error) => info!(%error, "No browsing the fence today"),
    }

    // Rations on the go.
    match session.use_item(&ItemId::new("bread")).await {
        Ok(_) => info!(
            xp = session.world.view().await.player.xp,
            "Ate bread from the satchel"
        ),
        Err(error) => info!(%error, "Could not eat bread"),
    }

    session.persist().await?;
    info!("Session saved");
    Ok(())
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}
