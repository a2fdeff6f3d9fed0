use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use murmur_api::AppState;
use murmur_api::state::run_db;
use murmur_types::events::CloseReason;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub rooms: usize,
    pub files: usize,
    pub bans: usize,
}

/// Background task that removes expired rooms.
///
/// Each pass deletes rooms past their `expires_at` together with their
/// content, removes their media files, tells connected clients the room is
/// gone, and prunes bans that have run out.
pub async fn run_cleanup_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match sweep(&state, Utc::now()).await {
            Ok(stats) => {
                if stats.rooms > 0 || stats.bans > 0 {
                    info!(
                        "Cleanup: removed {} expired rooms ({} media files), pruned {} bans",
                        stats.rooms, stats.files, stats.bans
                    );
                }
            }
            Err(e) => {
                warn!("Cleanup error: {}", e);
            }
        }
    }
}

pub async fn sweep(state: &AppState, now: DateTime<Utc>) -> anyhow::Result<SweepStats> {
    let mut stats = SweepStats::default();

    let expired = run_db(state, move |db| db.expired_room_ids(now)).await?;
    for id in expired {
        let room_id = id.clone();
        let upload_ids = match run_db(state, move |db| db.delete_room(&room_id)).await {
            Ok(ids) => ids,
            Err(e) => {
                // keep going, the next pass retries this room
                warn!("Cleanup: failed to delete room {}: {}", id, e);
                continue;
            }
        };

        stats.rooms += 1;
        stats.files += state.storage.delete_files(&upload_ids).await;

        match id.parse::<Uuid>() {
            Ok(room_id) => state.dispatcher.close_room(room_id, CloseReason::Expired).await,
            Err(e) => warn!("Cleanup: room id '{}' is not a uuid: {}", id, e),
        }
    }

    stats.bans = run_db(state, move |db| db.prune_expired_bans(now)).await?;

    Ok(stats)
}
