//! The node's game loop: one collision pass per frame, fed back into the
//! engine as inputs.

use behavior_arena::collision_inputs;
use colyseus_core::ShutdownState;
use replication::ReplicationEngine;
use std::time::Duration;
use tracing::{debug, trace};

/// Runs one frame and returns the number of inputs it produced.
pub async fn run_frame(engine: &ReplicationEngine) -> usize {
    let views = engine.snapshot().await;
    for view in &views {
        trace!(
            guid = %view.object.guid,
            owner = %view.object.owner,
            primary = view.is_primary,
            x = view.location.x,
            y = view.location.y,
            "Object position"
        );
    }

    let inputs = collision_inputs(&views);
    let produced = inputs.len();
    if produced > 0 {
        debug!(node_id = %engine.node_id(), inputs = produced, "Collision pass produced inputs");
        engine.advance(inputs).await;
    }
    produced
}

/// Runs frames at the configured frame rate until shutdown.
pub async fn run_frame_loop(engine: ReplicationEngine, shutdown: ShutdownState) {
    loop {
        let frame_rate = engine.config().frame_rate.max(1);
        let period = Duration::from_millis(u64::from(1000 / frame_rate).max(1));
        tokio::select! {
            _ = tokio::time::sleep(period) => {
                run_frame(&engine).await;
            }
            _ = shutdown.wait() => break,
        }
    }
    debug!(node_id = %engine.node_id(), "Frame loop stopped");
}
