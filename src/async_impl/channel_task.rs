use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::ipc::ChannelContext;
use crate::metrics::ChannelStats;
use crate::sensor::{Channel, EmitMode, SignalGenerator};

/// Async counterpart of the channel thread.
///
/// Triggered channels poll the slot on a `trigger_poll` tick instead of
/// blocking on its condvar, so no runtime worker is ever parked.
pub async fn channel_task(
    channel: Channel,
    ctx: ChannelContext,
    mut shutdown: watch::Receiver<bool>,
    stats: Arc<ChannelStats>,
) {
    let name = channel.name.clone();
    let mut generator = match SignalGenerator::new(channel) {
        Ok(g) => g,
        Err(e) => {
            error!(channel = %name, error = %e, "couldn't initialize the sensor");
            stats.failed.store(true, Ordering::Relaxed);
            return;
        }
    };
    ctx.announce(generator.channel());

    let subtopic = generator.channel().subtopic(&ctx.base_topic);
    let code = generator.channel().trigger_code();
    let mut poll = interval(ctx.trigger_poll);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *shutdown.borrow() {
            return;
        }

        let gen_start = Instant::now();
        let value = generator.next_value();
        ctx.metrics.record_generation(gen_start.elapsed());

        match generator.mode() {
            EmitMode::Periodic(period) => {
                ctx.publish(&subtopic, value, &stats);
                tokio::select! {
                    _ = sleep(period) => {}
                    _ = shutdown.changed() => return,
                }
            }
            EmitMode::Triggered => {
                let latency = loop {
                    if let Some(latency) = ctx.coordinator.try_consume_timed(code) {
                        break latency;
                    }
                    tokio::select! {
                        _ = poll.tick() => {}
                        _ = shutdown.changed() => return,
                    }
                };
                info!(channel = %name, "{} sensor triggered", name);
                ctx.metrics.record_trigger_latency(latency);
                ctx.publish(&subtopic, value, &stats);
            }
        }
    }
}
