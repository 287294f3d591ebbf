use crossbeam::channel::{Receiver, RecvTimeoutError, TryRecvError};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{error, info};

use crate::error::{SensorError, SensorResult};
use crate::ipc::ChannelContext;
use crate::metrics::ChannelStats;
use crate::sensor::{Channel, EmitMode, SignalGenerator};

/// Spawn the worker thread for one channel.
///
/// The thread runs until `shutdown` is signalled (a send or the sender being
/// dropped). A channel whose parameters fail validation marks itself failed
/// in its stats and exits without publishing.
pub fn spawn_channel_thread(
    channel: Channel,
    ctx: ChannelContext,
    shutdown: Receiver<()>,
) -> SensorResult<(thread::JoinHandle<()>, Arc<ChannelStats>)> {
    let stats = ChannelStats::new();
    let stats_clone = stats.clone();
    let name = channel.name.clone();

    let handle = thread::Builder::new()
        .name(format!("sensor-{}", channel.name))
        .spawn(move || run_channel(channel, ctx, shutdown, stats_clone))
        .map_err(|e| SensorError::Spawn { name, message: e.to_string() })?;

    Ok((handle, stats))
}

fn run_channel(channel: Channel, ctx: ChannelContext, shutdown: Receiver<()>, stats: Arc<ChannelStats>) {
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

    loop {
        // 1. Generate next correlated value
        let gen_start = Instant::now();
        let value = generator.next_value();
        ctx.metrics.record_generation(gen_start.elapsed());

        match generator.mode() {
            // 2a. Periodic: publish now, then sleep (interruptible by shutdown)
            EmitMode::Periodic(interval) => {
                ctx.publish(&subtopic, value, &stats);
                match shutdown.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            // 2b. Triggered: hold the value until our code shows up in the slot
            EmitMode::Triggered => {
                let latency = loop {
                    if let Some(latency) = ctx.coordinator.wait_consume(code, ctx.trigger_poll) {
                        break latency;
                    }
                    if shutdown_requested(&shutdown) {
                        return;
                    }
                };
                info!(channel = %name, "{} sensor triggered", name);
                ctx.metrics.record_trigger_latency(latency);
                ctx.publish(&subtopic, value, &stats);
            }
        }
    }
}

fn shutdown_requested(shutdown: &Receiver<()>) -> bool {
    !matches!(shutdown.try_recv(), Err(TryRecvError::Empty))
}
