//! Simulated headset outlet and the inlets that read from it

use crate::eeg_simulator::{EegConfig, EegSimulator};
use crate::signal_patterns::IntentPattern;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use xon_core::{Chunk, StreamInfo, StreamInlet, XonError, XonResult, EEG_STREAM_TYPE};

/// One timestamped sample on the wire
pub type Sample = (f64, Vec<f32>);

/// Configuration for real-time streaming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutletConfig {
    /// Name the stream is published under
    pub stream_name: String,
    /// Source id reported to discovery
    pub source_id: String,
    /// EEG simulation configuration
    pub eeg: EegConfig,
    /// Chunk duration in seconds
    pub chunk_duration: f64,
    /// Seconds of samples kept for slow readers before the oldest are dropped
    pub buffer_seconds: f64,
}

impl Default for OutletConfig {
    fn default() -> Self {
        Self {
            stream_name: "X.on-102801-0045".to_string(),
            source_id: "102801-0045".to_string(),
            eeg: EegConfig::default(),
            chunk_duration: 0.04,
            buffer_seconds: 30.0,
        }
    }
}

/// Commands for controlling the outlet
#[derive(Debug, Clone)]
pub enum OutletCommand {
    Pause,
    Resume,
    SetIntent(Option<[f32; 2]>),
    SetPattern(IntentPattern),
    Stop,
}

/// Counters shared between the outlet task and its handle
#[derive(Debug, Default)]
pub struct OutletStats {
    samples_sent: AtomicU64,
    samples_dropped: AtomicU64,
}

impl OutletStats {
    pub fn samples_sent(&self) -> u64 {
        self.samples_sent.load(Ordering::Relaxed)
    }

    /// Samples evicted because no reader kept up
    pub fn samples_dropped(&self) -> u64 {
        self.samples_dropped.load(Ordering::Relaxed)
    }
}

/// Handle to a running outlet; dropping it stops the producer task
pub struct OutletHandle {
    info: StreamInfo,
    receiver: Receiver<Sample>,
    control: mpsc::UnboundedSender<OutletCommand>,
    stats: Arc<OutletStats>,
}

impl OutletHandle {
    pub fn info(&self) -> &StreamInfo {
        &self.info
    }

    /// Open a reader on this outlet
    pub fn inlet(&self) -> SimulatedInlet {
        SimulatedInlet {
            info: self.info.clone(),
            receiver: self.receiver.clone(),
        }
    }

    /// Send a control command; fails once the producer has exited
    pub fn send(&self, command: OutletCommand) -> XonResult<()> {
        self.control.send(command).map_err(|_| XonError::StreamClosed {
            name: self.info.name.clone(),
        })
    }

    pub fn stats(&self) -> &OutletStats {
        &self.stats
    }
}

impl Drop for OutletHandle {
    fn drop(&mut self) {
        let _ = self.control.send(OutletCommand::Stop);
    }
}

fn wall_clock() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Start a simulated headset on the given tokio runtime
pub fn spawn_outlet(
    runtime: &tokio::runtime::Handle,
    config: OutletConfig,
) -> XonResult<OutletHandle> {
    if !(config.chunk_duration > 0.0) {
        return Err(XonError::InvalidConfig {
            reason: format!("chunk duration must be positive, got {}", config.chunk_duration),
        });
    }

    let simulator = EegSimulator::new(config.eeg.clone())?;
    let info = StreamInfo::new(
        &config.stream_name,
        EEG_STREAM_TYPE,
        &config.source_id,
        config.eeg.sampling_rate,
        config.eeg.channel_count,
    )?;

    let capacity = ((config.eeg.sampling_rate * config.buffer_seconds) as usize).max(1);
    let (sender, receiver) = crossbeam_channel::bounded(capacity);
    let (control, commands) = mpsc::unbounded_channel();
    let stats = Arc::new(OutletStats::default());

    let producer = Producer {
        name: info.name.clone(),
        chunk_duration: config.chunk_duration,
        simulator,
        sender,
        evictor: receiver.clone(),
        stats: Arc::clone(&stats),
    };
    runtime.spawn(producer.run(commands));

    info!(
        stream = %info.name,
        sampling_rate = info.nominal_srate,
        channels = info.channel_count,
        "simulated EEG outlet started"
    );

    Ok(OutletHandle {
        info,
        receiver,
        control,
        stats,
    })
}

struct Producer {
    name: String,
    chunk_duration: f64,
    simulator: EegSimulator,
    sender: Sender<Sample>,
    evictor: Receiver<Sample>,
    stats: Arc<OutletStats>,
}

impl Producer {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<OutletCommand>) {
        let mut ticker = interval(Duration::from_secs_f64(self.chunk_duration));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let rate = self.simulator.config().sampling_rate;
        let mut paused = false;
        let mut debt = 0.0;
        let mut last_tick = wall_clock();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = wall_clock();
                    // Generate what the elapsed time owes, so ticks that run
                    // late do not slow the nominal rate down
                    debt += (now - last_tick) * rate;
                    last_tick = now;
                    let n = debt.floor() as usize;
                    debt -= n as f64;
                    if paused || n == 0 {
                        continue;
                    }

                    let rows = self.simulator.generate(n);
                    for (k, row) in rows.into_iter().enumerate() {
                        let stamp = now - (n - 1 - k) as f64 / rate;
                        self.push((stamp, row));
                    }
                }
                command = commands.recv() => {
                    match command {
                        Some(OutletCommand::Pause) => {
                            paused = true;
                            debug!(stream = %self.name, "outlet paused");
                        }
                        Some(OutletCommand::Resume) => {
                            paused = false;
                            debug!(stream = %self.name, "outlet resumed");
                        }
                        Some(OutletCommand::SetIntent(intent)) => self.simulator.set_intent(intent),
                        Some(OutletCommand::SetPattern(pattern)) => {
                            let description = pattern.description();
                            debug!(stream = %self.name, pattern = description, "pattern updated");
                            self.simulator.set_pattern(pattern);
                        }
                        Some(OutletCommand::Stop) | None => {
                            info!(stream = %self.name, "simulated EEG outlet stopped");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Send a sample, evicting the oldest one when the buffer is full
    fn push(&self, sample: Sample) {
        let mut sample = sample;
        loop {
            match self.sender.try_send(sample) {
                Ok(()) => {
                    self.stats.samples_sent.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                Err(TrySendError::Full(returned)) => {
                    if self.evictor.try_recv().is_ok() {
                        self.stats.samples_dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    sample = returned;
                }
                Err(TrySendError::Disconnected(_)) => {
                    warn!(stream = %self.name, "no readers left, dropping sample");
                    return;
                }
            }
        }
    }
}

/// Reader side of a simulated outlet
pub struct SimulatedInlet {
    info: StreamInfo,
    receiver: Receiver<Sample>,
}

impl StreamInlet for SimulatedInlet {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn pull_chunk(&mut self, timeout: Duration, max_samples: usize) -> XonResult<Chunk> {
        let mut samples = Vec::new();
        let mut timestamps = Vec::new();
        if max_samples == 0 {
            return Ok(Chunk::empty());
        }

        match self.receiver.recv_timeout(timeout) {
            Ok((stamp, row)) => {
                timestamps.push(stamp);
                samples.push(row);
            }
            Err(RecvTimeoutError::Timeout) => return Ok(Chunk::empty()),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(XonError::StreamClosed { name: self.info.name.clone() });
            }
        }

        while samples.len() < max_samples {
            match self.receiver.try_recv() {
                Ok((stamp, row)) => {
                    timestamps.push(stamp);
                    samples.push(row);
                }
                Err(_) => break,
            }
        }

        Chunk::new(samples, timestamps)
    }

    fn samples_available(&self) -> usize {
        self.receiver.len()
    }
}
