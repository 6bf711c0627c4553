//! Application state: stream pipeline, calibration session and teleoperation

use crate::config::AppConfig;
use crate::ui;
use tokio::sync::oneshot;
use tracing::{info, warn};
use xon_calibration::{Agent, Calibrator, TargetPath, TrainingReport};
use xon_core::{XonError, XonResult};
use xon_processing::{plot_interval_steps, PlotFrame, Streamer};
use xon_simulation::{
    spawn_outlet, IntentPattern, OutletCommand, SimulatedRegistry, SimulatedVehicle,
};
use xon_teleop::{HeldKey, Key, SharedView, TeleopSession};

/// Top-level tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Stream,
    Calibration,
    Teleop,
}

type TrainingResult = XonResult<(Agent, TrainingReport)>;

/// Calibration session state; training runs on a blocking worker
pub struct CalibrationState {
    pub calibrator: Option<Calibrator>,
    pub path: Option<TargetPath>,
    pub running: bool,
    /// Steer the simulated wearer's intent to the target
    pub subject_follows_target: bool,
    pub target: [f32; 2],
    pub prediction: [f32; 2],
    pub last_report: Option<TrainingReport>,
    pub status: String,
    training: Option<oneshot::Receiver<TrainingResult>>,
}

impl CalibrationState {
    fn new() -> Self {
        CalibrationState {
            calibrator: None,
            path: None,
            running: false,
            subject_follows_target: true,
            target: [0.0, 0.0],
            prediction: [0.0, 0.0],
            last_report: None,
            status: "Idle".to_string(),
            training: None,
        }
    }

    pub fn is_training(&self) -> bool {
        self.training.is_some()
    }
}

/// Teleoperation state; the control loop runs on its own thread
pub struct TeleopState {
    pub session: Option<TeleopSession>,
    pub held: HeldKey,
    pub view: SharedView,
    pub texture: Option<egui::TextureHandle>,
    pub last_key: Option<Key>,
    seen_seq: u64,
}

impl TeleopState {
    fn new() -> Self {
        TeleopState {
            session: None,
            held: HeldKey::new(),
            view: SharedView::new(),
            texture: None,
            last_key: None,
            seen_seq: 0,
        }
    }
}

/// Main application state
pub struct XonApp {
    pub config: AppConfig,
    pub tab: Tab,

    streamer: Streamer,
    pub features: Vec<f32>,
    pub plot: PlotFrame,
    pub paused: bool,
    pub pattern: IntentPattern,
    plot_every: u64,

    pub calibration: CalibrationState,
    pub teleop: TeleopState,
    pub last_error: Option<String>,

    registry: SimulatedRegistry,
    // dropped last so background tasks see their handles close first
    runtime: tokio::runtime::Runtime,
}

impl XonApp {
    /// Start the simulated headset and connect the stream pipeline to it
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Runtime::new()
            .map_err(|e| anyhow::anyhow!("Failed to create tokio runtime: {}", e))?;

        let mut registry = SimulatedRegistry::new();
        registry.register(spawn_outlet(runtime.handle(), config.simulation.outlet.clone())?);

        let streamer = Streamer::connect(&registry, config.pipeline.clone())?;
        let plot_every = plot_interval_steps(
            streamer.info().nominal_srate,
            config.pipeline.update_plot_every_s,
        ) as u64;

        Ok(XonApp {
            tab: Tab::Stream,
            features: Vec::new(),
            plot: PlotFrame::default(),
            paused: false,
            pattern: config.simulation.outlet.eeg.pattern,
            plot_every,
            calibration: CalibrationState::new(),
            teleop: TeleopState::new(),
            last_error: None,
            config,
            streamer,
            registry,
            runtime,
        })
    }

    pub fn streamer(&self) -> &Streamer {
        &self.streamer
    }

    fn send_outlet(&self, command: OutletCommand) {
        let name = &self.config.simulation.outlet.stream_name;
        match self.registry.outlet(name) {
            Some(outlet) => {
                if let Err(e) = outlet.send(command) {
                    warn!(error = %e, "failed to send outlet command");
                }
            }
            None => warn!(stream = %name, "outlet not registered"),
        }
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.send_outlet(if paused { OutletCommand::Pause } else { OutletCommand::Resume });
        self.paused = paused;
    }

    pub fn set_pattern(&mut self, pattern: IntentPattern) {
        self.send_outlet(OutletCommand::SetPattern(pattern));
        self.pattern = pattern;
    }

    /// One pipeline step per frame
    fn update_stream(&mut self) {
        match self.streamer.step() {
            Ok(features) => {
                self.features = features;
                if self.streamer.metrics().steps % self.plot_every.max(1) == 0 {
                    self.plot = self.streamer.plot_frame();
                }
            }
            Err(e) => {
                warn!(error = %e, "stream step failed");
                self.last_error = Some(e.to_string());
            }
        }
    }

    pub fn start_calibration(&mut self) {
        let n_features = self.streamer.n_features();
        let config = &self.config.calibration;
        let started = Calibrator::new(config.clone(), n_features)
            .and_then(|calibrator| Ok((calibrator, TargetPath::new(config.target.clone())?)));

        match started {
            Ok((calibrator, path)) => {
                // a job still running belongs to the previous calibrator
                self.calibration.training = None;
                info!(session = %self.config.calibration.name, n_features, "calibration started");
                self.calibration.calibrator = Some(calibrator);
                self.calibration.path = Some(path);
                self.calibration.running = true;
                self.calibration.status = "Follow the green target".to_string();
            }
            Err(e) => self.calibration.status = format!("Cannot start calibration: {}", e),
        }
    }

    pub fn stop_calibration(&mut self) {
        self.calibration.running = false;
        self.calibration.status = "Stopped".to_string();
        self.send_outlet(OutletCommand::SetIntent(None));
    }

    fn poll_training(&mut self) {
        let Some(receiver) = self.calibration.training.as_mut() else {
            return;
        };
        let result = match receiver.try_recv() {
            Ok(result) => result,
            Err(oneshot::error::TryRecvError::Empty) => return,
            Err(oneshot::error::TryRecvError::Closed) => Err(XonError::DeviceError {
                device: "training worker".to_string(),
                reason: "worker exited without a result".to_string(),
            }),
        };
        self.calibration.training = None;

        let state = &mut self.calibration;
        match result {
            Ok((agent, report)) => {
                state.status = format!(
                    "Trained on {} pairs, loss {:.4} -> {:.4}",
                    report.samples, report.initial_loss, report.final_loss
                );
                if let Some(calibrator) = state.calibrator.as_mut() {
                    calibrator.install(agent);
                }
                state.last_report = Some(report);
            }
            Err(e) => {
                warn!(error = %e, "calibration training failed");
                state.status = format!("Training failed: {}", e);
            }
        }
        if let Some(path) = state.path.as_mut() {
            path.reset();
        }
    }

    /// Advance the target, predict, record; hand finished trials to a worker
    fn update_calibration(&mut self) {
        self.poll_training();
        if !self.calibration.running || self.calibration.is_training() || self.features.is_empty() {
            return;
        }

        let state = &mut self.calibration;
        let (Some(calibrator), Some(path)) = (state.calibrator.as_mut(), state.path.as_mut()) else {
            return;
        };

        let (target, finished) = path.next();
        state.target = target;

        if finished {
            info!("calibration trial finished");
            match calibrator.begin_training() {
                Ok(job) => {
                    let (tx, rx) = oneshot::channel();
                    self.runtime.spawn_blocking(move || {
                        let _ = tx.send(job.run());
                    });
                    state.training = Some(rx);
                    state.status = "Training...".to_string();
                }
                Err(e) => {
                    state.status = format!("Training skipped: {}", e);
                    path.reset();
                }
            }
        }

        let step = calibrator
            .predict(&self.features)
            .and_then(|prediction| calibrator.record(&self.features, target).map(|()| prediction));
        match step {
            Ok(prediction) => state.prediction = prediction,
            Err(e) => {
                warn!(error = %e, "calibration step failed");
                state.status = format!("Calibration error: {}", e);
                state.running = false;
            }
        }

        if self.calibration.subject_follows_target {
            self.send_outlet(OutletCommand::SetIntent(Some(target)));
        }
    }

    pub fn start_teleop(&mut self) {
        if self.teleop.session.is_some() {
            return;
        }
        let started = SimulatedVehicle::connect(
            self.config.teleop.address.clone(),
            self.config.simulation.vehicle.clone(),
        )
        .and_then(|vehicle| {
            TeleopSession::spawn(
                self.config.teleop.clone(),
                Box::new(self.teleop.held.clone()),
                Box::new(vehicle),
                Box::new(self.teleop.view.clone()),
            )
        });

        match started {
            Ok(session) => self.teleop.session = Some(session),
            Err(e) => {
                warn!(error = %e, "failed to start teleoperation");
                self.last_error = Some(e.to_string());
            }
        }
    }

    pub fn stop_teleop(&mut self) {
        self.teleop.held.set(None);
        if let Some(session) = self.teleop.session.take() {
            match session.stop() {
                Ok(stats) => info!(
                    iterations = stats.iterations,
                    frames = stats.frames_shown,
                    device_errors = stats.device_errors,
                    "teleoperation session closed"
                ),
                Err(e) => self.last_error = Some(e.to_string()),
            }
        }
    }

    /// Arrow keys drive only while the Teleop tab is showing
    fn update_teleop(&mut self, ctx: &egui::Context) {
        let key = if self.tab == Tab::Teleop {
            ctx.input(|input| {
                [
                    (egui::Key::ArrowUp, Key::Up),
                    (egui::Key::ArrowDown, Key::Down),
                    (egui::Key::ArrowLeft, Key::Left),
                    (egui::Key::ArrowRight, Key::Right),
                ]
                .into_iter()
                .find(|(egui_key, _)| input.key_down(*egui_key))
                .map(|(_, key)| key)
            })
        } else {
            None
        };
        self.teleop.held.set(key);
        self.teleop.last_key = key;

        if let Some((seq, frame)) = self.teleop.view.frame_since(self.teleop.seen_seq) {
            let size = [frame.width() as usize, frame.height() as usize];
            let image = egui::ColorImage::from_rgb(size, frame.as_raw());
            match self.teleop.texture.as_mut() {
                Some(texture) => texture.set(image, egui::TextureOptions::default()),
                None => {
                    let options = egui::TextureOptions::default();
                    self.teleop.texture = Some(ctx.load_texture("camera", image, options));
                }
            }
            self.teleop.seen_seq = seq;
        }
    }
}

impl eframe::App for XonApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.update_stream();
        self.update_calibration();
        self.update_teleop(ctx);

        // Request continuous repaints for real-time updates
        ctx.request_repaint();

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.selectable_value(&mut self.tab, Tab::Stream, "Stream");
                ui.selectable_value(&mut self.tab, Tab::Calibration, "Calibration");
                ui.selectable_value(&mut self.tab, Tab::Teleop, "Teleop");

                ui.separator();
                let (color, label) = if self.paused {
                    (egui::Color32::YELLOW, "● PAUSED")
                } else {
                    (egui::Color32::GREEN, "● STREAMING")
                };
                ui.colored_label(color, label);
                let info = self.streamer.info();
                ui.label(format!("{} @ {:.0} Hz", info.name, info.nominal_srate));

                if let Some(error) = &self.last_error {
                    ui.separator();
                    ui.colored_label(egui::Color32::RED, error);
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| match self.tab {
            Tab::Stream => ui::show_stream_tab(ui, self),
            Tab::Calibration => ui::show_calibration_tab(ui, self),
            Tab::Teleop => ui::show_teleop_tab(ui, self),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restart_discards_pending_training() {
        let mut app = XonApp::new(AppConfig::default()).unwrap();
        app.start_calibration();
        let (tx, rx) = oneshot::channel();
        app.calibration.training = Some(rx);

        app.start_calibration();
        assert!(!app.calibration.is_training());

        // the old job finishing later must not touch the new session
        let _ = tx.send(Err(XonError::EmptyDataset));
        app.poll_training();
        assert_eq!(app.calibration.status, "Follow the green target");
        let calibrator = app.calibration.calibrator.as_ref().unwrap();
        assert_eq!(calibrator.trials_trained(), 0);
    }
}
