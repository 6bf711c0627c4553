//! Tab contents

use crate::app::XonApp;
use egui::{Color32, Pos2, Rect, Sense, Stroke, Vec2};
use egui_plot::{Bar, BarChart, Legend, Line, Plot, PlotPoints};
use xon_processing::PlotFrame;
use xon_simulation::IntentPattern;

fn channel_color(channel: usize) -> Color32 {
    match channel % 4 {
        0 => Color32::from_rgb(255, 100, 100),
        1 => Color32::from_rgb(100, 255, 100),
        2 => Color32::from_rgb(100, 100, 255),
        _ => Color32::from_rgb(255, 255, 100),
    }
}

/// Stacked filtered traces, newest sample at t = 0
pub fn signal_plot(ui: &mut egui::Ui, frame: &PlotFrame) {
    Plot::new("eeg_plot")
        .legend(Legend::default())
        .height(380.0)
        .allow_zoom(true)
        .allow_drag(true)
        .show(ui, |plot_ui| {
            for channel in 0..frame.traces.len() {
                let points = PlotPoints::from(frame.points(channel));
                plot_ui.line(
                    Line::new(points)
                        .color(channel_color(channel))
                        .name(format!("Channel {}", channel + 1)),
                );
            }
        });
}

pub fn feature_bars(ui: &mut egui::Ui, features: &[f32]) {
    let bars = features
        .iter()
        .enumerate()
        .map(|(i, &f)| Bar::new(i as f64 + 1.0, f as f64).fill(channel_color(i)))
        .collect();

    Plot::new("feature_bars")
        .height(160.0)
        .include_y(0.0)
        .include_y(2.0)
        .allow_drag(false)
        .allow_zoom(false)
        .show(ui, |plot_ui| plot_ui.bar_chart(BarChart::new(bars).name("current / baseline")));
}

pub fn show_stream_tab(ui: &mut egui::Ui, app: &mut XonApp) {
    ui.horizontal(|ui| {
        if app.paused {
            if ui.button("▶ Resume").clicked() {
                app.set_paused(false);
            }
        } else if ui.button("⏸ Pause").clicked() {
            app.set_paused(true);
        }

        ui.separator();
        ui.label("Simulated intent:");
        let current = app.pattern.description();
        let mut chosen: Option<IntentPattern> = None;
        egui::ComboBox::from_id_source("intent_pattern")
            .selected_text(current)
            .show_ui(ui, |ui| {
                for (name, pattern) in IntentPattern::presets() {
                    if ui.selectable_label(app.pattern == pattern, name).clicked() {
                        chosen = Some(pattern);
                    }
                }
            });
        if let Some(pattern) = chosen {
            app.set_pattern(pattern);
        }
    });

    let metrics = app.streamer().metrics().clone();
    ui.horizontal(|ui| {
        ui.label(format!("Steps: {}", metrics.steps));
        ui.separator();
        ui.label(format!("Samples: {}", metrics.samples_appended));
        ui.separator();
        ui.label(format!("Hit rate: {:.0}%", metrics.hit_rate() * 100.0));
        ui.separator();
        ui.label(format!("Skipped chunks: {}", metrics.chunks_skipped));
        ui.separator();
        ui.label(format!("Step: {}μs", metrics.last_step_us));
    });

    ui.separator();
    signal_plot(ui, &app.plot);
    ui.label("Normalized variability");
    feature_bars(ui, &app.features);
}

/// Map `[-1, 1]^2` (y up) onto a square inside `rect`
fn to_screen(rect: Rect, point: [f32; 2]) -> Pos2 {
    let half = rect.width().min(rect.height()) / 2.0;
    rect.center() + Vec2::new(point[0] * half, -point[1] * half)
}

pub fn show_calibration_tab(ui: &mut egui::Ui, app: &mut XonApp) {
    ui.horizontal(|ui| {
        if app.calibration.running {
            if ui.button("⏹ Stop").clicked() {
                app.stop_calibration();
            }
        } else if ui.button("▶ Start calibration").clicked() {
            app.start_calibration();
        }
        ui.checkbox(
            &mut app.calibration.subject_follows_target,
            "Simulated wearer follows the target",
        );
    });

    ui.label(&app.calibration.status);
    if let Some(path) = &app.calibration.path {
        let trial = format!("Trial {}", path.trials_started());
        ui.add(egui::ProgressBar::new(path.progress()).text(trial));
    }
    if let Some(calibrator) = &app.calibration.calibrator {
        ui.label(format!(
            "Session '{}': {} pairs collected, {} trials trained",
            calibrator.config().name,
            calibrator.collected(),
            calibrator.trials_trained()
        ));
    }
    if let Some(report) = &app.calibration.last_report {
        ui.label(format!("Snapshot: {} ({} ms)", report.snapshot.display(), report.elapsed_ms));
    }

    let size = ui.available_size().min_elem().max(100.0);
    let (response, painter) = ui.allocate_painter(Vec2::splat(size), Sense::hover());
    let rect = response.rect;
    painter.rect_filled(rect, 4.0, Color32::from_gray(25));
    painter.rect_stroke(
        Rect::from_center_size(rect.center(), Vec2::splat(size)),
        0.0,
        Stroke::new(1.0, Color32::from_gray(80)),
    );

    if app.calibration.calibrator.is_some() {
        painter.circle_filled(to_screen(rect, app.calibration.target), 12.0, Color32::GREEN);
        painter.circle_stroke(
            to_screen(rect, app.calibration.prediction),
            10.0,
            Stroke::new(3.0, Color32::RED),
        );
    }
}

pub fn show_teleop_tab(ui: &mut egui::Ui, app: &mut XonApp) {
    ui.horizontal(|ui| {
        if app.teleop.session.is_some() {
            if ui.button("⏹ Disconnect").clicked() {
                app.stop_teleop();
            }
        } else if ui.button("▶ Connect").clicked() {
            app.start_teleop();
        }
        ui.label(format!("Vehicle: {}", app.config.teleop.address));
    });

    ui.horizontal(|ui| {
        ui.label("Hold the arrow keys to drive.");
        ui.separator();
        ui.label(format!("Key: {:?}", app.teleop.last_key));
        ui.separator();
        match app.teleop.view.distance() {
            Some(metres) => ui.label(format!("Distance: {:.2} m", metres)),
            None => ui.label("Distance: -"),
        };
    });

    if let Some(texture) = &app.teleop.texture {
        let sized = egui::load::SizedTexture::from_handle(texture);
        ui.add(egui::Image::new(sized).shrink_to_fit());
    } else {
        ui.label("No camera frame yet");
    }
}
