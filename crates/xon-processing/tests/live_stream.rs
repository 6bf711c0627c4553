use std::time::Duration;
use xon_core::XonError;
use xon_processing::{PipelineConfig, Streamer};
use xon_simulation::{
    spawn_outlet, EegConfig, IntentPattern, OutletCommand, OutletConfig, SimulatedRegistry,
};

fn outlet_config(name: &str) -> OutletConfig {
    OutletConfig {
        stream_name: name.to_string(),
        eeg: EegConfig {
            seed: Some(21),
            pattern: IntentPattern::Rest,
            ..EegConfig::default()
        },
        ..OutletConfig::default()
    }
}

#[test]
fn streams_features_from_simulated_headset() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut registry = SimulatedRegistry::new();
    registry.register(spawn_outlet(runtime.handle(), outlet_config("X.on-live")).unwrap());

    let mut config = PipelineConfig::for_stream("X.on-live");
    config.stream.window_seconds = 1.0;
    let mut streamer = Streamer::connect(&registry, config).unwrap();
    assert_eq!(streamer.n_features(), 8);

    let mut features = Vec::new();
    for _ in 0..40 {
        features = streamer.step().unwrap();
        std::thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(features.len(), 8);
    assert!(features.iter().all(|f| f.is_finite() && *f > 0.0));
    assert!(streamer.metrics().data_pulls > 0);
    assert_eq!(streamer.window().len(), streamer.window().capacity());

    let times: Vec<f64> = streamer.window().times().iter().copied().collect();
    let dt = 1.0 / 250.0;
    assert!(times.windows(2).all(|w| ((w[1] - w[0]) - dt).abs() < 1e-9));
}

#[test]
fn stream_loop_plots_periodically() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut registry = SimulatedRegistry::new();
    registry.register(spawn_outlet(runtime.handle(), outlet_config("X.on-plot")).unwrap());

    let config = PipelineConfig::for_stream("X.on-plot");
    let mut streamer = Streamer::connect(&registry, config).unwrap();
    let mut plots = 0;
    streamer
        .stream(30, &mut [], |frame| {
            assert_eq!(frame.traces.len(), 8);
            plots += 1;
        })
        .unwrap();

    // refresh every int(0.2 / (12 / 250)) = 4 steps
    assert_eq!(plots, 8);
}

#[test]
fn paused_outlet_leaves_window_unchanged() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut registry = SimulatedRegistry::new();
    registry.register(spawn_outlet(runtime.handle(), outlet_config("X.on-pause")).unwrap());

    let config = PipelineConfig::for_stream("X.on-pause");
    let mut streamer = Streamer::connect(&registry, config).unwrap();
    registry.outlet("X.on-pause").unwrap().send(OutletCommand::Pause).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    for _ in 0..20 {
        streamer.pull_data().unwrap();
    }

    let last = streamer.window().last_timestamp();
    streamer.pull_data().unwrap();
    assert_eq!(streamer.window().last_timestamp(), last);
}

#[test]
fn unknown_stream_is_not_found() {
    let registry = SimulatedRegistry::new();
    let mut config = PipelineConfig::for_stream("X.on-missing");
    config.stream.resolve_attempts = 3;
    let err = Streamer::connect(&registry, config).err().unwrap();
    assert!(matches!(err, XonError::StreamNotFound { attempts: 3, .. }));
}
