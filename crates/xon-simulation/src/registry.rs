//! In-process stream discovery over simulated outlets

use crate::real_time_stream::OutletHandle;
use xon_core::{StreamInfo, StreamInlet, StreamResolver, XonError, XonResult};

/// Discovery backend that knows every outlet registered with it.
///
/// Inlets opened on the same outlet share its queue, so two readers split
/// the samples between them rather than each seeing all of them.
#[derive(Default)]
pub struct SimulatedRegistry {
    outlets: Vec<OutletHandle>,
}

impl SimulatedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an outlet; the registry keeps it alive
    pub fn register(&mut self, outlet: OutletHandle) -> &OutletHandle {
        self.outlets.push(outlet);
        &self.outlets[self.outlets.len() - 1]
    }

    /// Look up a registered outlet by stream name
    pub fn outlet(&self, name: &str) -> Option<&OutletHandle> {
        self.outlets.iter().find(|o| o.info().name == name)
    }
}

impl StreamResolver for SimulatedRegistry {
    fn resolve_by_type(&self, stream_type: &str) -> Vec<StreamInfo> {
        self.outlets
            .iter()
            .map(|o| o.info())
            .filter(|info| info.stream_type == stream_type)
            .cloned()
            .collect()
    }

    fn resolve_all(&self) -> Vec<StreamInfo> {
        self.outlets.iter().map(|o| o.info().clone()).collect()
    }

    fn open_inlet(
        &self,
        info: &StreamInfo,
        _max_buffer_secs: f64,
    ) -> XonResult<Box<dyn StreamInlet>> {
        self.outlets
            .iter()
            .find(|o| o.info().uid == info.uid)
            .map(|o| Box::new(o.inlet()) as Box<dyn StreamInlet>)
            .ok_or_else(|| XonError::StreamNotFound {
                name: info.name.clone(),
                attempts: 1,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eeg_simulator::EegConfig;
    use crate::real_time_stream::{spawn_outlet, OutletConfig};
    use xon_core::{list_streams, resolve_stream};

    #[test]
    fn test_resolve_and_open() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut registry = SimulatedRegistry::new();
        for name in ["X.on-a", "X.on-b"] {
            let config = OutletConfig {
                stream_name: name.to_string(),
                eeg: EegConfig { seed: Some(3), ..EegConfig::default() },
                ..OutletConfig::default()
            };
            registry.register(spawn_outlet(runtime.handle(), config).unwrap());
        }

        assert_eq!(list_streams(&registry).len(), 2);
        let info = resolve_stream(&registry, "X.on-b", 3).unwrap();
        let inlet = registry.open_inlet(&info, 1.0).unwrap();
        assert_eq!(inlet.info().name, "X.on-b");
        assert!(registry.outlet("X.on-a").is_some());

        let stranger = StreamInfo::new("ghost", "EEG", "none", 250.0, 8).unwrap();
        assert!(registry.open_inlet(&stranger, 1.0).is_err());
    }
}
