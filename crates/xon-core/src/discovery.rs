//! Stream discovery by name with bounded retries

use crate::error::{XonError, XonResult};
use crate::stream::{StreamInfo, StreamResolver};
use tracing::{debug, info};

/// Content type the headset publishes under
pub const EEG_STREAM_TYPE: &str = "EEG";

/// Resolve attempts before giving up; discovery sometimes misses a live
/// stream on the first few tries
pub const DEFAULT_RESOLVE_ATTEMPTS: usize = 100;

/// Find the EEG stream called `name`, retrying up to `attempts` times
pub fn resolve_stream<R: StreamResolver + ?Sized>(
    resolver: &R,
    name: &str,
    attempts: usize,
) -> XonResult<StreamInfo> {
    info!(stream = name, "looking for an EEG stream");

    for attempt in 0..attempts {
        let found = resolver
            .resolve_by_type(EEG_STREAM_TYPE)
            .into_iter()
            .find(|stream| stream.name == name);

        if let Some(stream) = found {
            info!(stream = name, attempt, "found stream");
            return Ok(stream);
        }
        debug!(stream = name, attempt, "stream not visible yet");
    }

    Err(XonError::StreamNotFound {
        name: name.to_string(),
        attempts,
    })
}

/// Enumerate every visible stream, logging each one
pub fn list_streams<R: StreamResolver + ?Sized>(resolver: &R) -> Vec<StreamInfo> {
    let streams = resolver.resolve_all();
    info!("found {} streams", streams.len());

    for stream in &streams {
        info!(
            name = %stream.name,
            stream_type = %stream.stream_type,
            source_id = %stream.source_id,
            uid = %stream.uid,
            "stream"
        );
    }

    streams
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamInlet;
    use std::cell::Cell;

    /// Resolver that only reveals its stream after a number of lookups
    struct SlowResolver {
        streams: Vec<StreamInfo>,
        visible_after: usize,
        lookups: Cell<usize>,
    }

    impl StreamResolver for SlowResolver {
        fn resolve_by_type(&self, stream_type: &str) -> Vec<StreamInfo> {
            let n = self.lookups.get();
            self.lookups.set(n + 1);
            if n < self.visible_after {
                return Vec::new();
            }
            self.streams
                .iter()
                .filter(|s| s.stream_type == stream_type)
                .cloned()
                .collect()
        }

        fn resolve_all(&self) -> Vec<StreamInfo> {
            self.streams.clone()
        }

        fn open_inlet(
            &self,
            _info: &StreamInfo,
            _max_buffer_secs: f64,
        ) -> XonResult<Box<dyn StreamInlet>> {
            Err(XonError::StreamClosed { name: "unused".to_string() })
        }
    }

    fn resolver(visible_after: usize) -> SlowResolver {
        SlowResolver {
            streams: vec![
                StreamInfo::new("aux", "Markers", "m0", 1.0, 1).unwrap(),
                StreamInfo::new("X.on-1", EEG_STREAM_TYPE, "sn-1", 250.0, 8).unwrap(),
            ],
            visible_after,
            lookups: Cell::new(0),
        }
    }

    #[test]
    fn test_resolve_retries_until_visible() {
        let resolver = resolver(3);
        let info = resolve_stream(&resolver, "X.on-1", 10).unwrap();
        assert_eq!(info.channel_count, 8);
        assert_eq!(resolver.lookups.get(), 4);
    }

    #[test]
    fn test_resolve_gives_up() {
        let resolver = resolver(50);
        let err = resolve_stream(&resolver, "X.on-1", 5).unwrap_err();
        assert_eq!(
            err,
            XonError::StreamNotFound { name: "X.on-1".to_string(), attempts: 5 }
        );
    }

    #[test]
    fn test_resolve_ignores_other_types() {
        let resolver = resolver(0);
        assert!(resolve_stream(&resolver, "aux", 3).is_err());
        assert_eq!(list_streams(&resolver).len(), 2);
    }
}
