//! Callback-based delivery of host-facing events
//!
//! The map and scene layers report user interaction and heading changes
//! through an [`EventDispatcher`]; the host bridge registers callbacks and
//! forwards the serialized events to its UI.

use crate::core::Coordinate;
use serde::Serialize;
use std::collections::HashMap;

/// Callback function type for host events
pub type EventCallback = Box<dyn Fn(&HostEvent) + Send>;

/// Events emitted towards the host application
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum HostEvent {
    /// The user tapped a location on the map
    #[serde(rename = "mapSingleTap")]
    SingleTapLocation { latitude: f64, longitude: f64 },
    /// The observer's heading changed enough to matter
    #[serde(rename = "azimuth")]
    AzimuthChanged { azimuth: f64 },
    /// A new device location fix arrived
    #[serde(rename = "locationChanged")]
    LocationChanged { location: Coordinate },
}

impl HostEvent {
    /// Event name as seen by the host bridge
    pub fn name(&self) -> &'static str {
        match self {
            HostEvent::SingleTapLocation { .. } => "mapSingleTap",
            HostEvent::AzimuthChanged { .. } => "azimuth",
            HostEvent::LocationChanged { .. } => "locationChanged",
        }
    }

    /// JSON payload for the host bridge
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Callback registration handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackHandle(u32);

impl CallbackHandle {
    pub fn id(&self) -> u32 {
        self.0
    }
}

/// Fan-out of host events to registered callbacks
#[derive(Default)]
pub struct EventDispatcher {
    callback_counter: u32,
    callbacks: HashMap<CallbackHandle, EventCallback>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an event callback
    pub fn register(&mut self, callback: EventCallback) -> CallbackHandle {
        self.callback_counter += 1;
        let handle = CallbackHandle(self.callback_counter);
        self.callbacks.insert(handle, callback);
        handle
    }

    /// Unregister a callback, returning whether it was registered
    pub fn unregister(&mut self, handle: CallbackHandle) -> bool {
        self.callbacks.remove(&handle).is_some()
    }

    pub fn dispatch(&self, event: &HostEvent) {
        log::trace!("dispatching {} to {} callbacks", event.name(), self.callbacks.len());
        for callback in self.callbacks.values() {
            callback(event);
        }
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_dispatch_reaches_every_callback() {
        let mut dispatcher = EventDispatcher::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..2 {
            let sink = Arc::clone(&received);
            dispatcher.register(Box::new(move |event| sink.lock().unwrap().push(event.clone())));
        }

        dispatcher.dispatch(&HostEvent::AzimuthChanged { azimuth: 12.5 });
        assert_eq!(received.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_unregister_callback() {
        let mut dispatcher = EventDispatcher::new();
        let handle = dispatcher.register(Box::new(|_| {}));
        let other = dispatcher.register(Box::new(|_| {}));

        assert_ne!(handle, other);
        assert!(dispatcher.unregister(handle));
        assert!(!dispatcher.unregister(handle));
        assert_eq!(dispatcher.callback_count(), 1);
    }

    #[test]
    fn test_event_serialization() {
        let event = HostEvent::SingleTapLocation {
            latitude: 31.5,
            longitude: 35.25,
        };
        let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();

        assert_eq!(json["event"], "mapSingleTap");
        assert_eq!(json["latitude"], 31.5);
        assert_eq!(json["longitude"], 35.25);
        assert_eq!(event.name(), "mapSingleTap");
    }
}
