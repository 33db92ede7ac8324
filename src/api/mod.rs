//! Interfaces shared with the host application
//!
//! Events flowing out to the host UI and the device pose flowing in from the
//! sensor layer.

pub mod events;
pub mod pose;

pub use events::{CallbackHandle, EventCallback, EventDispatcher, HostEvent};
pub use pose::{DevicePoseProvider, PoseSample, SharedPose, StaticPose};
