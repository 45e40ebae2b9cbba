// Error modeling shared by the bridge, the relay and the engine.
pub mod error;
