mod sample_buffer;
mod serial_bridge;

pub use self::sample_buffer::SampleBuffer;
pub use self::serial_bridge::{SerialBridge, SerialBridgeRx, SerialBridgeTx};
