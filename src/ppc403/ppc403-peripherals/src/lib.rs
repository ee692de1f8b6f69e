#[cfg(feature = "host-peripherals")]
pub mod host;
pub mod utils;
