/// Sink for bytes leaving the serial port
pub trait SerialTx {
    /// Called for every byte written to the transmit buffer
    fn transmit(&mut self, data: u8);

    /// Called with the whole block of a buffered DMA transmit
    fn transmit_block(&mut self, data: &[u8]) {
        for byte in data {
            self.transmit(*byte);
        }
    }
}

/// Source for blocks pulled into memory by a serial receive DMA
pub trait SerialRx {
    /// Fill `buf` completely with the next received bytes
    fn receive_block(&mut self, buf: &mut [u8]);
}

/// Board-side endpoint of a buffered memory-to-peripheral DMA channel
pub trait DmaEndpoint {
    fn write_block(&mut self, data: &[u8]);
}

/// Board-side source feeding a peripheral-to-memory DMA channel, e.g. a
/// sample buffer behind the serial receiver
pub trait DmaSource {
    /// Fill `buf` completely with the next bytes of the channel
    fn read_block(&mut self, buf: &mut [u8]);
}

/// Host hooks registered on the core. Not part of saved state.
#[derive(Default)]
pub struct Peripherals {
    pub serial_tx: Option<Box<dyn SerialTx>>,
    pub serial_rx: Option<Box<dyn SerialRx>>,
    pub dma_sources: [Option<Box<dyn DmaSource>>; crate::constants::DMA_CHANNELS],
    pub dma_endpoints: [Option<Box<dyn DmaEndpoint>>; crate::constants::DMA_CHANNELS],
}
