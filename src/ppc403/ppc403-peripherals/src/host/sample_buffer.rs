use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::warn;

use ppc403_core::periph::DmaEndpoint;

/// DMA endpoint that hands each transferred block to a consumer thread,
/// e.g. a sound channel fed by buffered DMA. When the consumer falls
/// `depth` blocks behind, new blocks are dropped.
pub struct SampleBuffer {
    tx: Sender<Vec<u8>>,
}

impl SampleBuffer {
    pub fn new(depth: usize) -> (Self, Receiver<Vec<u8>>) {
        let (tx, rx) = bounded(depth);
        (SampleBuffer { tx }, rx)
    }
}

impl DmaEndpoint for SampleBuffer {
    fn write_block(&mut self, data: &[u8]) {
        match self.tx.try_send(data.to_vec()) {
            Ok(()) => {}
            Err(TrySendError::Full(block)) => {
                warn!("Sample buffer full, dropping {} bytes", block.len())
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}
