use log::trace;

/// Big-endian memory primitives supplied by the outer CPU's memory system.
///
/// Out-of-range addresses are the implementor's concern; the core issues the
/// accesses the emulated hardware would and never checks a result.
pub trait Bus {
    fn read8(&mut self, address: u32) -> u8;
    fn write8(&mut self, address: u32, value: u8);

    fn read16(&mut self, address: u32) -> u16 {
        (self.read8(address) as u16) << 8 | self.read8(address.wrapping_add(1)) as u16
    }

    fn write16(&mut self, address: u32, value: u16) {
        self.write8(address, (value >> 8) as u8);
        self.write8(address.wrapping_add(1), value as u8);
    }

    fn read32(&mut self, address: u32) -> u32 {
        (self.read16(address) as u32) << 16 | self.read16(address.wrapping_add(2)) as u32
    }

    fn write32(&mut self, address: u32, value: u32) {
        self.write16(address, (value >> 16) as u16);
        self.write16(address.wrapping_add(2), value as u16);
    }

    fn read64(&mut self, address: u32) -> u64 {
        (self.read32(address) as u64) << 32 | self.read32(address.wrapping_add(4)) as u64
    }

    fn write64(&mut self, address: u32, value: u64) {
        self.write32(address, (value >> 32) as u32);
        self.write32(address.wrapping_add(4), value as u32);
    }
}

/// Contiguous RAM starting at `base`; accesses outside it read 0 and drop writes
pub struct FlatMemory {
    base: u32,
    data: Vec<u8>,
}

impl FlatMemory {
    pub fn new(base: u32, size: usize) -> Self {
        Self {
            base,
            data: vec![0; size],
        }
    }

    /// Copy `image` into memory at `address`, clipped to the mapped range
    pub fn load(&mut self, address: u32, image: &[u8]) {
        for (i, byte) in image.iter().enumerate() {
            self.write8(address.wrapping_add(i as u32), *byte);
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    fn offset(&self, address: u32) -> Option<usize> {
        let offset = address.wrapping_sub(self.base) as usize;
        if offset < self.data.len() {
            Some(offset)
        } else {
            None
        }
    }
}

impl Bus for FlatMemory {
    fn read8(&mut self, address: u32) -> u8 {
        match self.offset(address) {
            Some(offset) => self.data[offset],
            None => {
                trace!("Unmapped read at 0x{:08X}", address);
                0
            }
        }
    }

    fn write8(&mut self, address: u32, value: u8) {
        match self.offset(address) {
            Some(offset) => self.data[offset] = value,
            None => trace!("Unmapped write at 0x{:08X}", address),
        }
    }
}
