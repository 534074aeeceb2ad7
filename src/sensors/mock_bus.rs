//! Register-map I2C double for the rangefinder driver tests.

use std::collections::{HashMap, HashSet, VecDeque};

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, Operation, SevenBitAddress};

pub struct MockBus {
    /// Register index width in bytes (2 for VL53L1X, 1 for VL53L0X).
    index_bytes: usize,
    pub regs: HashMap<u16, u8>,
    /// Status registers: writes are recorded but do not change the value.
    pub read_only: HashSet<u16>,
    /// Values returned by successive reads before falling back to `regs`.
    pub scripted: HashMap<u16, VecDeque<u8>>,
    /// Every (index, payload) written, in order.
    pub writes: Vec<(u16, Vec<u8>)>,
    pub fail: bool,
    /// Fail any transaction that addresses this register.
    pub fail_on: Option<u16>,
    pub last_address: Option<u8>,
}

impl MockBus {
    pub fn new(index_bytes: usize) -> Self {
        Self {
            index_bytes,
            regs: HashMap::new(),
            read_only: HashSet::new(),
            scripted: HashMap::new(),
            writes: Vec::new(),
            fail: false,
            fail_on: None,
            last_address: None,
        }
    }

    pub fn set_u8(&mut self, reg: u16, v: u8) {
        self.regs.insert(reg, v);
    }

    pub fn set_u16(&mut self, reg: u16, v: u16) {
        let [hi, lo] = v.to_be_bytes();
        self.regs.insert(reg, hi);
        self.regs.insert(reg + 1, lo);
    }

    /// Pin a status register to `v` regardless of what the driver writes.
    pub fn pin_u8(&mut self, reg: u16, v: u8) {
        self.regs.insert(reg, v);
        self.read_only.insert(reg);
    }

    pub fn script(&mut self, reg: u16, values: &[u8]) {
        self.scripted.entry(reg).or_default().extend(values.iter().copied());
    }

    pub fn wrote(&self, reg: u16, payload: &[u8]) -> bool {
        self.writes.iter().any(|(r, p)| *r == reg && p == payload)
    }
}

impl ErrorType for MockBus {
    type Error = ErrorKind;
}

impl I2c<SevenBitAddress> for MockBus {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.fail {
            return Err(ErrorKind::Other);
        }
        self.last_address = Some(address);
        let mut pointer = 0u16;
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    let (index, payload) = bytes.split_at(self.index_bytes.min(bytes.len()));
                    pointer = index.iter().fold(0u16, |acc, b| (acc << 8) | u16::from(*b));
                    if self.fail_on == Some(pointer) {
                        return Err(ErrorKind::Other);
                    }
                    if !payload.is_empty() {
                        for (i, b) in payload.iter().enumerate() {
                            let reg = pointer + i as u16;
                            if !self.read_only.contains(&reg) {
                                self.regs.insert(reg, *b);
                            }
                        }
                        self.writes.push((pointer, payload.to_vec()));
                    }
                }
                Operation::Read(buf) => {
                    for (i, b) in buf.iter_mut().enumerate() {
                        let reg = pointer + i as u16;
                        let next = self.scripted.get_mut(&reg).and_then(VecDeque::pop_front);
                        *b = next.or_else(|| self.regs.get(&reg).copied()).unwrap_or(0);
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct CountingDelay {
    pub total_ns: u64,
}

impl DelayNs for CountingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}
