use std::fmt;

use crate::spi::OutPins;

/// VIC-II register base in the C64 address space
pub const REGISTER_BASE: u16 = 0xd000;

// SPI_REG (write)
const SPI_FLASH_SELECT:  u8 = 0x01; // always high: the flash is never selected
const SPI_CLOCK:         u8 = 0x02;
const SPI_DATA_OUT:      u8 = 0x04;
const SPI_EEPROM_SELECT: u8 = 0x08; // active low
const SPI_LINE_MASK:     u8 = 0x0f;

// SPI_REG (read)
const SPI_DATA_IN:          u8 = 0x01;
const SPI_LOCK:             u8 = 0x08;
const SPI_EXTENSIONS_LOCK:  u8 = 0x10;
const SPI_PERSISTENCE_LOCK: u8 = 0x20;

/// writing these to SPI_REG makes it accept line states
pub const SPI_UNLOCK: [u8; 3] = *b"SPI";

// VIDEO_MEM_FLAGS: VIDEO_MEM_1_* address the register file instead of video RAM
pub const VMEM_FLAG_REGS_BIT: u8 = 0x20;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Register {
	/// SPI_REG: line states (write), data in and lock bits (read)
	SpiControl,
	/// VIDEO_MEM_1_LO: register file index / video RAM address low byte
	VideoMemLo,
	/// VIDEO_MEM_1_HI: video RAM address high byte
	VideoMemHi,
	/// VIDEO_MEM_1_VAL: value at VIDEO_MEM_1_HI/LO
	VideoMemValue,
	/// VIDEO_MEM_FLAGS
	VideoMemFlags,
}

impl Register {
	/// offset from `REGISTER_BASE`
	pub fn offset(self) -> usize {
		match self {
			Register::SpiControl => 0x34,
			Register::VideoMemLo => 0x39,
			Register::VideoMemHi => 0x3a,
			Register::VideoMemValue => 0x3b,
			Register::VideoMemFlags => 0x3f,
		}
	}

	pub fn address(self) -> u16 {
		REGISTER_BASE + self.offset() as u16
	}
}

impl fmt::Display for Register {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{:?} (${:04x})", self, self.address())
	}
}

/// The 8 line combinations SPI_REG accepts while talking to the EEPROM.
///
/// Named D(ata) C(lock) S(elect) with the electrical level of each line;
/// the EEPROM select is active low, so `S0` means selected. The flash select
/// bit is set in every encoding.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(u8)]
pub enum LineState {
	D1C1S1 = 0b1111,
	D1C1S0 = 0b0111,
	D1C0S1 = 0b1101,
	D1C0S0 = 0b0101,
	D0C1S1 = 0b1011,
	D0C1S0 = 0b0011,
	D0C0S1 = 0b1001,
	D0C0S0 = 0b0001,
}

impl LineState {
	pub const ALL: [LineState; 8] = [
		LineState::D1C1S1, LineState::D1C1S0, LineState::D1C0S1, LineState::D1C0S0,
		LineState::D0C1S1, LineState::D0C1S0, LineState::D0C0S1, LineState::D0C0S0,
	];

	pub fn bits(self) -> u8 {
		self as u8
	}

	/// None for anything that would select the flash or sets bits outside
	/// the line mask
	pub fn from_bits(bits: u8) -> Option<Self> {
		if 0 != bits & !SPI_LINE_MASK || 0 == bits & SPI_FLASH_SELECT {
			return None;
		}
		Self::ALL.iter().cloned().find(|state| state.bits() == bits)
	}

	pub fn pins(self) -> OutPins {
		let bits = self.bits();
		OutPins {
			chip_select: 0 == bits & SPI_EEPROM_SELECT,
			clock: 0 != bits & SPI_CLOCK,
			data: 0 != bits & SPI_DATA_OUT,
		}
	}
}

impl From<OutPins> for LineState {
	fn from(pins: OutPins) -> Self {
		match (pins.data, pins.clock, pins.chip_select) {
			(true, true, false) => LineState::D1C1S1,
			(true, true, true) => LineState::D1C1S0,
			(true, false, false) => LineState::D1C0S1,
			(true, false, true) => LineState::D1C0S0,
			(false, true, false) => LineState::D0C1S1,
			(false, true, true) => LineState::D0C1S0,
			(false, false, false) => LineState::D0C0S1,
			(false, false, true) => LineState::D0C0S0,
		}
	}
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpiStatus(pub u8);

impl SpiStatus {
	pub fn from_parts(data_in: bool, spi_lock: bool, extensions_lock: bool, persistence_lock: bool) -> Self {
		let mut bits = 0;
		if data_in { bits |= SPI_DATA_IN; }
		if spi_lock { bits |= SPI_LOCK; }
		if extensions_lock { bits |= SPI_EXTENSIONS_LOCK; }
		if persistence_lock { bits |= SPI_PERSISTENCE_LOCK; }
		SpiStatus(bits)
	}

	pub fn data_in(&self) -> bool {
		0 != self.0 & SPI_DATA_IN
	}
	pub fn is_spi_locked(&self) -> bool {
		0 != self.0 & SPI_LOCK
	}
	pub fn is_extensions_locked(&self) -> bool {
		0 != self.0 & SPI_EXTENSIONS_LOCK
	}
	pub fn is_persistence_locked(&self) -> bool {
		0 != self.0 & SPI_PERSISTENCE_LOCK
	}
}

impl fmt::Display for SpiStatus {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "0x{:02x}", self.0)
	}
}

impl fmt::Debug for SpiStatus {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "0x{:02x} (", self.0)?;
		write!(f, "{}", if self.data_in() { "[DI]" } else { "[--]" })?;
		if self.is_spi_locked() { write!(f, " [SPI LOCK]")?; }
		if self.is_extensions_locked() { write!(f, " [EXT LOCK]")?; }
		if self.is_persistence_locked() { write!(f, " [PERSIST LOCK]")?; }
		write!(f, ")")
	}
}
