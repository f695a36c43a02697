use crate::kawari::{
	calibration_registers,
	shared_registers,
	DeviceImage,
	LineState,
	Register,
	RegisterAccess,
	SpiStatus,
	BANKS,
	CHIP_MODEL,
	EEPROM_BANK,
	SPI_UNLOCK,
	VARIANT,
	VARIANT_LEN,
	VERSION,
	VMEM_FLAG_REGS_BIT,
};

use super::{
	SimConfig,
	SimEeprom,
};

pub const SIM_VERSION: u8 = 0x12;
pub const SIM_VARIANT: &[u8] = b"SIM";

/// Register window of a Kawari with the EEPROM attached to SPI_REG.
///
/// Line writes are only forwarded after the unlock sequence; every one of
/// them is checked against the interrupt mask and the flash select line.
pub struct KawariSim {
	eeprom: SimEeprom,
	registers: [u8; 256],
	video_ram: Vec<u8>,

	unlock_progress: usize,
	spi_unlocked: bool,

	video_mem_lo: u8,
	video_mem_hi: u8,
	video_mem_flags: u8,

	mask_depth: usize,
	line_writes: usize,
	unmasked_line_writes: usize,
	flash_select_violations: usize,
}

impl KawariSim {
	/// Boots from the current EEPROM contents.
	pub fn new(eeprom: SimEeprom) -> Self {
		let mut sim = KawariSim {
			eeprom,
			registers: [0u8; 256],
			video_ram: vec![0u8; 0x1_0000],
			unlock_progress: 0,
			spi_unlocked: false,
			video_mem_lo: 0,
			video_mem_hi: 0,
			video_mem_flags: 0,
			mask_depth: 0,
			line_writes: 0,
			unmasked_line_writes: 0,
			flash_select_violations: 0,
		};
		sim.boot();
		sim
	}

	pub fn with_image(image: &DeviceImage) -> Self {
		Self::new(SimEeprom::with_memory(SimConfig::default(), &image[..]))
	}

	/// Reload the register file from the EEPROM, the way the chip does at
	/// power up. SPI_REG is locked again.
	pub fn boot(&mut self) {
		let mut image = DeviceImage::erased();
		image.copy_from_slice(self.eeprom.memory());

		self.registers = [0u8; 256];
		for reg in shared_registers().iter().cloned().chain(Some(CHIP_MODEL)) {
			self.registers[reg as usize] = image.get(0, reg);
		}
		let bank = image.get(0, EEPROM_BANK) as usize % BANKS;
		self.registers[EEPROM_BANK as usize] = bank as u8;
		for reg in calibration_registers() {
			self.registers[reg as usize] = image.get(bank, reg);
		}

		self.registers[VERSION as usize] = SIM_VERSION;
		for i in 0..VARIANT_LEN as usize {
			self.registers[VARIANT as usize + i] = SIM_VARIANT.get(i).cloned().unwrap_or(0);
		}

		self.unlock_progress = 0;
		self.spi_unlocked = false;
		debug!("sim: booted from bank {}", bank);
	}

	pub fn eeprom(&self) -> &SimEeprom {
		&self.eeprom
	}

	pub fn eeprom_mut(&mut self) -> &mut SimEeprom {
		&mut self.eeprom
	}

	pub fn register(&self, index: u8) -> u8 {
		self.registers[index as usize]
	}

	/// Overwrite a live register without touching the EEPROM.
	pub fn set_live_register(&mut self, index: u8, value: u8) {
		self.registers[index as usize] = value;
	}

	pub fn is_spi_unlocked(&self) -> bool {
		self.spi_unlocked
	}

	pub fn is_masked(&self) -> bool {
		self.mask_depth > 0
	}

	/// SPI_REG writes after the unlock sequence
	pub fn line_writes(&self) -> usize {
		self.line_writes
	}

	pub fn unmasked_line_writes(&self) -> usize {
		self.unmasked_line_writes
	}

	/// line writes that would have selected the flash (or weren't a line
	/// state at all); they never reach the EEPROM
	pub fn flash_select_violations(&self) -> usize {
		self.flash_select_violations
	}

	fn spi_write(&mut self, value: u8) {
		if !self.spi_unlocked {
			if value == SPI_UNLOCK[self.unlock_progress] {
				self.unlock_progress += 1;
			} else if value == SPI_UNLOCK[0] {
				self.unlock_progress = 1;
			} else {
				self.unlock_progress = 0;
			}
			if self.unlock_progress == SPI_UNLOCK.len() {
				debug!("sim: SPI_REG unlocked");
				self.spi_unlocked = true;
			}
			return;
		}

		self.line_writes += 1;
		if !self.is_masked() {
			self.unmasked_line_writes += 1;
		}
		match LineState::from_bits(value) {
			Some(state) => self.eeprom.drive(state.pins()),
			None => {
				debug!("sim: SPI_REG write 0x{:02x} is not an EEPROM line state", value);
				self.flash_select_violations += 1;
			},
		}
	}

	fn video_mem_index(&self) -> usize {
		(self.video_mem_hi as usize) << 8 | self.video_mem_lo as usize
	}
}

impl RegisterAccess for KawariSim {
	fn read(&mut self, register: Register) -> u8 {
		match register {
			Register::SpiControl => SpiStatus::from_parts(self.eeprom.data_out(), false, false, false).0,
			Register::VideoMemLo => self.video_mem_lo,
			Register::VideoMemHi => self.video_mem_hi,
			Register::VideoMemFlags => self.video_mem_flags,
			Register::VideoMemValue => {
				if 0 != self.video_mem_flags & VMEM_FLAG_REGS_BIT {
					self.registers[self.video_mem_lo as usize]
				} else {
					self.video_ram[self.video_mem_index()]
				}
			},
		}
	}

	fn write(&mut self, register: Register, value: u8) {
		match register {
			Register::SpiControl => self.spi_write(value),
			Register::VideoMemLo => self.video_mem_lo = value,
			Register::VideoMemHi => self.video_mem_hi = value,
			Register::VideoMemFlags => self.video_mem_flags = value,
			Register::VideoMemValue => {
				if 0 != self.video_mem_flags & VMEM_FLAG_REGS_BIT {
					self.registers[self.video_mem_lo as usize] = value;
				} else {
					let index = self.video_mem_index();
					self.video_ram[index] = value;
				}
			},
		}
	}

	fn mask_interrupts(&mut self) {
		self.mask_depth += 1;
	}

	fn unmask_interrupts(&mut self) {
		self.mask_depth = self.mask_depth.saturating_sub(1);
	}
}
