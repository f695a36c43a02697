//! Layout of the persisted settings; register indices double as byte offsets
//! inside a bank.

use std::fmt;
use std::ops::{
	Deref,
	DerefMut,
};

use crate::spi::{
	MEMORY_SIZE,
	PAGE_SIZE,
	Page,
};

pub const IMAGE_SIZE: usize = MEMORY_SIZE;
pub const BANK_SIZE: usize = 256;
pub const BANKS: usize = IMAGE_SIZE / BANK_SIZE;

// shared between banks, persisted in bank 0
pub const MAGIC_0: u8 = 0x00;
pub const MAGIC_1: u8 = 0x01;
pub const MAGIC_2: u8 = 0x02;
pub const MAGIC_3: u8 = 0x03;
pub const DISPLAY_FLAGS: u8 = 0x04;
pub const EEPROM_BANK: u8 = 0x1e;
pub const CHIP_MODEL: u8 = 0x1f;

pub const MAGIC: [u8; 4] = *b"VIC2";

// per bank calibration
pub const RGB_START: u8 = 0x40;
pub const RGB_LEN: u8 = 64;
pub const BLACK_LEVEL: u8 = 0x80;
pub const BURST_AMPLITUDE: u8 = 0x81;
pub const LUMA_START: u8 = 0xa0;
pub const PHASE_START: u8 = 0xb0;
pub const AMPLITUDE_START: u8 = 0xc0;
pub const COLORS: u8 = 16;

// live only, never persisted
pub const VERSION: u8 = 0x83;
pub const VARIANT: u8 = 0x90;
pub const VARIANT_LEN: u8 = 16;

pub fn shared_registers() -> [u8; 5] {
	[MAGIC_0, MAGIC_1, MAGIC_2, MAGIC_3, DISPLAY_FLAGS]
}

/// Calibration registers loaded from the active bank: the RGB table (the
/// 4th byte of every entry is unused), black level, burst amplitude and the
/// luma/phase/amplitude triple of each color.
pub fn calibration_registers() -> Vec<u8> {
	let mut regs = Vec::new();
	regs.extend((0..RGB_LEN).filter(|c| c % 4 != 3).map(|c| RGB_START + c));
	regs.push(BLACK_LEVEL);
	regs.push(BURST_AMPLITUDE);
	for c in 0..COLORS {
		regs.push(LUMA_START + c);
		regs.push(PHASE_START + c);
		regs.push(AMPLITUDE_START + c);
	}
	regs
}

/// addresses that differ between otherwise identical devices
pub fn is_device_specific(address: usize) -> bool {
	address == CHIP_MODEL as usize || address == EEPROM_BANK as usize
}

#[derive(Clone, PartialEq, Eq)]
pub struct DeviceImage(pub [u8; IMAGE_SIZE]);

impl DeviceImage {
	pub fn erased() -> Self {
		DeviceImage([0xff; IMAGE_SIZE])
	}

	pub fn from_slice(data: &[u8]) -> crate::AResult<Self> {
		ensure!(data.len() == IMAGE_SIZE, "image has {} bytes, expected {}", data.len(), IMAGE_SIZE);
		let mut image = Self::erased();
		image.0.copy_from_slice(data);
		Ok(image)
	}

	pub fn offset(bank: usize, register: u8) -> usize {
		assert!(bank < BANKS);
		BANK_SIZE * bank + register as usize
	}

	pub fn get(&self, bank: usize, register: u8) -> u8 {
		self.0[Self::offset(bank, register)]
	}

	pub fn set(&mut self, bank: usize, register: u8, value: u8) {
		self.0[Self::offset(bank, register)] = value;
	}

	pub fn page(&self, address: usize) -> Page {
		let mut page = [0u8; PAGE_SIZE];
		page.copy_from_slice(&self.0[address..address + PAGE_SIZE]);
		page
	}

	pub fn set_page(&mut self, address: usize, page: &Page) {
		self.0[address..address + PAGE_SIZE].copy_from_slice(page);
	}

	/// page aligned addresses
	pub fn page_addresses() -> impl Iterator<Item = u16> {
		(0..IMAGE_SIZE as u16).step_by(PAGE_SIZE)
	}
}

impl Deref for DeviceImage {
	type Target = [u8];

	fn deref(&self) -> &[u8] {
		&self.0
	}
}

impl DerefMut for DeviceImage {
	fn deref_mut(&mut self) -> &mut [u8] {
		&mut self.0
	}
}

impl fmt::Debug for DeviceImage {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		for (i, chunk) in self.0.chunks(16).enumerate() {
			write!(f, "{:04x}:", i * 16)?;
			for b in chunk {
				write!(f, " {:02x}", b)?;
			}
			writeln!(f)?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn calibration_register_set() {
		let regs = calibration_registers();
		assert_eq!(regs.len(), 48 + 2 + 48);
		assert!(!regs.contains(&(RGB_START + 3)));
		assert!(regs.contains(&(RGB_START + 62)));
		assert!(!regs.contains(&(RGB_START + 63)));
		assert!(regs.contains(&(AMPLITUDE_START + 15)));
	}

	#[test]
	fn bank_offsets() {
		assert_eq!(DeviceImage::offset(0, CHIP_MODEL), 0x1f);
		assert_eq!(DeviceImage::offset(2, LUMA_START), 0x2a0);
		let mut image = DeviceImage::erased();
		image.set(3, BLACK_LEVEL, 0x12);
		assert_eq!(image[0x380], 0x12);
		assert_eq!(image.get(3, BLACK_LEVEL), 0x12);
		assert_eq!(DeviceImage::page_addresses().count(), 32);
		assert_eq!(DeviceImage::page_addresses().last(), Some(992));
	}

	#[test]
	fn from_slice_checks_length() {
		assert!(DeviceImage::from_slice(&[0u8; 1023]).is_err());
		assert_eq!(DeviceImage::from_slice(&[0u8; 1024]).unwrap()[1023], 0);
	}
}
