use std::fmt;

use crate::spi::DeviceOperations;

use super::eeprom::read_image;
use super::image::GOLDEN;
use super::layout::*;

/// The register file the chip loaded from the EEPROM at boot.
pub trait LiveRegisters {
	/// route the video memory port to the register file
	fn select_register_space(&mut self);

	/// requires `select_register_space`
	fn live_register(&mut self, index: u8) -> u8;
}

impl<'a, L: ?Sized + LiveRegisters> LiveRegisters for &'a mut L {
	fn select_register_space(&mut self) {
		L::select_register_space(*self)
	}
	fn live_register(&mut self, index: u8) -> u8 {
		L::live_register(*self, index)
	}
}

/// Live register differs from the byte persisted for it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RegisterMismatch {
	pub bank: usize,
	pub register: u8,
	pub persisted: u8,
	pub live: u8,
}

impl fmt::Display for RegisterMismatch {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "REG READ {:02x} != {:02x}, got {:02x} bank {}", self.register, self.persisted, self.live, self.bank)
	}
}

/// Persisted byte differs from the golden image.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ImageMismatch {
	pub address: usize,
	pub actual: u8,
	pub expected: u8,
}

impl fmt::Display for ImageMismatch {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "EEPROM {:02x} != EXPECTED INIT {:02x} @ {:04x}", self.actual, self.expected, self.address)
	}
}

#[derive(Clone, Debug)]
pub struct Report {
	/// raw value of the live bank selector
	pub bank_selector: u8,
	/// None if the selector doesn't name a bank
	pub active_bank: Option<usize>,
	pub registers: Vec<RegisterMismatch>,
	pub image: Vec<ImageMismatch>,
}

impl Report {
	pub fn is_clean(&self) -> bool {
		self.active_bank.is_some() && self.registers.is_empty() && self.image.is_empty()
	}

	pub fn mismatches(&self) -> usize {
		self.registers.len() + self.image.len()
	}
}

/// Compare one live register against the byte persisted for it in `bank`.
pub fn check<L: LiveRegisters + ?Sized>(live: &mut L, snapshot: &DeviceImage, bank: usize, register: u8) -> Option<RegisterMismatch> {
	let value = live.live_register(register);
	let persisted = snapshot.get(bank, register);
	if value == persisted {
		return None;
	}
	let mismatch = RegisterMismatch { bank, register, persisted, live: value };
	warn!("{}", mismatch);
	Some(mismatch)
}

/// Shared registers against bank 0, then the calibration of the bank the
/// chip booted from.
///
/// Returns the raw bank selector, the bank it names (if any) and all
/// mismatches.
pub fn check_registers<L: LiveRegisters + ?Sized>(live: &mut L, snapshot: &DeviceImage) -> (u8, Option<usize>, Vec<RegisterMismatch>) {
	live.select_register_space();

	let mut mismatches: Vec<RegisterMismatch> = shared_registers().iter()
		.filter_map(|reg| check(&mut *live, snapshot, 0, *reg))
		.collect();

	let selector = live.live_register(EEPROM_BANK);
	let bank = selector as usize;
	if bank >= BANKS {
		warn!("active bank selector 0x{:02x} out of range, skipping calibration registers", selector);
		return (selector, None, mismatches);
	}
	debug!("checking calibration registers of bank {}", bank);

	mismatches.extend(calibration_registers().into_iter().filter_map(|reg| check(&mut *live, snapshot, bank, reg)));
	(selector, Some(bank), mismatches)
}

/// Every byte except the device specific ones.
pub fn compare_images(actual: &DeviceImage, expected: &DeviceImage) -> Vec<ImageMismatch> {
	actual.iter().zip(expected.iter()).enumerate()
		.filter(|(address, _)| !is_device_specific(*address))
		.filter(|(_, (a, e))| a != e)
		.map(|(address, (&actual, &expected))| {
			let mismatch = ImageMismatch { address, actual, expected };
			warn!("{}", mismatch);
			mismatch
		})
		.collect()
}

/// Snapshot the EEPROM, check the registers the chip loaded from it, then
/// diff the snapshot against the golden image. Mismatches never abort.
pub fn verify<D: DeviceOperations + LiveRegisters + ?Sized>(dev: &mut D) -> crate::AResult<Report> {
	info!("Checking...");
	let snapshot = read_image(dev)?;
	let (bank_selector, active_bank, registers) = check_registers(dev, &snapshot);
	let image = compare_images(&snapshot, &GOLDEN);

	let report = Report { bank_selector, active_bank, registers, image };
	if report.is_clean() {
		info!("no mismatches");
	} else {
		info!("{} mismatches", report.mismatches());
	}
	Ok(report)
}
