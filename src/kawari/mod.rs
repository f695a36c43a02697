/* VIC-II Kawari: https://github.com/randyrossi/vicii-kawari */

/* The settings EEPROM hangs off three lines of SPI_REG; the register file
 * the chip loaded from it at boot is visible through the video memory port. */

use std::time::Duration;

use crate::spi::{
	DEFAULT_BUSY_POLLS,
	Hardware,
	OutPins,
	reliable_sleep,
};

mod eeprom;
mod image;
mod layout;
mod regs;
mod verify;

pub use self::eeprom::{
	decode_serial,
	encode_serial,
	erase_all,
	lock_serial,
	read_image,
	read_serial,
	set_serial,
	write_image,
	SERIAL_CAPACITY,
	SERIAL_OFFSET,
};
pub use self::image::GOLDEN;
pub use self::layout::*;
pub use self::regs::{
	LineState,
	Register,
	SpiStatus,
	REGISTER_BASE,
	SPI_UNLOCK,
	VMEM_FLAG_REGS_BIT,
};
pub use self::verify::{
	check,
	check_registers,
	compare_images,
	verify,
	ImageMismatch,
	LiveRegisters,
	RegisterMismatch,
	Report,
};

/// Byte wide access to the VIC-II register window.
pub trait RegisterAccess {
	fn read(&mut self, register: Register) -> u8;
	fn write(&mut self, register: Register, value: u8);

	/// Called around every SPI transaction; line timing must not be
	/// disturbed until the matching `unmask_interrupts`.
	fn mask_interrupts(&mut self) {}
	fn unmask_interrupts(&mut self) {}
}

impl<'a, R: ?Sized + RegisterAccess> RegisterAccess for &'a mut R {
	fn read(&mut self, register: Register) -> u8 {
		R::read(*self, register)
	}
	fn write(&mut self, register: Register, value: u8) {
		R::write(*self, register, value)
	}
	fn mask_interrupts(&mut self) {
		R::mask_interrupts(*self)
	}
	fn unmask_interrupts(&mut self) {
		R::unmask_interrupts(*self)
	}
}

trait RegisterAccessExt: RegisterAccess {
	fn spi_unlock(&mut self) {
		for b in SPI_UNLOCK.iter() {
			self.write(Register::SpiControl, *b);
		}
	}

	fn spi_write(&mut self, state: LineState) {
		self.write(Register::SpiControl, state.bits());
	}

	fn spi_status(&mut self) -> SpiStatus {
		SpiStatus(self.read(Register::SpiControl))
	}

	fn video_mem_flags(&mut self, flags: u8) {
		self.write(Register::VideoMemFlags, flags);
	}

	fn register_file_read(&mut self, index: u8) -> u8 {
		self.write(Register::VideoMemLo, index);
		self.read(Register::VideoMemValue)
	}
}
impl<R: RegisterAccess + ?Sized> RegisterAccessExt for R {}

/// Firmware version, one nibble each.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Version {
	pub major: u8,
	pub minor: u8,
}

impl Version {
	pub fn from_register(value: u8) -> Self {
		Version {
			major: value >> 4,
			minor: value & 0x0f,
		}
	}
}

impl std::fmt::Display for Version {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{}.{}", self.major, self.minor)
	}
}

/// Name of the chip model a CHIP_MODEL value selects; every value above 2
/// behaves like a 6569R1.
pub fn chip_model_name(model: u8) -> &'static str {
	match model {
		0 => "6567R8",
		1 => "6569R5",
		2 => "6567R56A",
		_ => "6569R1",
	}
}

/// SPI master on top of the Kawari register window.
pub struct Kawari<R: RegisterAccess> {
	regs: R,
	busy_poll_limit: usize,
	edge_delay: Option<Duration>,
}

impl<R: RegisterAccess> Kawari<R> {
	/// Unlocks SPI_REG; lines are only driven by transactions.
	pub fn open(mut regs: R) -> crate::AResult<Self> {
		regs.spi_unlock();
		let status = regs.spi_status();
		debug!("SPI_REG after unlock: {:?}", status);
		if status.is_spi_locked() {
			warn!("SPI lock bit set, EEPROM access might be refused");
		}

		Ok(Kawari {
			regs,
			busy_poll_limit: DEFAULT_BUSY_POLLS,
			edge_delay: None,
		})
	}

	pub fn set_busy_poll_limit(&mut self, limit: usize) {
		self.busy_poll_limit = limit;
	}

	/// Extra wait after every line change; `None` relies on register write
	/// latency alone.
	pub fn set_edge_delay(&mut self, delay: Option<Duration>) {
		self.edge_delay = delay;
	}

	pub fn registers(&mut self) -> &mut R {
		&mut self.regs
	}

	pub fn into_inner(self) -> R {
		self.regs
	}

	pub fn spi_status(&mut self) -> SpiStatus {
		self.regs.spi_status()
	}

	pub fn version(&mut self) -> Version {
		self.select_register_space();
		Version::from_register(self.regs.register_file_read(VERSION))
	}

	/// NUL terminated, at most `VARIANT_LEN` characters
	pub fn variant(&mut self) -> String {
		self.select_register_space();
		let mut variant = String::new();
		for i in 0..VARIANT_LEN {
			let c = self.regs.register_file_read(VARIANT + i);
			if 0 == c {
				break;
			}
			variant.push(c as char);
		}
		variant
	}

	pub fn chip_model(&mut self) -> u8 {
		self.select_register_space();
		self.regs.register_file_read(CHIP_MODEL)
	}
}

impl<R: RegisterAccess> Hardware for Kawari<R> {
	fn set_pins(&mut self, pins: OutPins) {
		self.regs.spi_write(LineState::from(pins));
	}

	fn read_pin(&mut self) -> bool {
		self.regs.spi_status().data_in()
	}

	fn mask_interrupts(&mut self) {
		self.regs.mask_interrupts();
	}

	fn unmask_interrupts(&mut self) {
		self.regs.unmask_interrupts();
	}

	fn delay(&mut self) {
		if let Some(delay) = self.edge_delay {
			reliable_sleep(delay);
		}
	}

	fn busy_poll_limit(&self) -> usize {
		self.busy_poll_limit
	}
}

impl<R: RegisterAccess> LiveRegisters for Kawari<R> {
	fn select_register_space(&mut self) {
		self.regs.video_mem_flags(VMEM_FLAG_REGS_BIT);
	}

	fn live_register(&mut self, index: u8) -> u8 {
		self.regs.register_file_read(index)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sim::KawariSim;
	use crate::spi::{
		DeviceId,
		DeviceOperations,
		LockStatus,
	};

	fn open_golden() -> Kawari<KawariSim> {
		let mut image = GOLDEN.clone();
		image.set(0, CHIP_MODEL, 1);
		image.set(0, EEPROM_BANK, 1);
		Kawari::open(KawariSim::with_image(&image)).unwrap()
	}

	#[test]
	fn open_unlocks_spi() {
		let dev = open_golden();
		let sim = dev.into_inner();
		assert!(sim.is_spi_unlocked());
		assert!(!sim.eeprom().is_selected());
	}

	#[test]
	fn chip_info() {
		let mut dev = open_golden();
		assert_eq!(dev.version(), Version { major: 1, minor: 2 });
		assert_eq!(format!("{}", dev.version()), "1.2");
		assert_eq!(dev.variant(), "SIM");
		assert_eq!(dev.chip_model(), 1);
		assert_eq!(chip_model_name(dev.chip_model()), "6569R5");
		assert_eq!(chip_model_name(7), "6569R1");
	}

	#[test]
	fn operations_through_register_window() {
		let mut dev = open_golden();
		assert_eq!(dev.read_device_id().unwrap(), DeviceId { manufacturer: 0x20, family: 0x00, density: 0x0a });
		assert_eq!(&dev.read_page(0).unwrap()[..5], &GOLDEN[..5]);

		dev.write_enable().unwrap();
		dev.write_byte(0x3ff, 0x5a).unwrap();
		assert_eq!(dev.read_page(0x3e0).unwrap()[31], 0x5a);
		assert_eq!(dev.read_lock_status().unwrap(), LockStatus::Unlocked);

		let sim = dev.into_inner();
		assert_eq!(sim.unmasked_line_writes(), 0);
		assert_eq!(sim.flash_select_violations(), 0);
		assert!(sim.line_writes() > 0);
	}

	#[test]
	fn every_line_write_is_masked() {
		let mut dev = open_golden();
		write_image(&mut dev, &GOLDEN).unwrap();
		set_serial(&mut dev, "X1").unwrap();
		let report = verify(&mut dev).unwrap();
		// chip model and bank bytes are erased now, the diff skips them
		assert!(report.image.is_empty());

		let sim = dev.into_inner();
		assert_eq!(sim.unmasked_line_writes(), 0);
		assert!(!sim.is_masked());
	}

	#[test]
	fn edge_delay_is_optional() {
		let mut dev = open_golden();
		dev.set_edge_delay(Some(Duration::from_nanos(1)));
		dev.set_busy_poll_limit(3);
		assert_eq!(Hardware::busy_poll_limit(&dev), 3);
		assert_eq!(&dev.read_id_page().unwrap()[..3], &[0x20u8, 0x00, 0x0a][..]);
	}
}
