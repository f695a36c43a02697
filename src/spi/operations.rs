use std::fmt;

use super::{
	DeviceError,
	LowLevel,
	transaction::{
		Opcode,
		Transaction,
		TransactionEngine,
	},
};

pub const MEMORY_SIZE: usize = 1024;
pub const PAGE_SIZE: usize = 32;

/// address bit 10 switches RDID/WRID to the lock status/lock function
pub const ID_LOCK_ADDRESS: u16 = 0x0400;

// data byte for LID; bit 1 requests the lock
const ID_LOCK_REQUEST: u8 = 0x02;

const STATUS_BUSY: u8 = 0x01;

pub type Page = [u8; PAGE_SIZE];

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct DeviceId {
	pub manufacturer: u8,
	pub family: u8,
	pub density: u8,
}

impl fmt::Display for DeviceId {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "MF=0x{:02x} SPI_FAM=0x{:02x} DENSITY=0x{:02x}", self.manufacturer, self.family, self.density)
	}
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum LockStatus {
	Unlocked,
	Locked,
}

impl fmt::Display for LockStatus {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			LockStatus::Unlocked => write!(f, "UNLOCKED"),
			LockStatus::Locked => write!(f, "LOCKED"),
		}
	}
}

fn check_address(address: u16) -> crate::AResult<()> {
	if address as usize >= MEMORY_SIZE {
		return Err(DeviceError::AddressOutOfRange { address: address as u32 }.into());
	}
	Ok(())
}

fn check_page_address(address: u16) -> crate::AResult<()> {
	check_address(address)?;
	if 0 != address as usize % PAGE_SIZE {
		return Err(DeviceError::UnalignedPage { address: address as u32 }.into());
	}
	Ok(())
}

fn to_page(data: &[u8]) -> Page {
	let mut page = [0u8; PAGE_SIZE];
	page.copy_from_slice(data);
	page
}

pub trait DeviceOperations: TransactionEngine {
	/// Set the write enable latch; needed before every write, ID page write
	/// and lock. The device clears the latch again after each write cycle.
	fn write_enable(&mut self) -> crate::AResult<()> {
		self.execute(&Transaction::new(Opcode::WriteEnable))?;
		Ok(())
	}

	/// Poll the status register until the write cycle completed; gives up
	/// after `busy_poll_limit` status bytes. Always releases select.
	fn wait_busy(&mut self) -> crate::AResult<()> {
		let limit = self.busy_poll_limit();
		let mut status = self.execute(&Transaction::new(Opcode::ReadStatus).read(1).keep_open())?[0];
		let mut polls = 1usize;

		while 0 != status & STATUS_BUSY {
			if polls >= limit {
				self.masked().end();
				warn!("device still busy after {} status polls", polls);
				return Err(DeviceError::NotReady { polls }.into());
			}
			// the device repeats the status register as long as select is held
			status = self.masked().shift_in_byte();
			polls += 1;
		}

		self.masked().end();
		debug!("device ready after {} status polls", polls);
		Ok(())
	}

	fn read_page(&mut self, address: u16) -> crate::AResult<Page> {
		check_page_address(address)?;
		let data = self.execute(&Transaction::new(Opcode::Read).address(address).read(PAGE_SIZE))?;
		Ok(to_page(&data))
	}

	/// Requires a preceding `write_enable`; waits for the write cycle.
	fn write_page(&mut self, address: u16, page: &Page) -> crate::AResult<()> {
		check_page_address(address)?;
		self.execute(&Transaction::new(Opcode::Write).address(address).write(page))?;
		self.wait_busy()
	}

	/// Requires a preceding `write_enable`; waits for the write cycle.
	fn write_byte(&mut self, address: u16, value: u8) -> crate::AResult<()> {
		check_address(address)?;
		self.execute(&Transaction::new(Opcode::Write).address(address).write(&[value]))?;
		self.wait_busy()
	}

	/// The first three bytes of the ID page are programmed by the vendor.
	fn read_device_id(&mut self) -> crate::AResult<DeviceId> {
		let data = self.execute(&Transaction::new(Opcode::ReadId).address(0).read(3))?;
		Ok(DeviceId {
			manufacturer: data[0],
			family: data[1],
			density: data[2],
		})
	}

	fn read_id_page(&mut self) -> crate::AResult<Page> {
		let data = self.execute(&Transaction::new(Opcode::ReadId).address(0).read(PAGE_SIZE))?;
		Ok(to_page(&data))
	}

	/// Requires a preceding `write_enable`; a locked device ignores it.
	fn write_id_page(&mut self, page: &Page) -> crate::AResult<()> {
		self.execute(&Transaction::new(Opcode::WriteId).address(0).write(page))?;
		self.wait_busy()
	}

	fn read_lock_status(&mut self) -> crate::AResult<LockStatus> {
		let data = self.execute(&Transaction::new(Opcode::ReadId).address(ID_LOCK_ADDRESS).read(1))?;
		Ok(if 0 != data[0] & 0x01 { LockStatus::Locked } else { LockStatus::Unlocked })
	}

	/// Permanently locks the ID page. Requires a preceding `write_enable`.
	fn lock_id_page(&mut self) -> crate::AResult<()> {
		warn!("locking ID page permanently");
		self.execute(&Transaction::new(Opcode::WriteId).address(ID_LOCK_ADDRESS).write(&[ID_LOCK_REQUEST]))?;
		self.wait_busy()
	}
}

impl<H: LowLevel + ?Sized> DeviceOperations for H {
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sim::{
		SimConfig,
		SimEeprom,
	};

	fn pattern(seed: u8) -> Page {
		let mut page = [0u8; PAGE_SIZE];
		for (i, b) in page.iter_mut().enumerate() {
			*b = seed.wrapping_mul(31).wrapping_add(i as u8);
		}
		page
	}

	fn device_error(e: &failure::Error) -> Option<&DeviceError> {
		e.downcast_ref::<DeviceError>()
	}

	#[test]
	fn every_page_round_trips() {
		let mut dev = SimEeprom::new(SimConfig::default());
		for address in (0..MEMORY_SIZE as u16).step_by(PAGE_SIZE) {
			let data = pattern((address / 32) as u8);
			dev.write_enable().unwrap();
			dev.write_page(address, &data).unwrap();
			assert_eq!(dev.read_page(address).unwrap(), data, "page @{:04x}", address);
		}
		// nothing overwrote another page
		for address in (0..MEMORY_SIZE as u16).step_by(PAGE_SIZE) {
			assert_eq!(dev.read_page(address).unwrap(), pattern((address / 32) as u8));
		}
	}

	#[test]
	fn write_without_write_enable_is_rejected_by_device() {
		let mut dev = SimEeprom::new(SimConfig::default());
		let before = dev.read_page(0x60).unwrap();
		dev.write_page(0x60, &pattern(7)).unwrap();
		assert_eq!(dev.read_page(0x60).unwrap(), before);

		// the latch only covers a single write
		dev.write_enable().unwrap();
		dev.write_page(0x60, &pattern(7)).unwrap();
		dev.write_page(0x60, &pattern(8)).unwrap();
		assert_eq!(dev.read_page(0x60).unwrap(), pattern(7));
	}

	#[test]
	fn single_byte_write() {
		let mut dev = SimEeprom::new(SimConfig::default());
		dev.write_enable().unwrap();
		dev.write_byte(0x123, 0x42).unwrap();
		let page = dev.read_page(0x120).unwrap();
		assert_eq!(page[3], 0x42);
		assert_eq!(page[2], 0xff);
		assert_eq!(page[4], 0xff);
	}

	#[test]
	fn out_of_range_addresses_are_rejected_before_the_bus() {
		let mut dev = SimEeprom::new(SimConfig::default());
		dev.write_enable().unwrap();
		let edges = dev.clock_edges();

		let e = dev.write_page(1024, &pattern(1)).unwrap_err();
		assert_eq!(device_error(&e), Some(&DeviceError::AddressOutOfRange { address: 1024 }));
		let e = dev.read_page(0xffe0).unwrap_err();
		assert_eq!(device_error(&e), Some(&DeviceError::AddressOutOfRange { address: 0xffe0 }));
		let e = dev.write_byte(0x400, 1).unwrap_err();
		assert_eq!(device_error(&e), Some(&DeviceError::AddressOutOfRange { address: 0x400 }));
		assert_eq!(dev.clock_edges(), edges);
	}

	#[test]
	fn unaligned_page_addresses_are_rejected() {
		let mut dev = SimEeprom::new(SimConfig::default());
		let e = dev.read_page(0x21).unwrap_err();
		assert_eq!(device_error(&e), Some(&DeviceError::UnalignedPage { address: 0x21 }));
		let e = dev.write_page(0x3f0, &pattern(0)).unwrap_err();
		assert_eq!(device_error(&e), Some(&DeviceError::UnalignedPage { address: 0x3f0 }));
	}

	#[test]
	fn device_id_is_vendor_prefix_of_id_page() {
		let mut dev = SimEeprom::new(SimConfig::default());
		let id = dev.read_device_id().unwrap();
		assert_eq!(id, DeviceId { manufacturer: 0x20, family: 0x00, density: 0x0a });
		let page = dev.read_id_page().unwrap();
		assert_eq!(&page[..3], &[0x20, 0x00, 0x0a][..]);
	}

	#[test]
	fn id_page_is_always_a_full_page() {
		let mut dev = SimEeprom::new(SimConfig::default());
		assert_eq!(dev.read_id_page().unwrap().len(), PAGE_SIZE);
		dev.write_enable().unwrap();
		dev.write_id_page(&pattern(3)).unwrap();
		let page = dev.read_id_page().unwrap();
		assert_eq!(page.len(), PAGE_SIZE);
		assert_eq!(page, pattern(3));
	}

	#[test]
	fn lock_is_permanent_and_blocks_id_writes() {
		let mut dev = SimEeprom::new(SimConfig::default());
		assert_eq!(dev.read_lock_status().unwrap(), LockStatus::Unlocked);

		// no write enable: lock request is ignored
		dev.lock_id_page().unwrap();
		assert_eq!(dev.read_lock_status().unwrap(), LockStatus::Unlocked);

		dev.write_enable().unwrap();
		dev.lock_id_page().unwrap();
		assert_eq!(dev.read_lock_status().unwrap(), LockStatus::Locked);
		let locked_page = dev.read_id_page().unwrap();

		for seed in 0..3 {
			dev.write_enable().unwrap();
			dev.write_id_page(&pattern(seed)).unwrap();
			assert_eq!(dev.read_id_page().unwrap(), locked_page);
			assert_eq!(dev.read_lock_status().unwrap(), LockStatus::Locked);
		}

		// locking again changes nothing
		dev.write_enable().unwrap();
		dev.lock_id_page().unwrap();
		assert_eq!(dev.read_lock_status().unwrap(), LockStatus::Locked);
		assert_eq!(dev.read_id_page().unwrap(), locked_page);
	}

	#[test]
	fn busy_device_is_polled_until_ready() {
		let mut dev = SimEeprom::new(SimConfig { write_busy_polls: 5, ..SimConfig::default() });
		dev.write_enable().unwrap();
		dev.write_page(0, &pattern(9)).unwrap();
		assert!(!dev.is_busy());
		assert_eq!(dev.status_reads(), 6);
		assert_eq!(dev.read_page(0).unwrap(), pattern(9));
	}

	#[test]
	fn stuck_device_reports_not_ready() {
		let mut dev = SimEeprom::new(SimConfig { stuck_busy: true, busy_poll_limit: 16, ..SimConfig::default() });
		dev.write_enable().unwrap();
		let e = dev.write_page(0, &pattern(1)).unwrap_err();
		assert_eq!(device_error(&e), Some(&DeviceError::NotReady { polls: 16 }));
		// select was released despite the failure
		assert!(!dev.is_selected());
	}
}
