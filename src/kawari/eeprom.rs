use crate::spi::{
	DeviceError,
	DeviceOperations,
	PAGE_SIZE,
	Page,
};

use super::layout::DeviceImage;

/// Serial number starts after the vendor bytes of the ID page.
pub const SERIAL_OFFSET: usize = 3;
/// Room for the serial including its NUL terminator.
pub const SERIAL_CAPACITY: usize = PAGE_SIZE - SERIAL_OFFSET;

pub fn read_image<D: DeviceOperations + ?Sized>(dev: &mut D) -> crate::AResult<DeviceImage> {
	let mut image = DeviceImage::erased();
	for address in DeviceImage::page_addresses() {
		let page = dev.read_page(address)?;
		image.set_page(address as usize, &page);
	}
	debug!("read {} bytes", image.len());
	Ok(image)
}

/// Fill every page with 0xff.
pub fn erase_all<D: DeviceOperations + ?Sized>(dev: &mut D) -> crate::AResult<()> {
	let erased = [0xffu8; PAGE_SIZE];
	for address in DeviceImage::page_addresses() {
		info!("Erasing page @{:04x}", address);
		dev.write_enable()?;
		dev.write_page(address, &erased)?;
	}
	Ok(())
}

/// Write all pages, then read the image back and compare.
pub fn write_image<D: DeviceOperations + ?Sized>(dev: &mut D, image: &DeviceImage) -> crate::AResult<()> {
	for address in DeviceImage::page_addresses() {
		info!("Writing page @{:04x}", address);
		dev.write_enable()?;
		dev.write_page(address, &image.page(address as usize))?;
	}

	let written = read_image(dev)?;
	if let Some(address) = (0..image.len()).find(|a| written[*a] != image[*a]) {
		bail!(
			"Verify failed at {:04x}: expected 0x{:02x}, EEPROM has 0x{:02x}",
			address, image[address], written[address]
		);
	}
	info!("Image written and verified");
	Ok(())
}

/// Bytes from `SERIAL_OFFSET` up to the first NUL (or the end of the page).
pub fn decode_serial(id_page: &Page) -> String {
	id_page[SERIAL_OFFSET..].iter()
		.take_while(|b| **b != 0)
		.map(|b| *b as char)
		.collect()
}

/// Replace the serial in `id_page`, keeping the vendor bytes; the rest of the
/// page is zero padded.
pub fn encode_serial(id_page: &Page, serial: &str) -> Result<Page, DeviceError> {
	if !serial.is_ascii() || serial.contains('\0') {
		return Err(DeviceError::SerialNotAscii { serial: serial.to_string() });
	}
	let bytes = serial.as_bytes();
	if bytes.len() + 1 > SERIAL_CAPACITY {
		return Err(DeviceError::SerialTooLong {
			serial: serial.to_string(),
			len: bytes.len(),
			max: SERIAL_CAPACITY - 1,
		});
	}

	let mut page = [0u8; PAGE_SIZE];
	page[..SERIAL_OFFSET].copy_from_slice(&id_page[..SERIAL_OFFSET]);
	page[SERIAL_OFFSET..SERIAL_OFFSET + bytes.len()].copy_from_slice(bytes);
	Ok(page)
}

pub fn read_serial<D: DeviceOperations + ?Sized>(dev: &mut D) -> crate::AResult<String> {
	Ok(decode_serial(&dev.read_id_page()?))
}

/// Read-modify-write of the ID page. A locked device silently keeps the old
/// serial.
pub fn set_serial<D: DeviceOperations + ?Sized>(dev: &mut D, serial: &str) -> crate::AResult<()> {
	let current = dev.read_id_page()?;
	let page = encode_serial(&current, serial)?;
	info!("Setting serial to {:?}", serial);
	dev.write_enable()?;
	dev.write_id_page(&page)
}

/// Permanently lock the ID page (and with it the serial).
pub fn lock_serial<D: DeviceOperations + ?Sized>(dev: &mut D) -> crate::AResult<()> {
	dev.write_enable()?;
	dev.lock_id_page()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::kawari::image::GOLDEN;
	use crate::sim::{
		FACTORY_ID,
		SimConfig,
		SimEeprom,
	};
	use crate::spi::{
		Hardware,
		LockStatus,
		OutPins,
	};

	#[test]
	fn write_then_read_image() {
		let mut dev = SimEeprom::new(SimConfig::default());
		write_image(&mut dev, &GOLDEN).unwrap();
		assert_eq!(&dev.memory()[..], &GOLDEN[..]);
		assert_eq!(read_image(&mut dev).unwrap(), GOLDEN);
	}

	// select never reaches the part, the data line floats low
	struct Disconnected;

	impl Hardware for Disconnected {
		fn set_pins(&mut self, _pins: OutPins) {}
		fn read_pin(&mut self) -> bool {
			false
		}
	}

	#[test]
	fn write_image_notices_failed_writes() {
		let e = write_image(&mut Disconnected, &DeviceImage::erased()).unwrap_err();
		assert_eq!(format!("{}", e), "Verify failed at 0000: expected 0xff, EEPROM has 0x00");
	}

	#[test]
	fn erase_fills_with_ff() {
		let mut dev = SimEeprom::with_memory(SimConfig::default(), &GOLDEN[..]);
		erase_all(&mut dev).unwrap();
		assert!(dev.memory().iter().all(|b| *b == 0xff));
	}

	#[test]
	fn serial_round_trip_keeps_vendor_bytes() {
		let mut dev = SimEeprom::new(SimConfig::default());
		assert_eq!(read_serial(&mut dev).unwrap(), "\u{ff}".repeat(29));

		set_serial(&mut dev, "KW-0042").unwrap();
		assert_eq!(read_serial(&mut dev).unwrap(), "KW-0042");
		let page = dev.id_page();
		assert_eq!(&page[..3], &FACTORY_ID[..]);
		assert_eq!(page[10], 0);
		assert!(page[10..].iter().all(|b| *b == 0));

		// shorter serial clears the tail of the old one
		set_serial(&mut dev, "7").unwrap();
		assert_eq!(read_serial(&mut dev).unwrap(), "7");
	}

	#[test]
	fn serial_length_limit() {
		let page = [0xffu8; PAGE_SIZE];
		let longest = "A".repeat(28);
		let encoded = encode_serial(&page, &longest).unwrap();
		assert_eq!(encoded[31], 0);
		assert_eq!(decode_serial(&encoded), longest);

		let e = encode_serial(&page, &"A".repeat(29)).unwrap_err();
		assert_eq!(e, DeviceError::SerialTooLong { serial: "A".repeat(29), len: 29, max: 28 });
		let e = encode_serial(&page, "seriäl").unwrap_err();
		assert_eq!(e, DeviceError::SerialNotAscii { serial: "seriäl".to_string() });
	}

	#[test]
	fn rejected_serial_never_touches_the_device() {
		let mut dev = SimEeprom::new(SimConfig::default());
		let before = *dev.id_page();
		assert!(set_serial(&mut dev, &"B".repeat(40)).is_err());
		assert_eq!(*dev.id_page(), before);
	}

	#[test]
	fn locked_serial_stays() {
		let mut dev = SimEeprom::new(SimConfig::default());
		set_serial(&mut dev, "FIRST").unwrap();
		lock_serial(&mut dev).unwrap();
		assert_eq!(dev.read_lock_status().unwrap(), LockStatus::Locked);

		set_serial(&mut dev, "SECOND").unwrap();
		assert_eq!(read_serial(&mut dev).unwrap(), "FIRST");
		assert_eq!(dev.read_lock_status().unwrap(), LockStatus::Locked);
	}
}
