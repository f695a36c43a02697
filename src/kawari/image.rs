use super::layout::*;

/// RGB table, shared by all banks (4 bytes per color, last byte unused)
const RGB: [u8; RGB_LEN as usize] = [
	0x00, 0x00, 0x00, 0xff, 0x3f, 0x3f, 0x3f, 0xff,
	0x2b, 0x0a, 0x0a, 0xff, 0x18, 0x36, 0x33, 0xff,
	0x2c, 0x0f, 0x2d, 0xff, 0x12, 0x31, 0x12, 0xff,
	0x0d, 0x0e, 0x31, 0xff, 0x39, 0x3b, 0x13, 0xff,
	0x2d, 0x16, 0x07, 0xff, 0x1a, 0x0e, 0x02, 0xff,
	0x3a, 0x1d, 0x1b, 0xff, 0x13, 0x13, 0x13, 0xff,
	0x21, 0x21, 0x21, 0xff, 0x29, 0x3e, 0x27, 0xff,
	0x1c, 0x1f, 0x39, 0xff, 0x2d, 0x2d, 0x2d, 0xff,
];

const BLACK_LEVEL_INIT: u8 = 0x0c;
const BURST_AMPLITUDE_INIT: u8 = 0x0c;

/// luma per color, one table per bank (6567R8, 6569R5, 6567R56A, 6569R1)
const LUMA: [[u8; COLORS as usize]; BANKS] = [
	[0x18, 0x3f, 0x2f, 0x39, 0x32, 0x36, 0x2c, 0x3c, 0x32, 0x2c, 0x36, 0x2f, 0x35, 0x3c, 0x35, 0x39],
	[0x08, 0x3f, 0x2a, 0x37, 0x2d, 0x33, 0x25, 0x3b, 0x2d, 0x25, 0x33, 0x2a, 0x32, 0x3b, 0x32, 0x37],
	[0x18, 0x3f, 0x2b, 0x3b, 0x35, 0x35, 0x2b, 0x3b, 0x35, 0x2b, 0x35, 0x2b, 0x35, 0x3b, 0x35, 0x3b],
	[0x08, 0x3f, 0x1f, 0x39, 0x30, 0x30, 0x1f, 0x39, 0x30, 0x1f, 0x30, 0x1f, 0x30, 0x39, 0x30, 0x39],
];

// 0x00: unmodulated; 0x10 steps of 22.5 degrees, low nibble fine tuning
const PHASE: [u8; COLORS as usize] = [
	0x00, 0x00, 0x50, 0xd0, 0x20, 0xa0, 0xf1, 0x80, 0x60, 0x70, 0x50, 0x00, 0x00, 0xa0, 0xf1, 0x00,
];

// 0x00: no modulation
const AMPLITUDE: [u8; COLORS as usize] = [
	0x00, 0x00, 0x0d, 0x0a, 0x0c, 0x0b, 0x0b, 0x0f, 0x0f, 0x0b, 0x0c, 0x00, 0x00, 0x0d, 0x0d, 0x00,
];

const DISPLAY_FLAGS_INIT: u8 = 0x80;

const fn build() -> [u8; IMAGE_SIZE] {
	let mut image = [0xffu8; IMAGE_SIZE];

	let mut i = 0;
	while i < MAGIC.len() {
		image[MAGIC_0 as usize + i] = MAGIC[i];
		i += 1;
	}
	image[DISPLAY_FLAGS as usize] = DISPLAY_FLAGS_INIT;

	let mut bank = 0;
	while bank < BANKS {
		let base = bank * BANK_SIZE;

		i = 0;
		while i < RGB.len() {
			image[base + RGB_START as usize + i] = RGB[i];
			i += 1;
		}
		image[base + BLACK_LEVEL as usize] = BLACK_LEVEL_INIT;
		image[base + BURST_AMPLITUDE as usize] = BURST_AMPLITUDE_INIT;

		i = 0;
		while i < COLORS as usize {
			image[base + LUMA_START as usize + i] = LUMA[bank][i];
			image[base + PHASE_START as usize + i] = PHASE[i];
			image[base + AMPLITUDE_START as usize + i] = AMPLITUDE[i];
			i += 1;
		}

		bank += 1;
	}

	image
}

/// Expected contents after initialization. Chip model and active bank are
/// left erased; they differ per device.
pub static GOLDEN: DeviceImage = DeviceImage(build());

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn golden_spot_checks() {
		assert_eq!(&GOLDEN[0..5], &[0x56, 0x49, 0x43, 0x32, 0x80][..]);
		assert_eq!(GOLDEN[5], 0xff);
		assert_eq!(GOLDEN[64], 0x00);
		assert_eq!(GOLDEN[68], 0x3f);
		assert_eq!(GOLDEN[0x80], 0x0c);
		assert_eq!(GOLDEN[0x82], 0xff);
		assert_eq!(GOLDEN[0x1a0], 0x08);
		assert_eq!(GOLDEN[0x2a2], 0x2b);
		assert_eq!(GOLDEN[0x3af], 0x39);
		assert_eq!(GOLDEN[0x3b6], 0xf1);
		assert_eq!(GOLDEN[0x3cf], 0x00);
		assert_eq!(GOLDEN[0x3d0], 0xff);
		// only bank 0 carries the shared settings
		assert_eq!(GOLDEN[0x100], 0xff);
	}

	#[test]
	fn golden_leaves_device_specific_bytes_erased() {
		assert_eq!(GOLDEN.get(0, CHIP_MODEL), 0xff);
		assert_eq!(GOLDEN.get(0, EEPROM_BANK), 0xff);
	}

	#[test]
	fn golden_byte_count() {
		let programmed = GOLDEN.iter().filter(|b| **b != 0xff).count();
		assert_eq!(programmed, 103 + 3 * 98);
	}
}
