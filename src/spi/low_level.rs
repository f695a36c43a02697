use std::ops::{
	Deref,
	DerefMut,
};

use super::{
	Hardware,
	OutPins,
};

/// Interrupts stay masked while this is alive; the bit timing of a
/// transaction is only defined by back-to-back line writes.
pub struct Masked<'a, H: ?Sized + LowLevel + 'a>(&'a mut H);

impl<'a, H: ?Sized + LowLevel> Drop for Masked<'a, H> {
	fn drop(&mut self) {
		self.0.unmask_interrupts();
	}
}

impl<'a, H: ?Sized + LowLevel> Deref for Masked<'a, H> {
	type Target = H;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<'a, H: ?Sized + LowLevel> DerefMut for Masked<'a, H> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.0
	}
}

pub trait LowLevel: Hardware {
	fn drive(&mut self, pins: OutPins) {
		trace!("lines: {:?}", pins);
		self.set_pins(pins);
		self.delay();
	}

	fn masked(&mut self) -> Masked<Self> {
		self.mask_interrupts();
		Masked(self)
	}

	// release, then select the device with CLK high
	fn begin(&mut self) {
		self.drive(OutPins::IDLE);
		self.drive(OutPins::selected(true, false));
	}

	// CLK low, then release select with CLK back to idle
	fn end(&mut self) {
		self.drive(OutPins::selected(false, false));
		self.drive(OutPins::IDLE);
	}

	// set DATA while CLK is low; the device samples on the rising edge
	fn shift_out_bit(&mut self, bit: bool) {
		self.drive(OutPins::selected(false, bit));
		self.drive(OutPins::selected(true, bit));
	}

	// the device drives its output after the falling edge; sample once CLK
	// is high again
	fn shift_in_bit(&mut self) -> bool {
		self.drive(OutPins::selected(false, false));
		self.drive(OutPins::selected(true, false));
		self.read_pin()
	}

	fn shift_out_byte(&mut self, byte: u8) {
		let mut mask = 0x80u8;
		while mask != 0 {
			self.shift_out_bit(0 != byte & mask);
			mask >>= 1;
		}
	}

	fn shift_out_address(&mut self, address: u16) {
		let mut mask = 0x8000u16;
		while mask != 0 {
			self.shift_out_bit(0 != address & mask);
			mask >>= 1;
		}
	}

	fn shift_in_byte(&mut self) -> u8 {
		let mut value = 0u8;
		let mut mask = 0x80u8;
		while mask != 0 {
			if self.shift_in_bit() {
				value |= mask;
			}
			mask >>= 1;
		}
		value
	}
}

impl<H: Hardware + ?Sized> LowLevel for H {
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Default)]
	struct Recorder {
		pins: Vec<OutPins>,
		input: Vec<bool>,
		masked: bool,
		mask_calls: usize,
	}

	impl Hardware for Recorder {
		fn set_pins(&mut self, pins: OutPins) {
			self.pins.push(pins);
		}

		fn read_pin(&mut self) -> bool {
			self.input.remove(0)
		}

		fn mask_interrupts(&mut self) {
			self.masked = true;
			self.mask_calls += 1;
		}

		fn unmask_interrupts(&mut self) {
			self.masked = false;
		}
	}

	fn sampled_bits(pins: &[OutPins]) -> Vec<bool> {
		// value of DATA at every rising CLK edge while selected
		pins.windows(2)
			.filter(|w| w[1].chip_select && !w[0].clock && w[1].clock)
			.map(|w| w[1].data)
			.collect()
	}

	#[test]
	fn byte_is_shifted_msb_first() {
		let mut hw = Recorder::default();
		hw.shift_out_byte(0b1010_0011);
		assert_eq!(hw.pins.len(), 16);
		let bits = sampled_bits(&hw.pins);
		assert_eq!(bits, vec![true, false, true, false, false, false, true, true]);
		// DATA is already stable before the rising edge
		for pair in hw.pins.chunks(2) {
			assert!(!pair[0].clock);
			assert!(pair[1].clock);
			assert_eq!(pair[0].data, pair[1].data);
		}
	}

	#[test]
	fn address_is_sixteen_bits_msb_first() {
		let mut hw = Recorder::default();
		hw.shift_out_address(0x0401);
		let bits = sampled_bits(&hw.pins);
		assert_eq!(bits.len(), 16);
		assert!(bits[5]);
		assert!(bits[15]);
		assert_eq!(bits.iter().filter(|b| **b).count(), 2);
	}

	#[test]
	fn byte_is_assembled_msb_first() {
		let mut hw = Recorder::default();
		hw.input = vec![false, true, true, false, false, false, false, true];
		assert_eq!(hw.shift_in_byte(), 0x61);
		// every sample follows a falling and a rising edge with DATA low
		for pair in hw.pins.chunks(2) {
			assert_eq!(pair[0], OutPins::selected(false, false));
			assert_eq!(pair[1], OutPins::selected(true, false));
		}
	}

	#[test]
	fn masked_guard_unmasks_on_drop() {
		let mut hw = Recorder::default();
		{
			let mut m = hw.masked();
			m.begin();
			assert!(m.masked);
		}
		assert!(!hw.masked);
		assert_eq!(hw.mask_calls, 1);
		assert_eq!(hw.pins, vec![OutPins::IDLE, OutPins::selected(true, false)]);
	}
}
