use std::thread;
use std::time::{
	Duration,
	Instant,
};

/// number of status bytes `wait_busy` reads before giving up
pub const DEFAULT_BUSY_POLLS: usize = 0x1_0000;

pub fn reliable_sleep(mut duration: Duration) {
	loop {
		let now = Instant::now();
		thread::sleep(duration);
		let elapsed = now.elapsed();
		if elapsed >= duration {
			return;
		}
		duration -= elapsed;
	}
}

/// Output lines of the bus; `chip_select` is the logical state (true: device
/// selected), the electrical polarity is up to the line driver.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct OutPins {
	pub chip_select: bool,
	pub clock: bool,
	pub data: bool,
}

impl OutPins {
	/// select released, clock and data idle high
	pub const IDLE: OutPins = OutPins { chip_select: false, clock: true, data: true };

	pub fn selected(clock: bool, data: bool) -> Self {
		OutPins {
			chip_select: true,
			clock,
			data,
		}
	}
}

pub trait Hardware {
	/// drive all output lines with a single write
	fn set_pins(&mut self, pins: OutPins);
	/// sample the device's data output
	fn read_pin(&mut self) -> bool;

	// nothing else may touch the lines between `mask_interrupts` and
	// `unmask_interrupts`
	fn mask_interrupts(&mut self) {}
	fn unmask_interrupts(&mut self) {}

	// delay for (at least) one clock edge; the register writes alone are
	// slow enough for the device by default
	fn delay(&mut self) {}

	fn busy_poll_limit(&self) -> usize {
		DEFAULT_BUSY_POLLS
	}
}

impl<'a, H: ?Sized + Hardware> Hardware for &'a mut H {
	fn set_pins(&mut self, pins: OutPins) {
		H::set_pins(*self, pins)
	}
	fn read_pin(&mut self) -> bool {
		H::read_pin(*self)
	}
	fn mask_interrupts(&mut self) {
		H::mask_interrupts(*self)
	}
	fn unmask_interrupts(&mut self) {
		H::unmask_interrupts(*self)
	}
	fn delay(&mut self) {
		H::delay(*self)
	}
	fn busy_poll_limit(&self) -> usize {
		H::busy_poll_limit(*self)
	}
}
