use std::fmt;
use std::ops::Deref;

use super::LowLevel;

/// longest read or write burst in a single transaction (one page)
pub const BURST_LIMIT: usize = 32;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Opcode {
	/// 0x02: write data; the device clears WEL when the write cycle starts
	Write,
	/// 0x03: read data
	Read,
	/// 0x05: read status register (bit 0: BUSY, bit 1: WEL)
	ReadStatus,
	/// 0x06: write enable (sets WEL)
	WriteEnable,
	/// 0x82: write ID page (A10 = 0) or lock ID page (A10 = 1)
	WriteId,
	/// 0x83: read ID page (A10 = 0) or lock status (A10 = 1)
	ReadId,
}

impl Opcode {
	pub fn code(self) -> u8 {
		match self {
			Opcode::Write => 0x02,
			Opcode::Read => 0x03,
			Opcode::ReadStatus => 0x05,
			Opcode::WriteEnable => 0x06,
			Opcode::WriteId => 0x82,
			Opcode::ReadId => 0x83,
		}
	}

	pub fn from_code(code: u8) -> Option<Self> {
		Some(match code {
			0x02 => Opcode::Write,
			0x03 => Opcode::Read,
			0x05 => Opcode::ReadStatus,
			0x06 => Opcode::WriteEnable,
			0x82 => Opcode::WriteId,
			0x83 => Opcode::ReadId,
			_ => return None,
		})
	}
}

impl fmt::Display for Opcode {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{:?} (0x{:02x})", self, self.code())
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Transaction<'a> {
	pub instruction: Opcode,
	pub address: Option<u16>,
	pub write: &'a [u8],
	pub read_count: usize,
	pub close: bool,
}

impl<'a> Transaction<'a> {
	/// instruction only, select released afterwards
	pub fn new(instruction: Opcode) -> Self {
		Transaction {
			instruction,
			address: None,
			write: &[],
			read_count: 0,
			close: true,
		}
	}

	pub fn address(self, address: u16) -> Self {
		Transaction { address: Some(address), ..self }
	}

	pub fn write(self, write: &'a [u8]) -> Self {
		Transaction { write, ..self }
	}

	pub fn read(self, read_count: usize) -> Self {
		Transaction { read_count, ..self }
	}

	/// keep the device selected after the last burst
	pub fn keep_open(self) -> Self {
		Transaction { close: false, ..self }
	}

	pub fn validate(&self) -> crate::AResult<()> {
		ensure!(self.write.len() <= BURST_LIMIT,
			"{}: write burst of {} bytes exceeds {} bytes", self.instruction, self.write.len(), BURST_LIMIT
		);
		ensure!(self.read_count <= BURST_LIMIT,
			"{}: read burst of {} bytes exceeds {} bytes", self.instruction, self.read_count, BURST_LIMIT
		);
		ensure!(self.write.is_empty() || 0 == self.read_count,
			"{}: can't write and read in the same transaction", self.instruction
		);
		Ok(())
	}
}

/// Bytes received during the read burst of one transaction
#[derive(Clone, Copy)]
pub struct ReadBuffer {
	data: [u8; BURST_LIMIT],
	len: usize,
}

impl ReadBuffer {
	fn new() -> Self {
		ReadBuffer {
			data: [0u8; BURST_LIMIT],
			len: 0,
		}
	}

	fn push(&mut self, byte: u8) {
		self.data[self.len] = byte;
		self.len += 1;
	}
}

impl Deref for ReadBuffer {
	type Target = [u8];

	fn deref(&self) -> &[u8] {
		&self.data[..self.len]
	}
}

impl fmt::Debug for ReadBuffer {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_list().entries(self.iter()).finish()
	}
}

pub trait TransactionEngine: LowLevel {
	/// Run a complete transaction with interrupts masked; the returned
	/// buffer holds exactly `read_count` bytes.
	fn execute(&mut self, tx: &Transaction) -> crate::AResult<ReadBuffer> {
		tx.validate()?;
		debug!("{} address: {:?}, write: {} bytes, read: {} bytes, close: {}",
			tx.instruction, tx.address, tx.write.len(), tx.read_count, tx.close
		);

		let mut result = ReadBuffer::new();
		let mut bus = self.masked();

		bus.begin();
		bus.shift_out_byte(tx.instruction.code());
		if let Some(address) = tx.address {
			bus.shift_out_address(address);
		}
		for byte in tx.write {
			bus.shift_out_byte(*byte);
		}
		for _ in 0..tx.read_count {
			let byte = bus.shift_in_byte();
			result.push(byte);
		}
		if tx.close {
			bus.end();
		}

		Ok(result)
	}
}

impl<H: LowLevel + ?Sized> TransactionEngine for H {
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::spi::{
		Hardware,
		OutPins,
	};

	#[derive(Default)]
	struct Loopback {
		pins: Vec<OutPins>,
		level: bool,
		masked: bool,
		unmasked_writes: usize,
	}

	impl Hardware for Loopback {
		fn set_pins(&mut self, pins: OutPins) {
			if !self.masked {
				self.unmasked_writes += 1;
			}
			self.pins.push(pins);
		}

		fn read_pin(&mut self) -> bool {
			// alternate 1, 0, 1, 0, ...
			self.level = !self.level;
			self.level
		}

		fn mask_interrupts(&mut self) {
			self.masked = true;
		}

		fn unmask_interrupts(&mut self) {
			self.masked = false;
		}
	}

	#[test]
	fn opcodes_map_back() {
		for op in &[Opcode::Write, Opcode::Read, Opcode::ReadStatus, Opcode::WriteEnable, Opcode::WriteId, Opcode::ReadId] {
			assert_eq!(Opcode::from_code(op.code()), Some(*op));
		}
		assert_eq!(Opcode::from_code(0x9f), None);
	}

	#[test]
	fn rejects_bidirectional_and_oversized_bursts() {
		let data = [0u8; 33];
		assert!(Transaction::new(Opcode::Write).write(&data[..1]).read(1).validate().is_err());
		assert!(Transaction::new(Opcode::Write).write(&data).validate().is_err());
		assert!(Transaction::new(Opcode::Read).read(33).validate().is_err());
		assert!(Transaction::new(Opcode::Read).read(32).validate().is_ok());

		let mut hw = Loopback::default();
		assert!(hw.execute(&Transaction::new(Opcode::Read).read(40)).is_err());
		assert!(hw.pins.is_empty(), "invalid transaction must not touch the lines");
	}

	#[test]
	fn instruction_only_transaction_shape() {
		let mut hw = Loopback::default();
		let result = hw.execute(&Transaction::new(Opcode::WriteEnable)).unwrap();
		assert!(result.is_empty());
		// begin (2) + 8 bits (16) + end (2)
		assert_eq!(hw.pins.len(), 20);
		assert_eq!(hw.pins[0], OutPins::IDLE);
		assert_eq!(hw.pins[1], OutPins::selected(true, false));
		assert_eq!(hw.pins[18], OutPins::selected(false, false));
		assert_eq!(hw.pins[19], OutPins::IDLE);
		assert_eq!(hw.unmasked_writes, 0);
		assert!(!hw.masked);
	}

	#[test]
	fn read_burst_has_exactly_read_count_bytes() {
		let mut hw = Loopback::default();
		let result = hw.execute(&Transaction::new(Opcode::ReadId).address(0).read(3)).unwrap();
		assert_eq!(&result[..], &[0xaa, 0xaa, 0xaa][..]);
		// begin + instruction + address + 3 bytes + end
		assert_eq!(hw.pins.len(), 2 + 16 + 32 + 48 + 2);
	}

	#[test]
	fn open_transaction_keeps_select() {
		let mut hw = Loopback::default();
		hw.execute(&Transaction::new(Opcode::ReadStatus).read(1).keep_open()).unwrap();
		assert!(hw.pins.last().unwrap().chip_select);
	}
}
