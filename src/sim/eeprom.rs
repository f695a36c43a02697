use crate::spi::{
	DEFAULT_BUSY_POLLS,
	Hardware,
	ID_LOCK_ADDRESS,
	MEMORY_SIZE,
	Opcode,
	OutPins,
	PAGE_SIZE,
	Page,
};

/// manufacturer (ST), SPI family, memory density (8 kbit)
pub const FACTORY_ID: [u8; 3] = [0x20, 0x00, 0x0a];

const STATUS_BUSY: u8 = 0x01;
const STATUS_WRITE_ENABLE_LATCH: u8 = 0x02;
const ID_LOCK_REQUEST: u8 = 0x02;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SimConfig {
	/// status bytes reporting BUSY after a write cycle started
	pub write_busy_polls: u32,
	/// never finish a write cycle
	pub stuck_busy: bool,
	/// poll limit when the simulation drives itself as `Hardware`
	pub busy_poll_limit: usize,
	/// ignore writes unless WREN was issued first
	pub require_write_enable: bool,
}

impl Default for SimConfig {
	fn default() -> Self {
		SimConfig {
			write_busy_polls: 1,
			stuck_busy: false,
			busy_poll_limit: DEFAULT_BUSY_POLLS,
			require_write_enable: true,
		}
	}
}

/// Bit level model of an M95080-D style SPI EEPROM with identification page.
///
/// The model reacts to line changes only: DATA is sampled on rising CLK
/// edges while selected, output bits are driven after falling edges, and
/// write instructions are executed when select is released.
pub struct SimEeprom {
	config: SimConfig,
	memory: [u8; MEMORY_SIZE],
	id_page: Page,
	id_locked: bool,
	write_enable_latch: bool,
	busy: bool,
	busy_remaining: u32,

	pins: OutPins,
	output: bool,

	shift_in: u8,
	bits_in: u8,
	received: Vec<u8>,
	out_byte: u8,
	out_bits: u8,
	out_pending: u8,
	out_index: usize,

	clock_edges: usize,
	status_reads: usize,
}

impl SimEeprom {
	pub fn new(config: SimConfig) -> Self {
		let mut id_page = [0xffu8; PAGE_SIZE];
		id_page[..FACTORY_ID.len()].copy_from_slice(&FACTORY_ID);

		SimEeprom {
			config,
			memory: [0xffu8; MEMORY_SIZE],
			id_page,
			id_locked: false,
			write_enable_latch: false,
			busy: false,
			busy_remaining: 0,
			pins: OutPins::IDLE,
			output: true,
			shift_in: 0,
			bits_in: 0,
			received: Vec::new(),
			out_byte: 0,
			out_bits: 0,
			out_pending: 0,
			out_index: 0,
			clock_edges: 0,
			status_reads: 0,
		}
	}

	pub fn with_memory(config: SimConfig, memory: &[u8]) -> Self {
		let mut eeprom = Self::new(config);
		let len = std::cmp::min(memory.len(), MEMORY_SIZE);
		eeprom.memory[..len].copy_from_slice(&memory[..len]);
		eeprom
	}

	pub fn memory(&self) -> &[u8; MEMORY_SIZE] {
		&self.memory
	}

	pub fn memory_mut(&mut self) -> &mut [u8; MEMORY_SIZE] {
		&mut self.memory
	}

	pub fn id_page(&self) -> &Page {
		&self.id_page
	}

	pub fn is_locked(&self) -> bool {
		self.id_locked
	}

	pub fn is_busy(&self) -> bool {
		self.busy
	}

	pub fn is_selected(&self) -> bool {
		self.pins.chip_select
	}

	/// rising CLK edges seen while selected
	pub fn clock_edges(&self) -> usize {
		self.clock_edges
	}

	/// complete status register bytes shifted out
	pub fn status_reads(&self) -> usize {
		self.status_reads
	}

	/// current level of the device's data output
	pub fn data_out(&self) -> bool {
		self.output
	}

	/// apply new line levels, as driven by the bus master
	pub fn drive(&mut self, pins: OutPins) {
		let prev = self.pins;
		self.pins = pins;

		match (prev.chip_select, pins.chip_select) {
			(false, false) => (),
			(false, true) => self.select(),
			(true, false) => self.release(),
			(true, true) => {
				if !prev.clock && pins.clock {
					self.rising_edge(pins.data);
				} else if prev.clock && !pins.clock {
					self.falling_edge();
				}
			},
		}
	}

	fn reset_transaction(&mut self) {
		self.shift_in = 0;
		self.bits_in = 0;
		self.received.clear();
		self.out_byte = 0;
		self.out_bits = 0;
		self.out_pending = 0;
		self.out_index = 0;
		self.output = true;
	}

	fn select(&mut self) {
		self.reset_transaction();
	}

	fn release(&mut self) {
		self.run_instruction();
		self.reset_transaction();
	}

	fn instruction(&self) -> Option<Opcode> {
		self.received.first().and_then(|code| Opcode::from_code(*code))
	}

	fn address(&self) -> Option<u16> {
		if self.received.len() < 3 {
			return None;
		}
		Some((self.received[1] as u16) << 8 | self.received[2] as u16)
	}

	fn status(&self) -> u8 {
		let mut status = 0;
		if self.busy { status |= STATUS_BUSY; }
		if self.write_enable_latch { status |= STATUS_WRITE_ENABLE_LATCH; }
		status
	}

	fn rising_edge(&mut self, data: bool) {
		self.clock_edges += 1;

		self.shift_in = (self.shift_in << 1) | (data as u8);
		self.bits_in += 1;
		if 8 == self.bits_in {
			if self.received.len() < 3 + MEMORY_SIZE {
				self.received.push(self.shift_in);
			}
			self.shift_in = 0;
			self.bits_in = 0;
		}

		if self.out_pending > 0 {
			self.out_pending -= 1;
			if 0 == self.out_pending {
				self.output_completed();
			}
		}
	}

	fn falling_edge(&mut self) {
		if 0 == self.out_bits {
			match self.next_output_byte() {
				Some(byte) => {
					self.out_byte = byte;
					self.out_bits = 8;
					self.out_pending = 8;
				},
				None => {
					self.output = true;
					return;
				},
			}
		}
		self.output = 0 != self.out_byte & 0x80;
		self.out_byte <<= 1;
		self.out_bits -= 1;
	}

	fn next_output_byte(&mut self) -> Option<u8> {
		if 0 != self.bits_in {
			return None;
		}
		let op = self.instruction()?;
		if op == Opcode::ReadStatus {
			return Some(self.status());
		}
		if self.busy {
			return None;
		}
		let address = self.address()?;
		let index = self.out_index;
		let byte = match op {
			Opcode::Read => {
				self.memory[((address as usize & (MEMORY_SIZE - 1)) + index) % MEMORY_SIZE]
			},
			Opcode::ReadId if 0 != address & ID_LOCK_ADDRESS => {
				self.id_locked as u8
			},
			Opcode::ReadId => {
				self.id_page[((address as usize) + index) % PAGE_SIZE]
			},
			_ => return None,
		};
		self.out_index += 1;
		Some(byte)
	}

	fn output_completed(&mut self) {
		if self.instruction() != Some(Opcode::ReadStatus) {
			return;
		}
		self.status_reads += 1;
		if self.busy && !self.config.stuck_busy {
			if self.busy_remaining <= 1 {
				self.busy = false;
				self.busy_remaining = 0;
			} else {
				self.busy_remaining -= 1;
			}
		}
	}

	fn start_write_cycle(&mut self) {
		self.write_enable_latch = false;
		if self.config.write_busy_polls > 0 || self.config.stuck_busy {
			self.busy = true;
			self.busy_remaining = self.config.write_busy_polls;
		}
	}

	fn write_allowed(&self, op: Opcode) -> bool {
		if self.write_enable_latch || !self.config.require_write_enable {
			true
		} else {
			debug!("sim: {} without write enable latch ignored", op);
			false
		}
	}

	// runs when select is released
	fn run_instruction(&mut self) {
		let op = match self.instruction() {
			Some(op) => op,
			None => {
				if let Some(code) = self.received.first() {
					debug!("sim: unknown instruction 0x{:02x} ignored", code);
				}
				return;
			},
		};
		if 0 != self.bits_in {
			debug!("sim: {} aborted, select released after {} stray bits", op, self.bits_in);
			return;
		}
		if self.busy && op != Opcode::ReadStatus {
			debug!("sim: {} ignored while busy", op);
			return;
		}

		match op {
			Opcode::WriteEnable => {
				if 1 == self.received.len() {
					self.write_enable_latch = true;
				}
			},
			Opcode::Write => {
				let address = match self.address() {
					Some(a) if self.received.len() > 3 => a as usize & (MEMORY_SIZE - 1),
					_ => return,
				};
				if !self.write_allowed(op) {
					return;
				}
				// writes wrap around inside the addressed page
				let page = address & !(PAGE_SIZE - 1);
				let offset = address % PAGE_SIZE;
				for (i, byte) in self.received[3..].iter().enumerate() {
					self.memory[page + (offset + i) % PAGE_SIZE] = *byte;
				}
				self.start_write_cycle();
			},
			Opcode::WriteId => {
				let address = match self.address() {
					Some(a) if self.received.len() > 3 => a,
					_ => return,
				};
				if !self.write_allowed(op) {
					return;
				}
				if 0 != address & ID_LOCK_ADDRESS {
					if 0 == self.received[3] & ID_LOCK_REQUEST {
						return;
					}
					self.id_locked = true;
				} else {
					if self.id_locked {
						debug!("sim: ID page locked, write ignored");
						return;
					}
					let offset = address as usize % PAGE_SIZE;
					for (i, byte) in self.received[3..].iter().enumerate() {
						self.id_page[(offset + i) % PAGE_SIZE] = *byte;
					}
				}
				self.start_write_cycle();
			},
			Opcode::Read | Opcode::ReadId | Opcode::ReadStatus => (),
		}
	}
}

impl Hardware for SimEeprom {
	fn set_pins(&mut self, pins: OutPins) {
		self.drive(pins);
	}

	fn read_pin(&mut self) -> bool {
		self.output
	}

	fn busy_poll_limit(&self) -> usize {
		self.config.busy_poll_limit
	}
}
