/// Protocol for ST M95080-D style SPI EEPROMs (1024 bytes, 32-byte pages)
///
/// Every transaction starts by pulling the (active low) select line, then
/// shifts bits MSB first; the device samples DATA on the rising CLK edge and
/// drives its output after the falling edge.
///
/// Transactions:
/// - 8-bit instruction
/// - optional 16-bit address (bits 0..=9: byte offset, bit 10: ID page function)
/// - write burst (up to 32 bytes) or read burst (up to 32 bytes)
/// - select released again; write instructions start their internal write
///   cycle on release, and the device stays BUSY until it completes
///
/// Instructions:
/// - 0x06: WREN (set write enable latch), no data
/// - 0x05: RDSR (read status register); bit 0 = BUSY, bit 1 = WEL
/// - 0x03: READ @ address, recv data
/// - 0x02: WRITE @ address, send data (within one page)
/// - 0x83 @ A10 = 0: RDID (read identification page), recv data
/// - 0x82 @ A10 = 0: WRID (write identification page), send data
/// - 0x83 @ A10 = 1: RDLS (read lock status), recv one byte
/// - 0x82 @ A10 = 1: LID (lock identification page), send 0x02

mod error;
mod hardware;
mod low_level;
mod operations;
mod transaction;

pub use self::error::DeviceError;

pub use self::hardware::{
	DEFAULT_BUSY_POLLS,
	Hardware,
	OutPins,
	reliable_sleep,
};

pub use self::low_level::LowLevel;

pub use self::operations::{
	DeviceId,
	DeviceOperations,
	LockStatus,
	Page,
	ID_LOCK_ADDRESS,
	MEMORY_SIZE,
	PAGE_SIZE,
};

pub use self::transaction::{
	BURST_LIMIT,
	Opcode,
	ReadBuffer,
	Transaction,
	TransactionEngine,
};
