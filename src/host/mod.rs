mod mapped;

pub use self::mapped::{
	open_registers,
	MappedRegisters,
	WINDOW_SIZE,
};
