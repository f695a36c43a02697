/// Simulated hardware: an M95080-style EEPROM driven bit by bit, and the
/// Kawari register window it hangs off.

mod eeprom;
mod kawari;

pub use self::eeprom::{
	SimConfig,
	SimEeprom,
	FACTORY_ID,
};

pub use self::kawari::{
	KawariSim,
	SIM_VARIANT,
	SIM_VERSION,
};
