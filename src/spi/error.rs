use failure::Fail;

#[derive(Clone, Debug, PartialEq, Eq, Fail)]
pub enum DeviceError {
	#[fail(display = "device still busy after {} status polls", polls)]
	NotReady { polls: usize },
	#[fail(display = "address 0x{:04x} is outside of the 1024 byte memory", address)]
	AddressOutOfRange { address: u32 },
	#[fail(display = "address 0x{:04x} is not aligned to a 32 byte page", address)]
	UnalignedPage { address: u32 },
	#[fail(display = "serial {:?} too long: {} bytes (at most {} fit)", serial, len, max)]
	SerialTooLong { serial: String, len: usize, max: usize },
	#[fail(display = "serial {:?} contains non-ASCII or NUL characters", serial)]
	SerialNotAscii { serial: String },
}
