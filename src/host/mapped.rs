use std::ffi::CString;
use std::fs;
use std::io;
use std::os::unix::io::FromRawFd;
use std::path::Path;
use std::ptr;

use libc::{
	MAP_SHARED,
	O_CLOEXEC,
	O_RDWR,
	O_SYNC,
	PROT_READ,
	PROT_WRITE,
	_SC_PAGESIZE,
	c_void,
	mmap,
	munmap,
	off_t,
	open,
	sysconf,
};

use crate::kawari::{
	Register,
	RegisterAccess,
};

/// bytes of the VIC-II register window (0xd000..0xd040)
pub const WINDOW_SIZE: usize = 0x40;

/// VIC-II register window mapped from a device file (e.g. `/dev/mem` or a
/// UIO node).
///
/// User space can't mask interrupts, so the mask hooks stay no-ops; use an
/// edge delay if the bus gets preempted.
#[derive(Debug)]
pub struct MappedRegisters {
	ptr: ptr::NonNull<u8>, // start of the mapping, not of the window
	len: usize,
	window: usize, // offset of the window inside the mapping
}

impl Drop for MappedRegisters {
	fn drop(&mut self) {
		unsafe {
			let res = munmap(
				self.ptr.as_ptr() as *mut c_void,
				self.len,
			);
			if 0 != res {
				panic!("munmap failed: {}", io::Error::last_os_error());
			}
		}
	}
}

impl MappedRegisters {
	fn register_ptr(&self, register: Register) -> *mut u8 {
		let offset = self.window + register.offset();
		assert!(offset < self.len);
		unsafe { self.ptr.as_ptr().add(offset) }
	}
}

impl RegisterAccess for MappedRegisters {
	fn read(&mut self, register: Register) -> u8 {
		unsafe { ptr::read_volatile(self.register_ptr(register)) }
	}

	fn write(&mut self, register: Register, value: u8) {
		unsafe { ptr::write_volatile(self.register_ptr(register), value) }
	}
}

fn page_size() -> usize {
	let size = unsafe { sysconf(_SC_PAGESIZE) };
	if size <= 0 { 4096 } else { size as usize }
}

// TODO: exclusive open / file locking?
fn inner_open(path: &Path, offset: u64) -> io::Result<MappedRegisters> {
	let page = page_size() as u64;
	let map_offset = offset & !(page - 1);
	let window = (offset - map_offset) as usize;
	let len = window + WINDOW_SIZE;

	let c_path = CString::new(path.to_string_lossy().into_owned())?;

	let fd = unsafe { open(c_path.as_ptr(), O_RDWR | O_SYNC | O_CLOEXEC) };
	if -1 == fd {
		return Err(io::Error::last_os_error());
	}
	// closes the fd again; the mapping stays valid
	let _f = unsafe { fs::File::from_raw_fd(fd) };

	let area = unsafe {
		mmap(
			ptr::null_mut(),
			len,
			PROT_READ | PROT_WRITE,
			MAP_SHARED,
			fd,
			map_offset as off_t,
		)
	};

	if area as usize == !0usize {
		return Err(io::Error::last_os_error());
	}
	match ptr::NonNull::new(area as *mut u8) {
		None => Err(io::Error::new(io::ErrorKind::Other, "mmap returned NULL")),
		Some(area) => Ok(MappedRegisters {
			ptr: area,
			len,
			window,
		}),
	}
}

/// Map the register window starting at `offset` (the address of $d000) in
/// the device file at `path`.
pub fn open_registers<P: AsRef<Path>>(path: P, offset: u64) -> crate::AResult<MappedRegisters> {
	let path = path.as_ref();
	with_context!(("couldn't map registers at 0x{:x} of {}", offset, path.display()), {
		let regs = inner_open(path, offset)?;
		info!("Mapped VIC-II registers at 0x{:x} of {}", offset, path.display());
		Ok(regs)
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn maps_unaligned_window_of_regular_file() {
		let path = std::env::temp_dir().join(format!("kawari-eeprom-mapped-{}", std::process::id()));
		{
			let mut f = fs::File::create(&path).unwrap();
			f.write_all(&vec![0u8; 0x3000]).unwrap();
		}

		{
			let mut regs = open_registers(&path, 0x1000 + 0x7c0).unwrap();
			regs.write(Register::VideoMemLo, 0x5a);
			assert_eq!(regs.read(Register::VideoMemLo), 0x5a);
			assert_eq!(regs.read(Register::VideoMemFlags), 0);
		}

		let data = fs::read(&path).unwrap();
		fs::remove_file(&path).unwrap();
		assert_eq!(data[0x1000 + 0x7c0 + 0x39], 0x5a);
	}

	#[test]
	fn missing_device_reports_path() {
		let e = open_registers("/nonexistent/kawari-regs", 0xd000).unwrap_err();
		assert!(format!("{}", e).contains("/nonexistent/kawari-regs"), "{}", e);
	}
}
