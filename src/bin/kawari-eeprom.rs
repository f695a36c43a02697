#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate kawari_eeprom;
use kawari_eeprom::*;

use std::fs;
use std::io::{
	self,
	BufRead,
	Write,
};
use std::process::exit;
use std::time::Duration;

use kawari_eeprom::kawari::{
	DeviceImage,
	Kawari,
	RegisterAccess,
};
use kawari_eeprom::spi::{
	DeviceOperations,
	MEMORY_SIZE,
};

fn parse_number(value: &str) -> AResult<u64> {
	let value = value.trim();
	let parsed = if value.starts_with("0x") || value.starts_with("0X") {
		u64::from_str_radix(&value[2..], 16)
	} else {
		value.parse::<u64>()
	};
	Ok(parsed?)
}

// decimal or 0x-prefixed hex, at most `max`
fn get_number(matches: &clap::ArgMatches, name: &str, max: u64) -> AResult<u64> {
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	let value = parse_number(param).map_err(|e| {
		let msg = format!("invalid parameter {}: {:?}: {}", name, param, e);
		failure::Error::from(e.context(msg))
	})?;
	ensure!(value <= max, "parameter {} out of range: {} (max {})", name, param, max);
	Ok(value)
}

fn get_optional_number(matches: &clap::ArgMatches, name: &str, max: u64) -> AResult<Option<u64>> {
	if matches.is_present(name) {
		Ok(Some(get_number(matches, name, max)?))
	} else {
		Ok(None)
	}
}

/// `--yes` or an interactive "yes"
fn confirm(matches: &clap::ArgMatches, question: &str) -> AResult<bool> {
	if matches.is_present("yes") {
		info!("{} (confirmed by --yes)", question);
		return Ok(true);
	}
	eprint!("{} (type yes): ", question);
	io::stderr().flush()?;
	let mut answer = String::new();
	io::stdin().lock().read_line(&mut answer)?;
	if answer.trim() == "yes" {
		Ok(true)
	} else {
		eprintln!("Aborted");
		Ok(false)
	}
}

fn load_image(path: &str) -> AResult<DeviceImage> {
	let data = fs::read(path).map_err(|e| {
		let e = failure::Error::from(e);
		let msg = format!("couldn't load image {}: {}", path, e);
		failure::Error::from(e.context(msg))
	})?;
	DeviceImage::from_slice(&data)
}

fn print_page(data: &[u8]) {
	for (i, chunk) in data.chunks(8).enumerate() {
		print!("{:04x}:", i * 8);
		for b in chunk {
			print!(" {:02x}", b);
		}
		println!();
	}
}

fn device_id<R: RegisterAccess>(dev: &mut Kawari<R>) -> AResult<()> {
	println!("{}", dev.read_device_id()?);
	Ok(())
}

fn info<R: RegisterAccess>(dev: &mut Kawari<R>) -> AResult<()> {
	let model = dev.chip_model();
	println!("Kawari Version : {}", dev.version());
	println!("Variant        : {}", dev.variant());
	println!("Chip model     : {} ({})", kawari::chip_model_name(model), model);
	println!("SPI_REG        : {:?}", dev.spi_status());
	println!("EEPROM         : {}", dev.read_device_id()?);
	println!("ID page        : {}", dev.read_lock_status()?);
	Ok(())
}

fn read<R: RegisterAccess>(dev: &mut Kawari<R>, sub_m: &clap::ArgMatches) -> AResult<()> {
	let image = kawari::read_image(dev)?;
	if sub_m.is_present("raw") {
		io::stdout().write_all(&image)?;
	} else {
		print!("{:?}", image);
	}
	Ok(())
}

fn write_byte<R: RegisterAccess>(dev: &mut Kawari<R>, matches: &clap::ArgMatches, sub_m: &clap::ArgMatches) -> AResult<()> {
	let address = get_number(sub_m, "ADDRESS", MEMORY_SIZE as u64 - 1)? as u16;
	let value = get_number(sub_m, "VALUE", 0xff)? as u8;
	if !confirm(matches, &format!("Write 0x{:02x} to 0x{:04x}?", value, address))? {
		return Ok(());
	}
	dev.write_enable()?;
	dev.write_byte(address, value)?;
	info!("Written");
	Ok(())
}

fn erase<R: RegisterAccess>(dev: &mut Kawari<R>, matches: &clap::ArgMatches) -> AResult<()> {
	if !confirm(matches, "Erase all EEPROM pages?")? {
		return Ok(());
	}
	kawari::erase_all(dev)
}

fn write_image<R: RegisterAccess>(dev: &mut Kawari<R>, matches: &clap::ArgMatches, sub_m: &clap::ArgMatches) -> AResult<()> {
	let path = sub_m.value_of("FILE").unwrap_or("");
	let image = load_image(path)?;
	if !confirm(matches, &format!("Overwrite EEPROM with {}?", path))? {
		return Ok(());
	}
	kawari::write_image(dev, &image)
}

fn verify<R: RegisterAccess>(dev: &mut Kawari<R>) -> AResult<()> {
	let report = kawari::verify(dev)?;
	match report.active_bank {
		Some(bank) => println!("Booted from bank {}", bank),
		None => println!("Invalid bank selector 0x{:02x}", report.bank_selector),
	}
	for m in &report.registers {
		println!("{}", m);
	}
	for m in &report.image {
		println!("{}", m);
	}
	if !report.is_clean() {
		println!("{} mismatches", report.mismatches());
		exit(2);
	}
	println!("Verified");
	Ok(())
}

fn id_page<R: RegisterAccess>(dev: &mut Kawari<R>) -> AResult<()> {
	print_page(&dev.read_id_page()?);
	Ok(())
}

fn serial<R: RegisterAccess>(dev: &mut Kawari<R>, matches: &clap::ArgMatches, sub_m: &clap::ArgMatches) -> AResult<()> {
	match sub_m.subcommand() {
		("get", _) => {
			println!("Serial: {}", kawari::read_serial(dev)?);
			Ok(())
		},
		("set", Some(sub_sub_m)) => {
			let serial = sub_sub_m.value_of("SERIAL").unwrap_or("");
			// reject before asking
			kawari::encode_serial(&[0u8; 32], serial)?;
			if !confirm(matches, &format!("Okay to set serial: {}?", serial))? {
				return Ok(());
			}
			kawari::set_serial(dev, serial)?;
			println!("Written.");
			Ok(())
		},
		("lock", _) => {
			eprintln!("WARNING: This is permanent");
			if !confirm(matches, "Proceed to lock ID page?")? {
				return Ok(());
			}
			kawari::lock_serial(dev)?;
			println!("Done");
			Ok(())
		},
		("", _) => bail!("no subcommand"),
		(cmd, _) => bail!("not implemented subcommand for 'serial' {:?}", cmd),
	}
}

fn lock_status<R: RegisterAccess>(dev: &mut Kawari<R>) -> AResult<()> {
	println!("Lock status: {}", dev.read_lock_status()?);
	Ok(())
}

fn run<R: RegisterAccess>(dev: &mut Kawari<R>, matches: &clap::ArgMatches) -> AResult<()> {
	match matches.subcommand() {
		("device_id", _) => device_id(dev),
		("info", _) => info(dev),
		("read", Some(sub_m)) => read(dev, sub_m),
		("write_byte", Some(sub_m)) => write_byte(dev, matches, sub_m),
		("erase", _) => erase(dev, matches),
		("write_image", Some(sub_m)) => write_image(dev, matches, sub_m),
		("verify", _) => verify(dev),
		("id_page", _) => id_page(dev),
		("serial", Some(sub_m)) => serial(dev, matches, sub_m),
		("lock_status", _) => lock_status(dev),
		("", _) => bail!("no subcommand"),
		(cmd, _) => bail!("not implemented subcommand {:?}", cmd),
	}
}

fn configure<R: RegisterAccess>(regs: R, matches: &clap::ArgMatches) -> AResult<Kawari<R>> {
	let mut dev = Kawari::open(regs)?;
	if let Some(polls) = get_optional_number(matches, "busy_polls", std::u32::MAX as u64)? {
		ensure!(polls > 0, "--busy-polls must be at least 1");
		dev.set_busy_poll_limit(polls as usize);
	}
	if let Some(ns) = get_optional_number(matches, "edge_delay_ns", 1_000_000_000)? {
		dev.set_edge_delay(if 0 == ns { None } else { Some(Duration::from_nanos(ns)) });
	}
	Ok(dev)
}

fn simulated_image(matches: &clap::ArgMatches) -> AResult<DeviceImage> {
	match matches.value_of("image") {
		Some(path) => load_image(path),
		None => {
			let mut image = kawari::GOLDEN.clone();
			image.set(0, kawari::CHIP_MODEL, 0);
			image.set(0, kawari::EEPROM_BANK, 0);
			Ok(image)
		},
	}
}

fn main_app() -> AResult<()> {
	let matches = clap_app!(@app (app_from_crate!())
		(@setting SubcommandRequiredElseHelp)
		(global_setting: clap::AppSettings::VersionlessSubcommands)
		(@arg device: -d --device +takes_value "device file to map the VIC-II registers from (default: /dev/mem)")
		(@arg offset: -o --offset +takes_value "offset of $d000 in the device file (default: 0xd000)")
		(@arg simulate: -s --simulate "talk to a simulated Kawari instead of hardware")
		(@arg image: --image +takes_value requires[simulate] "EEPROM contents of the simulated Kawari (1024 bytes)")
		(@arg busy_polls: --("busy-polls") +takes_value "status polls before giving up on a write cycle (default: 65536)")
		(@arg edge_delay_ns: --("edge-delay-ns") +takes_value "extra delay after every line change in ns (default: 0)")
		(@arg yes: -y --yes "don't ask before destructive actions")
		(@subcommand device_id =>
			(alias: "device-id")
			(about: "show manufacturer, family and density of the EEPROM")
		)
		(@subcommand info =>
			(about: "show Kawari version, variant, chip model and EEPROM status")
		)
		(@subcommand read =>
			(about: "dump all EEPROM pages")
			(@arg raw: -r --raw "write binary image to stdout instead of hexdump")
		)
		(@subcommand write_byte =>
			(alias: "write-byte")
			(about: "write a single byte")
			(@arg ADDRESS: +required "address (0..1023)")
			(@arg VALUE: +required "value (0..255)")
		)
		(@subcommand erase =>
			(about: "write 0xff to every page")
		)
		(@subcommand write_image =>
			(alias: "write-image")
			(about: "write a 1024 byte image and verify it")
			(@arg FILE: +required "image file")
		)
		(@subcommand verify =>
			(about: "check live registers against the EEPROM and the EEPROM against the init image")
		)
		(@subcommand id_page =>
			(alias: "id-page")
			(about: "dump the identification page")
		)
		(@subcommand serial =>
			(about: "serial number in the identification page")
			(@setting SubcommandRequiredElseHelp)
			(@subcommand get =>
				(about: "show serial")
			)
			(@subcommand set =>
				(about: "set serial")
				(@arg SERIAL: +required "ASCII, at most 28 characters")
			)
			(@subcommand lock =>
				(about: "lock the identification page permanently")
			)
		)
		(@subcommand lock_status =>
			(alias: "lock-status")
			(about: "show whether the identification page is locked")
		)
	).get_matches();

	if matches.is_present("simulate") {
		let image = simulated_image(&matches)?;
		info!("Using simulated Kawari");
		let mut dev = configure(sim::KawariSim::with_image(&image), &matches)?;
		return run(&mut dev, &matches);
	}

	let path = matches.value_of("device").unwrap_or("/dev/mem");
	let offset = get_optional_number(&matches, "offset", std::u64::MAX)?.unwrap_or(0xd000);
	let regs = host::open_registers(path, offset)?;
	let mut dev = configure(regs, &matches)?;
	run(&mut dev, &matches)
}

fn main() {
	env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

	if let Err(e) = main_app() {
		error!("Error: {}", e);
		exit(1);
	}
}
