//! Firmware version probes.
//!
//! Each probe shells out to a vendor or system tool (`ipmitool`, `pcimem`,
//! `nvflash_mfg`, ...) and normalizes the output into the version string
//! format used by the expected-version manifest.
//!
//! # Graceful Degradation
//!
//! - Missing/invalid/unexpected parameters: `ProbeError` before any command runs
//! - Command failures: `ProbeError::Command` from the runner
//! - Short or malformed output: `ProbeError::Parse` with the offending context
//!
//! No function in this module will panic.

use crate::platform::CommandRunner;
use crate::probes::{ProbeArgs, ProbeError, ProbeFn, ProbeId};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static DEV_BUS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{2}:[0-9a-fA-F]{2}\.[0-7]$").expect("dev_bus pattern is valid")
});

type ReadFn = fn(&dyn CommandRunner, &ProbeArgs) -> Result<String, ProbeError>;

/// All real probes, bound to `runner`.
pub fn system_probes(runner: Arc<dyn CommandRunner>) -> Vec<(ProbeId, ProbeFn)> {
    let table: [(ProbeId, ReadFn); 9] = [
        (ProbeId::Bmc, read_bmc),
        (ProbeId::Sbios, read_sbios),
        (ProbeId::MbFpga, read_mb_fpga),
        (ProbeId::MidFpga, read_mid_fpga),
        (ProbeId::Psu, read_psu),
        (ProbeId::Plx, read_plx),
        (ProbeId::Os, read_os),
        (ProbeId::HostName, read_hostname),
        (ProbeId::Spi, read_spi),
    ];

    table
        .into_iter()
        .map(|(id, read)| {
            let runner = Arc::clone(&runner);
            let probe: ProbeFn = Box::new(move |args: &ProbeArgs| {
                check_args(id, args)?;
                read(runner.as_ref(), args)
            });
            (id, probe)
        })
        .collect()
}

fn check_args(id: ProbeId, args: &ProbeArgs) -> Result<(), ProbeError> {
    match args.keys().find(|k| !id.params().contains(&k.as_str())) {
        Some(key) => Err(ProbeError::UnexpectedArg(key.clone())),
        None => Ok(()),
    }
}

fn required<'a>(args: &'a ProbeArgs, name: &str) -> Result<&'a str, ProbeError> {
    args.get(name)
        .map(String::as_str)
        .ok_or_else(|| ProbeError::MissingArg(name.to_string()))
}

fn invalid(name: &str, value: &str) -> ProbeError {
    ProbeError::InvalidArg {
        name: name.to_string(),
        value: value.to_string(),
    }
}

fn token<'a>(tokens: &[&'a str], i: usize, context: &str) -> Result<&'a str, ProbeError> {
    tokens.get(i).copied().ok_or_else(|| ProbeError::Parse {
        context: context.to_string(),
        message: format!("expected at least {} fields, got {}", i + 1, tokens.len()),
    })
}

fn hex(tok: &str, context: &str) -> Result<u64, ProbeError> {
    let digits = tok.trim_start_matches("0x");
    u64::from_str_radix(digits, 16).map_err(|_| ProbeError::Parse {
        context: context.to_string(),
        message: format!("'{}' is not a hex byte", tok),
    })
}

fn read_bmc(runner: &dyn CommandRunner, args: &ProbeArgs) -> Result<String, ProbeError> {
    let pos = required(args, "pos")?;
    let select = match pos {
        "0" => "0x01",
        "1" => "0x02",
        _ => return Err(invalid("pos", pos)),
    };
    let out = runner.run(&format!("ipmitool raw 0x32 0x8f 0x09 {}", select))?;
    parse_bmc(&out)
}

/// `major minor build` → `major.minor.<build as decimal>`
pub fn parse_bmc(out: &str) -> Result<String, ProbeError> {
    let tokens: Vec<&str> = out.split_whitespace().collect();
    let major = token(&tokens, 0, "BMC version")?;
    let minor = token(&tokens, 1, "BMC version")?;
    let build = hex(token(&tokens, 2, "BMC version")?, "BMC version")?;
    Ok(format!("{}.{}.{}", major, minor, build))
}

fn read_sbios(runner: &dyn CommandRunner, args: &ProbeArgs) -> Result<String, ProbeError> {
    let pos = required(args, "pos")?;
    if pos != "0" && pos != "1" {
        return Err(invalid("pos", pos));
    }
    let out = runner.run(&format!("ipmitool raw 0x30 0x24 {}", pos))?;
    parse_sbios(&out)
}

/// Two hex bytes → `major.minor` in decimal
pub fn parse_sbios(out: &str) -> Result<String, ProbeError> {
    let tokens: Vec<&str> = out.split_whitespace().collect();
    let major = hex(token(&tokens, 0, "SBIOS version")?, "SBIOS version")?;
    let minor = hex(token(&tokens, 1, "SBIOS version")?, "SBIOS version")?;
    Ok(format!("{}.{}", major, minor))
}

fn read_mb_fpga(runner: &dyn CommandRunner, _args: &ProbeArgs) -> Result<String, ProbeError> {
    let out = runner.run("ipmitool raw 0x30 0x0f 0x00")?;
    parse_mb_fpga(&out)
}

pub fn parse_mb_fpga(out: &str) -> Result<String, ProbeError> {
    let tokens: Vec<&str> = out.split_whitespace().collect();
    Ok(format!(
        "{} {}",
        token(&tokens, 1, "MB FPGA version")?,
        token(&tokens, 2, "MB FPGA version")?
    ))
}

fn read_mid_fpga(runner: &dyn CommandRunner, _args: &ProbeArgs) -> Result<String, ProbeError> {
    let out = runner.run("ipmitool raw 0x30 0x81 2 0x78 2 45")?;
    parse_mid_fpga(&out)
}

pub fn parse_mid_fpga(out: &str) -> Result<String, ProbeError> {
    let tokens: Vec<&str> = out.split_whitespace().collect();
    Ok(format!(
        "{} {}",
        token(&tokens, 0, "MID FPGA version")?,
        token(&tokens, 1, "MID FPGA version")?
    ))
}

/// `(bus, address)` of the PSU at each position.
fn psu_location(pos: &str) -> Option<(&'static str, &'static str)> {
    match pos {
        "0" => Some(("0x03", "0x80")),
        "1" => Some(("0x03", "0x82")),
        "2" => Some(("0x03", "0x84")),
        "3" => Some(("0x04", "0x80")),
        "4" => Some(("0x04", "0x82")),
        "5" => Some(("0x04", "0x84")),
        _ => None,
    }
}

fn read_psu(runner: &dyn CommandRunner, args: &ProbeArgs) -> Result<String, ProbeError> {
    let pos = required(args, "pos")?;
    let (bus, addr) = psu_location(pos).ok_or_else(|| invalid("pos", pos))?;
    let out = runner.run(&format!("ipmitool raw 0x30 0x81 {} {} 0x08 0xe2", bus, addr))?;
    parse_psu(&out)
}

/// Bytes 1..7 are ASCII digits; their low nibbles form `a.b/c.d/e.f`.
pub fn parse_psu(out: &str) -> Result<String, ProbeError> {
    let tokens: Vec<&str> = out.split_whitespace().collect();
    let mut digits = Vec::with_capacity(6);
    for i in 1..7 {
        let tok = token(&tokens, i, "PSU version")?;
        let digit = tok.chars().nth(1).ok_or_else(|| ProbeError::Parse {
            context: "PSU version".to_string(),
            message: format!("'{}' is not a hex byte", tok),
        })?;
        digits.push(digit);
    }
    Ok(format!(
        "{}.{}/{}.{}/{}.{}",
        digits[0], digits[1], digits[2], digits[3], digits[4], digits[5]
    ))
}

fn read_plx(runner: &dyn CommandRunner, args: &ProbeArgs) -> Result<String, ProbeError> {
    let dev_bus = required(args, "dev_bus")?;
    if !DEV_BUS_RE.is_match(dev_bus) {
        return Err(invalid("dev_bus", dev_bus));
    }
    let out = runner.run(&format!(
        "./utils/pcimem /sys/bus/pci/devices/0000:{}/resource0 0x29D b 2>/dev/null",
        dev_bus
    ))?;
    parse_plx(&out)
}

/// The last two characters of pcimem's final line are the major and minor digits.
pub fn parse_plx(out: &str) -> Result<String, ProbeError> {
    let line = out
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .last()
        .ok_or_else(|| ProbeError::Parse {
            context: "PLX version".to_string(),
            message: "pcimem produced no output".to_string(),
        })?;

    let chars: Vec<char> = line.chars().collect();
    if chars.len() < 2 {
        return Err(ProbeError::Parse {
            context: "PLX version".to_string(),
            message: format!("line '{}' is too short", line),
        });
    }
    Ok(format!("{}.{}", chars[chars.len() - 2], chars[chars.len() - 1]))
}

fn read_os(runner: &dyn CommandRunner, _args: &ProbeArgs) -> Result<String, ProbeError> {
    let out = runner.run("cat /etc/diagos-release")?;
    parse_os_release(&out)
}

/// Fourth line of the release file, `KEY="value"`.
pub fn parse_os_release(out: &str) -> Result<String, ProbeError> {
    let line = out.lines().nth(3).ok_or_else(|| ProbeError::Parse {
        context: "diagos-release".to_string(),
        message: "fewer than 4 lines".to_string(),
    })?;
    let (_, value) = line.split_once('=').ok_or_else(|| ProbeError::Parse {
        context: "diagos-release".to_string(),
        message: format!("no '=' in '{}'", line),
    })?;
    Ok(value.trim().trim_matches('"').to_string())
}

fn read_hostname(runner: &dyn CommandRunner, _args: &ProbeArgs) -> Result<String, ProbeError> {
    Ok(runner.run("hostname")?.trim_end().to_string())
}

fn read_spi(runner: &dyn CommandRunner, args: &ProbeArgs) -> Result<String, ProbeError> {
    let index = required(args, "index")?;
    if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("index", index));
    }
    let out = runner.run(&format!("./utils/nvflash_mfg -v -i {}", index))?;
    parse_spi(&out)
}

/// Value of the `Version : ...` line of `nvflash_mfg -v`.
pub fn parse_spi(out: &str) -> Result<String, ProbeError> {
    out.lines()
        .find(|l| l.starts_with("Version"))
        .and_then(|l| l.split(':').nth(1))
        .map(|v| v.trim().to_string())
        .ok_or_else(|| ProbeError::Parse {
            context: "nvflash version".to_string(),
            message: "no Version line found".to_string(),
        })
}
