//! Fixes 64tass' VICE symbol output so bsnes-plus accepts it.
//!
//! Addresses are padded to six digits, leading periods are stripped from
//! labels, and the scope separator changes from colon to period. The file
//! is rewritten sorted.

use std::{fs, io, path::Path};

fn fix_line(line: &str) -> io::Result<String> {
    let mut parts = line.split_whitespace();
    let (Some(_), Some(address), Some(label)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Malformed symbol line: {:?}", line),
        ));
    };

    let value = u32::from_str_radix(address, 16).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Bad address {:?} in symbol line", address),
        )
    })?;
    let label = label.trim_start_matches('.').replace(':', ".");

    Ok(format!("al {:06X} {}", value, label))
}

pub fn run(path: &Path) -> io::Result<()> {
    let text = fs::read_to_string(path)?;

    let mut fixed = Vec::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        fixed.push(fix_line(line)?);
    }
    fixed.sort();

    fs::write(path, fixed.join("\n") + "\n")
}
