//! Prints the differences between two binaries as paired hexdumps.

use std::{fs, io, path::Path};

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn format_bin(data: &[u8]) -> String {
    let mut s = String::with_capacity(data.len() * 3);
    for (i, b) in data.iter().enumerate() {
        s.push_str(&format!("{:02X}", b));
        s.push(if (i + 1) % 16 == 0 { '\n' } else { ' ' });
    }
    s.trim_end().to_string()
}

pub fn run(first: &Path, second: &Path) -> io::Result<()> {
    let f1 = fs::read(first)?;
    let f2 = fs::read(second)?;

    if f1.len() != f2.len() {
        println!("File lengths do not match:");
        println!("{}: 0x{:06X}", basename(first), f1.len());
        println!("{}: 0x{:06X}", basename(second), f2.len());
    }

    let max_size = f1.len().min(f2.len());
    let mut offset = 0;
    while offset < max_size {
        if f1[offset] == f2[offset] {
            offset += 1;
            continue;
        }

        let mut diff_size = 1;
        while offset + diff_size < max_size && f1[offset + diff_size] != f2[offset + diff_size] {
            diff_size += 1;
        }

        println!("Difference at 0x{:06X}", offset);
        println!("{}:", basename(first));
        println!("{}", format_bin(&f1[offset..offset + diff_size]));
        println!();
        println!("{}:", basename(second));
        println!("{}", format_bin(&f2[offset..offset + diff_size]));
        println!();

        offset += diff_size;
    }

    Ok(())
}
