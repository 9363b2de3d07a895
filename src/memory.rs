//! Bounds-checked reads over raw ROM data and SNES LoROM address mapping.

use std::io;

fn eof(offset: usize, what: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("Not enough bytes at offset {:#X} for {}", offset, what),
    )
}

pub fn read_byte(data: &[u8], offset: usize) -> io::Result<u8> {
    data.get(offset).copied().ok_or_else(|| eof(offset, "byte"))
}

/// Reads a little-endian word.
pub fn read_word(data: &[u8], offset: usize) -> io::Result<u16> {
    match data.get(offset..offset + 2) {
        Some(bytes) => Ok(u16::from_le_bytes([bytes[0], bytes[1]])),
        None => Err(eof(offset, "word")),
    }
}

/// Reads a little-endian long (three bytes, the width of a ROM pointer).
#[allow(dead_code)]
pub fn read_long(data: &[u8], offset: usize) -> io::Result<u32> {
    match data.get(offset..offset + 3) {
        Some(bytes) => Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0])),
        None => Err(eof(offset, "long")),
    }
}

#[allow(dead_code)]
pub fn read_byte_range(data: &[u8], offset: usize, count: usize) -> io::Result<Vec<u8>> {
    match data.get(offset..offset + count) {
        Some(bytes) => Ok(bytes.to_vec()),
        None => Err(eof(offset, "byte range")),
    }
}

pub fn read_word_range(data: &[u8], offset: usize, count: usize) -> io::Result<Vec<u16>> {
    let mut words = Vec::with_capacity(count);
    for i in 0..count {
        words.push(read_word(data, offset + i * 2)?);
    }
    Ok(words)
}

#[allow(dead_code)]
pub fn read_long_range(data: &[u8], offset: usize, count: usize) -> io::Result<Vec<u32>> {
    let mut longs = Vec::with_capacity(count);
    for i in 0..count {
        longs.push(read_long(data, offset + i * 3)?);
    }
    Ok(longs)
}

/// Converts a ROM file offset into its LoROM memory-mapped equivalent.
#[allow(dead_code)]
pub fn lorom(address: u32, fast_rom: bool) -> u32 {
    let mut bank = address / 0x8000;
    if fast_rom {
        bank |= 0x80;
    }
    let offset = (address & 0x7FFF) | 0x8000;
    (bank << 16) | offset
}

/// Converts a LoROM address back into a ROM file offset.
pub fn unlorom(address: u32) -> u32 {
    let bank = (address >> 16) & 0x7F;
    let offset = address & 0x7FFF;
    (bank << 15) | offset
}
