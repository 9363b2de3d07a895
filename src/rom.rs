//! ROM image loading and the LoROM internal header.

use std::{fs, io, path::PathBuf};

use crate::memory::read_word;

pub const HEADER_TITLE: usize = 0x7FC0;
pub const HEADER_TITLE_LEN: usize = 21;
pub const HEADER_COMPLEMENT: usize = 0x7FDC;
pub const HEADER_CHECKSUM: usize = 0x7FDE;

pub struct Rom {
    pub path: PathBuf,
    pub data: Vec<u8>,
}

impl Rom {
    pub fn load<P: Into<PathBuf>>(path: P) -> io::Result<Self> {
        let path = path.into();
        let data = fs::read(&path)?;
        if data.len() < 0x8000 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "{} is too short ({} bytes) to carry a LoROM header",
                    path.display(),
                    data.len()
                ),
            ));
        }
        Ok(Rom { path, data })
    }

    /// The internal game title, padded with spaces in the header.
    pub fn title(&self) -> String {
        String::from_utf8_lossy(&self.data[HEADER_TITLE..HEADER_TITLE + HEADER_TITLE_LEN])
            .trim_end()
            .to_string()
    }

    /// The 16-bit sum of every byte in the image, old checksum included.
    pub fn checksum(&self) -> u16 {
        self.data
            .iter()
            .fold(0u16, |sum, &b| sum.wrapping_add(b as u16))
    }

    pub fn header_checksum(&self) -> io::Result<u16> {
        read_word(&self.data, HEADER_CHECKSUM)
    }

    /// Recomputes the checksum and complement and rewrites the header
    /// words when they are stale. Returns the new pair, or `None` if the
    /// header was already current.
    pub fn fix_checksum(&mut self) -> io::Result<Option<(u16, u16)>> {
        let checksum = self.checksum();
        if checksum == self.header_checksum()? {
            return Ok(None);
        }
        let complement = checksum ^ 0xFFFF;
        self.data[HEADER_COMPLEMENT..HEADER_COMPLEMENT + 2]
            .copy_from_slice(&complement.to_le_bytes());
        self.data[HEADER_CHECKSUM..HEADER_CHECKSUM + 2].copy_from_slice(&checksum.to_le_bytes());
        Ok(Some((checksum, complement)))
    }

    pub fn save(&self) -> io::Result<()> {
        fs::write(&self.path, &self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_rom(data: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(data).unwrap();
        file
    }

    #[test]
    fn rejects_images_without_room_for_a_header() {
        let file = write_rom(&[0u8; 0x100]);
        assert!(Rom::load(file.path()).is_err());
    }

    #[test]
    fn reads_the_internal_title() {
        let mut data = vec![0u8; 0x8000];
        data[HEADER_TITLE..HEADER_TITLE + 9].copy_from_slice(b"FIREEMBLE");
        data[HEADER_TITLE + 9..HEADER_TITLE + HEADER_TITLE_LEN].fill(b' ');
        let file = write_rom(&data);
        let rom = Rom::load(file.path()).unwrap();
        assert_eq!(rom.title(), "FIREEMBLE");
    }

    #[test]
    fn fix_checksum_rewrites_stale_header_words() {
        let mut data = vec![0u8; 0x8000];
        data[0x100] = 0x12;
        data[0x101] = 0x34;
        let file = write_rom(&data);
        let mut rom = Rom::load(file.path()).unwrap();

        let (checksum, complement) = rom.fix_checksum().unwrap().unwrap();
        assert_eq!(checksum, 0x12 + 0x34);
        assert_eq!(complement, checksum ^ 0xFFFF);
        assert_eq!(rom.header_checksum().unwrap(), checksum);
    }

    #[test]
    fn fix_checksum_leaves_a_current_header_alone() {
        // An all-zero image sums to zero, matching its zeroed header word.
        let data = vec![0u8; 0x8000];
        let file = write_rom(&data);
        let mut rom = Rom::load(file.path()).unwrap();
        assert_eq!(rom.fix_checksum().unwrap(), None);
    }
}
