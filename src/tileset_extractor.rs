//! Assembles map tilesets from their native blocks and renders them.

use std::{
    fs::{self, File},
    io::{self, Write},
    path::Path,
};

use image::RgbaImage;
use serde::Serialize;

use crate::{
    decompress::decompress,
    graphics::{Bpp, Palette, Tile, TILE_DIM},
    memory::{read_byte, read_word_range, unlorom},
    rom::Rom,
};

/// A tileset holds a 16x40 sheet of 8x8 tiles.
const TILES_PER_SET: usize = 640;
/// The config block describes a 32x32 arrangement of 16x16 metatiles.
const METATILES_PER_SIDE: usize = 32;
/// Terrain bytes follow the metatile words inside the config block.
const TERRAIN_OFFSET: usize = 0x2000;
const PALETTES_PER_SET: usize = 8;
const PALETTE_COLORS: usize = 16;

fn terrain_name(terrain: u8) -> Option<&'static str> {
    match terrain {
        0x00 => Some("Map Edge"),
        0x01 => Some("Peak"),
        0x02 => Some("Thicket"),
        0x03 => Some("Cliff"),
        0x04 => Some("Plains"),
        0x05 => Some("Forest"),
        0x06 => Some("Sea"),
        0x07 => Some("River"),
        0x08 => Some("Mountain"),
        0x09 => Some("Sand ('Sandy Land')"),
        0x0A => Some("Castle"),
        0x0B => Some("Fort"),
        0x0C => Some("House"),
        0x0D => Some("Gate"),
        0x0E => Some("--"),
        0x0F => Some("Wasteland"),
        0x10 => Some("Bridge"),
        0x11 => Some("Lake"),
        0x12 => Some("Village"),
        0x13 => Some("Ruins"),
        0x14 => Some("Warehouse?"),
        0x16 => Some("Supply"),
        0x17 => Some("Church"),
        0x18 => Some("House"),
        0x19 => Some("Road"),
        0x1A => Some("Armory"),
        0x1B => Some("Vendor"),
        0x1C => Some("Arena"),
        0x1D => Some("Floor"),
        0x1F => Some("Throne"),
        0x20 => Some("Door"),
        0x21 => Some("Chest"),
        0x22 => Some("Exit"),
        0x23 => Some("Pillar"),
        0x24 => Some("Drawbridge"),
        0x25 => Some("Secret Shop"),
        0x27 => Some("Sand ('Sandy Soil')"),
        0x28 => Some("Floor (Magic)"),
        0x29 => Some("Floor (Magic)"),
        0x2A => Some("Church"),
        0x2B => Some("Chest"),
        _ => None,
    }
}

/// One 8x8 cell of a metatile, unpacked from its config word.
#[derive(Debug, Clone, Copy)]
struct MapTile {
    tile: usize,
    palette: usize,
    xflip: bool,
    yflip: bool,
}

impl MapTile {
    fn from_word(word: u16) -> io::Result<Self> {
        // Tile indices are biased past the text tiles in VRAM.
        let tile = (word as usize & 0x3FF).checked_sub(0x80).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Config word {:#06X} has a tile index below 0x80", word),
            )
        })?;
        Ok(MapTile {
            tile,
            palette: (word as usize >> 10) & 0x7,
            xflip: word & 0x4000 != 0,
            yflip: word & 0x8000 != 0,
        })
    }
}

pub struct MapTileset {
    pub name: String,
    tiles: Vec<Tile>,
    config: Vec<MapTile>,
    terrains: Vec<u8>,
    palettes: Vec<Palette>,
}

impl MapTileset {
    /// Builds a tileset from its three native blocks: the tile sheet, the
    /// metatile config (words, then terrain bytes at +0x2000), and the
    /// palette block.
    pub fn from_bytes(
        name: &str,
        tiledata: &[u8],
        configdata: &[u8],
        palettedata: &[u8],
    ) -> io::Result<Self> {
        let mut tiles = Vec::with_capacity(TILES_PER_SET);
        for i in 0..TILES_PER_SET {
            tiles.push(Tile::from_bytes(
                Bpp::Four,
                tiledata,
                i * Bpp::Four.tile_bytes(),
            )?);
        }

        let side = METATILES_PER_SIDE * 2;
        let mut config = vec![
            MapTile {
                tile: 0,
                palette: 0,
                xflip: false,
                yflip: false,
            };
            side * side
        ];
        let mut terrains = Vec::with_capacity(METATILES_PER_SIDE * METATILES_PER_SIDE);
        for entry in 0..METATILES_PER_SIDE * METATILES_PER_SIDE {
            let x = entry % METATILES_PER_SIDE;
            let y = entry / METATILES_PER_SIDE;
            let words = read_word_range(configdata, entry * 8, 4)?;
            for (corner, &word) in words.iter().enumerate() {
                let m_x = corner / 2;
                let m_y = corner % 2;
                let t_x = x * 2 + m_x;
                let t_y = y * 2 + m_y;
                config[t_y * side + t_x] = MapTile::from_word(word)?;
            }
            terrains.push(read_byte(configdata, TERRAIN_OFFSET + entry)?);
        }

        let mut palettes = Vec::with_capacity(PALETTES_PER_SET);
        for i in 0..PALETTES_PER_SET {
            palettes.push(Palette::from_bytes(
                palettedata,
                PALETTE_COLORS,
                i * PALETTE_COLORS * 2,
            )?);
        }

        Ok(MapTileset {
            name: name.to_string(),
            tiles,
            config,
            terrains,
            palettes,
        })
    }

    /// Renders the full 512x512 composed tileset.
    pub fn to_image(&self) -> RgbaImage {
        let side = METATILES_PER_SIDE * 2;
        let mut image = RgbaImage::new(
            (side * TILE_DIM) as u32,
            (side * TILE_DIM) as u32,
        );
        for (i, cell) in self.config.iter().enumerate() {
            let x = ((i % side) * TILE_DIM) as u32;
            let y = ((i / side) * TILE_DIM) as u32;
            self.tiles[cell.tile].blit(
                &mut image,
                &self.palettes[cell.palette],
                x,
                y,
                cell.xflip,
                cell.yflip,
            );
        }
        image
    }
}

#[derive(Serialize)]
struct TerrainEntry {
    x: usize,
    y: usize,
    value: u8,
    name: Option<&'static str>,
}

#[derive(Serialize)]
struct TerrainReport {
    name: String,
    width: usize,
    height: usize,
    terrains: Vec<TerrainEntry>,
}

pub struct TilesetExtractor<'a> {
    rom: &'a Rom,
}

impl<'a> TilesetExtractor<'a> {
    pub fn new(rom: &'a Rom) -> Self {
        TilesetExtractor { rom }
    }

    /// Decompresses the three blocks at the given LoROM pointers and
    /// writes `<name>.png` plus a `<name>_terrain.json` report.
    pub fn extract_tileset(
        &self,
        name: &str,
        tiles_ptr: u32,
        config_ptr: u32,
        palette_ptr: u32,
        output_dir: &Path,
    ) -> io::Result<()> {
        fs::create_dir_all(output_dir)?;

        let tiledata = self.decompress_block("tiles", tiles_ptr)?;
        let configdata = self.decompress_block("config", config_ptr)?;
        let palettedata = self.decompress_block("palette", palette_ptr)?;

        let tileset = MapTileset::from_bytes(name, &tiledata, &configdata, &palettedata)?;

        let image_path = output_dir.join(format!("{}.png", tileset.name));
        tileset
            .to_image()
            .save(&image_path)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        println!("Saved tileset image to {}", image_path.display());

        let report = TerrainReport {
            name: tileset.name.clone(),
            width: METATILES_PER_SIDE,
            height: METATILES_PER_SIDE,
            terrains: tileset
                .terrains
                .iter()
                .enumerate()
                .map(|(i, &value)| TerrainEntry {
                    x: i % METATILES_PER_SIDE,
                    y: i / METATILES_PER_SIDE,
                    value,
                    name: terrain_name(value),
                })
                .collect(),
        };
        let report_path = output_dir.join(format!("{}_terrain.json", tileset.name));
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        File::create(&report_path)?.write_all(json.as_bytes())?;
        println!("Saved terrain report to {}", report_path.display());

        Ok(())
    }

    fn decompress_block(&self, what: &str, pointer: u32) -> io::Result<Vec<u8>> {
        let offset = unlorom(pointer) as usize;
        let (data, consumed) = decompress(&self.rom.data, offset).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} block at {:#08X}: {}", what, pointer, e),
            )
        })?;
        println!(
            "Decompressed {} block: {} bytes from {} compressed",
            what,
            data.len(),
            consumed
        );
        Ok(data)
    }
}
