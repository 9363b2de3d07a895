mod compare;
mod decompress;
mod memory;
mod portrait_extractor;
mod rom;
mod sym;
mod tables;
mod tileset_extractor;

mod graphics;

use std::{io, path::PathBuf, process};

use clap::{Parser, Subcommand};

use crate::{
    portrait_extractor::PortraitExtractor, rom::Rom, tileset_extractor::TilesetExtractor,
};

#[derive(Parser)]
#[command(name = "fe5_tools")]
#[command(author, version, long_about = None)]
#[command(about = "Asset ripping and build tools for Fire Emblem: Thracia 776")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rip every known portrait into formatted PNGs
    RipPortraits {
        #[arg(value_name = "ROM_PATH")]
        rom_path: PathBuf,
        #[arg(short, long, value_name = "OUTPUT_DIR", default_value = "./output")]
        output_dir: PathBuf,
    },
    /// Rip a map tileset into a composed PNG and terrain report
    RipTileset {
        #[arg(value_name = "ROM_PATH")]
        rom_path: PathBuf,
        /// LoROM pointer to the compressed tile sheet
        #[arg(value_parser = parse_address)]
        tiles: u32,
        /// LoROM pointer to the compressed metatile config
        #[arg(value_parser = parse_address)]
        config: u32,
        /// LoROM pointer to the compressed palette block
        #[arg(value_parser = parse_address)]
        palette: u32,
        #[arg(short, long)]
        name: String,
        #[arg(short, long, value_name = "OUTPUT_DIR", default_value = "./output")]
        output_dir: PathBuf,
    },
    /// Recompute the ROM checksum and repair the header words
    Checksum {
        #[arg(value_name = "ROM_PATH")]
        rom_path: PathBuf,
    },
    /// Show the differing byte runs of two binaries
    Compare {
        first: PathBuf,
        second: PathBuf,
    },
    /// Rewrite a 64tass VICE symbol file for bsnes-plus
    FixSym {
        sym_path: PathBuf,
    },
    /// Convert a CSV data table into 64tass definitions and macro calls
    Tables {
        input: PathBuf,
        output: PathBuf,
        /// Definition indent width
        #[arg(long, default_value_t = 2)]
        indent: usize,
    },
}

fn parse_address(s: &str) -> Result<u32, String> {
    let (digits, radix) = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (s, 10),
    };
    u32::from_str_radix(digits, radix).map_err(|e| format!("Invalid address {:?}: {}", s, e))
}

fn run(command: Command) -> io::Result<()> {
    match command {
        Command::RipPortraits {
            rom_path,
            output_dir,
        } => {
            let rom = Rom::load(rom_path)?;
            println!("Loaded \"{}\"", rom.title());
            PortraitExtractor::new(&rom).extract_portraits(&output_dir)
        }
        Command::RipTileset {
            rom_path,
            tiles,
            config,
            palette,
            name,
            output_dir,
        } => {
            let rom = Rom::load(rom_path)?;
            println!("Loaded \"{}\"", rom.title());
            TilesetExtractor::new(&rom).extract_tileset(&name, tiles, config, palette, &output_dir)
        }
        Command::Checksum { rom_path } => {
            let mut rom = Rom::load(rom_path)?;
            match rom.fix_checksum()? {
                Some((checksum, complement)) => {
                    rom.save()?;
                    println!("New checksums for ROM {}:", rom.path.display());
                    println!("Checksum:   0x{:04X}", checksum);
                    println!("Complement: 0x{:04X}", complement);
                }
                None => println!("Checksum is already current"),
            }
            Ok(())
        }
        Command::Compare { first, second } => compare::run(&first, &second),
        Command::FixSym { sym_path } => sym::run(&sym_path),
        Command::Tables {
            input,
            output,
            indent,
        } => tables::run(&input, &output, indent),
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
