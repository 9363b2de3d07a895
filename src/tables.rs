//! Converts CSV data tables into 64tass definitions and macro calls.
//!
//! The first cell of the header row holds the macro name and the starting
//! entry index; the remaining header cells are field name suffixes. Each
//! data row becomes one block of definitions and one macro invocation.

use std::{fs, io, path::Path};

fn csv_err(e: csv::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

fn invalid(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.to_string())
}

pub fn run(input: &Path, output: &Path, indent: usize) -> io::Result<()> {
    let table_name = input
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| invalid("Input path has no usable file name"))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(input)
        .map_err(csv_err)?;
    let mut records = reader.records();

    let header = records
        .next()
        .ok_or_else(|| invalid("Table is missing its header row"))?
        .map_err(csv_err)?;
    let mut first = header
        .get(0)
        .ok_or_else(|| invalid("Header row is empty"))?
        .split_whitespace();
    let (Some(command), Some(start)) = (first.next(), first.next()) else {
        return Err(invalid(
            "First header cell must hold the macro name and starting index",
        ));
    };
    let start: i64 = start
        .parse()
        .map_err(|_| invalid("Starting index is not a number"))?;
    let command = command.to_string();
    let fields: Vec<String> = header.iter().skip(1).map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in records {
        let record = record.map_err(csv_err)?;
        let name = record
            .get(0)
            .ok_or_else(|| invalid("Data row is empty"))?
            .to_string();
        let items: Vec<String> = record.iter().skip(1).map(str::to_string).collect();
        rows.push((name, items));
    }

    let field_width = fields.iter().map(String::len).max().unwrap_or(0);
    let name_width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    let reserved = indent + name_width + field_width;

    let mut definitions = String::new();
    let mut table = String::new();
    for (i, (name, items)) in rows.iter().enumerate() {
        definitions.push_str(&format!(
            "{:<width$} = {}\n",
            name,
            start + i as i64,
            width = reserved
        ));
        for (item, field) in items.iter().zip(&fields) {
            let definition = format!("{}{}{}", " ".repeat(indent), name, field);
            definitions.push_str(&format!(
                "{:<width$} = {}\n",
                definition,
                item,
                width = reserved
            ));
        }
        definitions.push('\n');

        let args = fields
            .iter()
            .map(|field| format!("{}{}", name, field))
            .collect::<Vec<_>>()
            .join(", ");
        table.push_str(&format!("{}{}Entry {} {}\n", name, table_name, command, args));
    }

    fs::write(output, definitions + &table)
}
