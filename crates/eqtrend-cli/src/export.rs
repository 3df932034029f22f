use std::io::Write;

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

use crate::dataset::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Csv,
    Json,
}

const COLUMNS: [&str; 9] = [
    "eqName", "eqRaw", "eqParsed", "year", "place", "centuries", "ops", "depth", "nodes",
];

/// Column layout shared by both formats. Field order must match [`COLUMNS`].
#[derive(Debug, Serialize)]
struct Record<'a> {
    #[serde(rename = "eqName")]
    eq_name: Option<&'a str>,
    #[serde(rename = "eqRaw")]
    eq_raw: Option<&'a str>,
    #[serde(rename = "eqParsed")]
    eq_parsed: Option<&'a str>,
    year: Option<i64>,
    place: Option<&'a str>,
    centuries: Option<f64>,
    ops: Option<u32>,
    depth: Option<u32>,
    nodes: Option<u32>,
}

impl<'a> From<&'a Row> for Record<'a> {
    fn from(r: &'a Row) -> Self {
        Self {
            eq_name: r.eq_name.as_deref(),
            eq_raw: r.eq_raw.as_deref(),
            eq_parsed: r.eq_parsed.as_deref(),
            year: r.year,
            place: r.place.as_deref(),
            centuries: r.centuries,
            ops: r.ops,
            depth: r.depth,
            nodes: r.nodes,
        }
    }
}

pub fn write<W: Write>(rows: &[Row], format: Format, out: W) -> Result<()> {
    let records: Vec<Record> = rows.iter().map(Record::from).collect();
    match format {
        Format::Csv => {
            let mut w = csv::Writer::from_writer(out);
            // serialize() writes the header with the first record only
            if records.is_empty() {
                w.write_record(COLUMNS)?;
            }
            for r in &records {
                w.serialize(r)?;
            }
            w.flush()?;
        }
        Format::Json => {
            let mut out = out;
            serde_json::to_writer_pretty(&mut out, &records)?;
            writeln!(out)?;
        }
    }
    Ok(())
}
