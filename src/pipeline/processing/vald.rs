//! VALD line-list reader: row isolation, column decomposition, species
//! normalization, and export to the columnar store.
//!
//! The source format is a semi-structured text dump with one spectral-line
//! record per line, e.g.
//!
//! ```text
//! Elm Ion       WL_air(A)  log gf* E_low(eV) J lo  E_up(eV) J up ...
//! 'TiO 1',     4100.00020, -11.472,  0.2011, 31.0,  3.2242, 32.0, ...
//! ```
//!
//! Data rows are isolated from the surrounding noise with a single compiled
//! pattern run across the whole buffer, then decomposed as headerless CSV.

use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use once_cell::sync::Lazy;
use once_cell::unsync::OnceCell;
use regex::Regex;
use tracing::{info, warn};

use crate::common::error::{IngestError, Result};
use crate::common::types::{
    ParsedLineRecord, ParsedLineTable, RawLineRecord, RawLineTable, RAW_COLUMNS,
};
use crate::pipeline::ingestion::fetch_source;
use crate::pipeline::storage::LineStore;

/// Default location of the public VALD dump.
pub const VALD_URL: &str =
    "https://media.githubusercontent.com/media/tardis-sn/carsus-db/master/vald/vald_latest.dat";

/// Recognizes one data row: a quoted species token (`'TiO 1'`) followed by a
/// comma-separated run of signed decimals. The run is open-ended; anything
/// that does not continue it ends the match, so noise lines never match.
static LINE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"'[A-Za-z]+ \d+',[ \t]*(?:-?\d+(?:\.\d+)?,[ \t]*)*(?:-?\d+(?:\.\d+)?)?")
        .expect("row pattern is a valid regex")
});

/// Reader for VALD line lists.
///
/// Construction captures configuration only; the first access to [`raw`] or
/// [`parsed`] triggers the fetch and caches the result for the lifetime of
/// the reader. The caches are not synchronized: a reader belongs to one
/// thread, and concurrent use means one reader per thread.
///
/// [`raw`]: ValdReader::raw
/// [`parsed`]: ValdReader::parsed
pub struct ValdReader {
    source: String,
    ions: Option<Vec<String>>,
    unique_level_identifier: Vec<String>,
    raw: OnceCell<(RawLineTable, String)>,
    parsed: OnceCell<ParsedLineTable>,
}

impl ValdReader {
    /// Create a reader over a local path or http(s) URL. `None` selects the
    /// public [`VALD_URL`]. No I/O happens here.
    pub fn new(source: Option<String>) -> Self {
        Self {
            source: source.unwrap_or_else(|| VALD_URL.to_string()),
            ions: None,
            unique_level_identifier: vec!["energy".to_string(), "j".to_string()],
            raw: OnceCell::new(),
            parsed: OnceCell::new(),
        }
    }

    /// Carry an ion filter. Accepted for interface compatibility with
    /// sibling readers; no operation applies it yet.
    pub fn with_ion_filter(mut self, ions: Vec<String>) -> Self {
        self.ions = Some(ions);
        self
    }

    /// Carry the attributes identifying unique levels (default
    /// `["energy", "j"]`). Accepted for interface compatibility; no
    /// operation applies it yet.
    pub fn with_unique_level_identifier(mut self, fields: Vec<String>) -> Self {
        self.unique_level_identifier = fields;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ion_filter(&self) -> Option<&[String]> {
        self.ions.as_deref()
    }

    pub fn unique_level_identifier(&self) -> &[String] {
        &self.unique_level_identifier
    }

    /// The raw 13-column table. Fetches and extracts on first call, then
    /// returns the cached table without touching the source again.
    pub fn raw(&self) -> Result<&RawLineTable> {
        Ok(&self.load_raw()?.0)
    }

    /// Checksum of the fetched payload. Triggers the fetch like [`raw`].
    ///
    /// [`raw`]: ValdReader::raw
    pub fn checksum(&self) -> Result<&str> {
        Ok(self.load_raw()?.1.as_str())
    }

    /// The 14-column parsed table, derived from the raw view on first call
    /// and cached thereafter.
    pub fn parsed(&self) -> Result<&ParsedLineTable> {
        self.parsed.get_or_try_init(|| {
            let raw = self.raw()?;
            Ok(Self::parse_table(raw))
        })
    }

    fn load_raw(&self) -> Result<&(RawLineTable, String)> {
        self.raw.get_or_try_init(|| {
            info!("Parsing VALD from: {}", self.source);
            let payload = fetch_source(&self.source)?;
            let text = String::from_utf8_lossy(&payload.bytes);
            let table = extract_raw_table(&text)?;
            Ok((table, payload.checksum))
        })
    }

    /// Split `elm_ion` into `molecule` and `ion_charge` for every record.
    ///
    /// Quotes are stripped and the value is split on the first space; any
    /// further spaces stay in `ion_charge` so the column count is stable. A
    /// value with no space keeps its `molecule` and gets an empty
    /// `ion_charge`, logged as a data-quality warning.
    pub fn parse_table(raw: &RawLineTable) -> ParsedLineTable {
        let records = raw
            .records
            .iter()
            .map(|r| {
                let species = r.elm_ion.replace('\'', "");
                let (molecule, ion_charge) = match species.split_once(' ') {
                    Some((molecule, charge)) => (molecule.to_string(), charge.to_string()),
                    None => {
                        warn!("elm_ion value '{}' carries no ion charge", species);
                        (species, String::new())
                    }
                };
                ParsedLineRecord {
                    wl_air: r.wl_air,
                    log_gf: r.log_gf,
                    e_low: r.e_low,
                    j_lo: r.j_lo,
                    e_up: r.e_up,
                    j_up: r.j_up,
                    lande_lower: r.lande_lower,
                    lande_upper: r.lande_upper,
                    lande_mean: r.lande_mean,
                    rad: r.rad,
                    stark: r.stark,
                    waals: r.waals,
                    molecule,
                    ion_charge,
                }
            })
            .collect();

        ParsedLineTable { records }
    }

    /// Write both views to a store rooted at `dest`, truncating any prior
    /// content of the `vald_raw` and `vald` tables. Pulls whichever views
    /// are not yet cached.
    pub fn export<P: AsRef<Path>>(&self, dest: P) -> Result<()> {
        let dest = dest.as_ref();
        let raw = self.raw()?;
        let parsed = self.parsed()?;

        let store = LineStore::create(dest)?;
        store.write_raw(raw)?;
        store.write_parsed(parsed)?;

        info!(
            "Exported {} raw and {} parsed lines to {}",
            raw.len(),
            parsed.len(),
            dest.display()
        );
        Ok(())
    }
}

/// Isolate data rows in a raw text dump and decompose them into the
/// 13-column table. Zero matches yield an empty table; a matched row with
/// the wrong field count or a non-numeric field fails the whole call.
pub fn extract_raw_table(text: &str) -> Result<RawLineTable> {
    let rows: Vec<&str> = LINE_PATTERN
        .find_iter(text)
        .map(|m| {
            // Each match ends at the trailing comma of its last field.
            let row = m.as_str().trim_end();
            row.strip_suffix(',').unwrap_or(row)
        })
        .collect();

    let joined = rows.join("\n");
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(joined.as_bytes());

    let mut records = Vec::with_capacity(rows.len());
    for row in reader.records() {
        records.push(decompose_row(&row?)?);
    }

    Ok(RawLineTable { records })
}

fn decompose_row(record: &StringRecord) -> Result<RawLineRecord> {
    if record.len() != RAW_COLUMNS.len() {
        return Err(IngestError::ColumnCount {
            expected: RAW_COLUMNS.len(),
            found: record.len(),
        });
    }

    Ok(RawLineRecord {
        elm_ion: record.get(0).unwrap_or_default().to_string(),
        wl_air: float_field(record, 1)?,
        log_gf: float_field(record, 2)?,
        e_low: float_field(record, 3)?,
        j_lo: float_field(record, 4)?,
        e_up: float_field(record, 5)?,
        j_up: float_field(record, 6)?,
        lande_lower: float_field(record, 7)?,
        lande_upper: float_field(record, 8)?,
        lande_mean: float_field(record, 9)?,
        rad: float_field(record, 10)?,
        stark: float_field(record, 11)?,
        waals: float_field(record, 12)?,
    })
}

fn float_field(record: &StringRecord, idx: usize) -> Result<f64> {
    let value = record.get(idx).unwrap_or_default();
    value.parse::<f64>().map_err(|_| IngestError::Number {
        column: RAW_COLUMNS[idx],
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_LINE: &str = "'TiO 1',4100.00020,-11.472,0.2011,31.0,3.2242,32.0,99.000,99.000,99.000,6.962,0.000,0.000,";

    #[test]
    fn test_extract_single_row_from_noise() {
        let text = format!(
            "Damping parameters    Lande\nElm Ion  WL_air(A)\n{}\nReferences:\n1: Kurucz\n",
            SAMPLE_LINE
        );

        let table = extract_raw_table(&text).unwrap();
        assert_eq!(table.len(), 1);

        let row = &table.records[0];
        assert_eq!(row.elm_ion, "'TiO 1'");
        assert_eq!(row.wl_air, 4100.00020);
        assert_eq!(row.log_gf, -11.472);
        assert_eq!(row.j_lo, 31.0);
        assert_eq!(row.waals, 0.000);
    }

    #[test]
    fn test_extract_handles_padded_fields() {
        let text = "'Fe 2',     4101.00,  -2.100,  1.0400, 2.5,  4.0600, 1.5, 99.000, 99.000, 99.000, 8.100, -6.120, -7.800,\n";
        let table = extract_raw_table(text).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.records[0].elm_ion, "'Fe 2'");
        assert_eq!(table.records[0].stark, -6.120);
    }

    #[test]
    fn test_extract_row_without_trailing_comma() {
        let text = SAMPLE_LINE.trim_end_matches(',');
        let table = extract_raw_table(text).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.records[0].waals, 0.000);
    }

    #[test]
    fn test_extract_preserves_row_order() {
        let text = format!("{}\nsome noise in between\n{}\n", SAMPLE_LINE, SAMPLE_LINE.replace("'TiO 1'", "'Ti 2'"));
        let table = extract_raw_table(&text).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records[0].elm_ion, "'TiO 1'");
        assert_eq!(table.records[1].elm_ion, "'Ti 2'");
    }

    #[test]
    fn test_no_matching_rows_is_empty_not_an_error() {
        let table = extract_raw_table("just a header\nand a footer\n").unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_short_row_fails_column_count() {
        // 11 values after the species token instead of 12.
        let text = "'TiO 1',4100.00020,-11.472,0.2011,31.0,3.2242,32.0,99.000,99.000,99.000,6.962,0.000,\n";
        let err = extract_raw_table(text).unwrap_err();
        assert!(matches!(
            err,
            IngestError::ColumnCount { expected: 13, found: 12 }
        ));
    }

    #[test]
    fn test_parse_table_splits_species() {
        let raw = extract_raw_table(SAMPLE_LINE).unwrap();
        let parsed = ValdReader::parse_table(&raw);

        assert_eq!(parsed.len(), 1);
        let row = &parsed.records[0];
        assert_eq!(row.molecule, "TiO");
        assert_eq!(row.ion_charge, "1");
        assert_eq!(row.wl_air, 4100.00020);
    }

    #[test]
    fn test_parse_table_splits_on_first_space_only() {
        let mut raw = extract_raw_table(SAMPLE_LINE).unwrap();
        raw.records[0].elm_ion = "'TiO 1 extra'".to_string();

        let parsed = ValdReader::parse_table(&raw);
        assert_eq!(parsed.records[0].molecule, "TiO");
        assert_eq!(parsed.records[0].ion_charge, "1 extra");
    }

    #[test]
    fn test_parse_table_without_space_leaves_charge_empty() {
        let mut raw = extract_raw_table(SAMPLE_LINE).unwrap();
        raw.records[0].elm_ion = "'TiO'".to_string();

        let parsed = ValdReader::parse_table(&raw);
        assert_eq!(parsed.records[0].molecule, "TiO");
        assert_eq!(parsed.records[0].ion_charge, "");
    }

    #[test]
    fn test_split_reconstructs_species() {
        let raw = extract_raw_table(SAMPLE_LINE).unwrap();
        let parsed = ValdReader::parse_table(&raw);

        for (raw_row, parsed_row) in raw.records.iter().zip(&parsed.records) {
            let rebuilt = format!("{} {}", parsed_row.molecule, parsed_row.ion_charge);
            assert_eq!(rebuilt, raw_row.elm_ion.replace('\'', ""));
        }
    }

    #[test]
    fn test_reader_defaults() {
        let reader = ValdReader::new(None);
        assert_eq!(reader.source(), VALD_URL);
        assert!(reader.ion_filter().is_none());
        assert_eq!(reader.unique_level_identifier(), ["energy", "j"]);
    }

    #[test]
    fn test_reserved_options_are_stored() {
        let reader = ValdReader::new(Some("lines.dat".into()))
            .with_ion_filter(vec!["Ti 2".into()])
            .with_unique_level_identifier(vec!["energy".into()]);

        assert_eq!(reader.source(), "lines.dat");
        assert_eq!(reader.ion_filter().unwrap(), ["Ti 2"]);
        assert_eq!(reader.unique_level_identifier(), ["energy"]);
    }
}
