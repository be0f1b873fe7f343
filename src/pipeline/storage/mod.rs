//! Persistent columnar store for line tables.
//!
//! A store is a directory holding one Parquet file per named table:
//! `vald_raw` (the 13-column source projection) and `vald` (the 14-column
//! parsed view). Table and column names are the compatibility surface;
//! consumers key lookups by these exact names.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use tracing::debug;

use crate::common::error::{IngestError, Result};
use crate::common::types::{
    ParsedLineRecord, ParsedLineTable, RawLineRecord, RawLineTable, PARSED_COLUMNS, RAW_COLUMNS,
};

pub const RAW_TABLE: &str = "vald_raw";
pub const PARSED_TABLE: &str = "vald";

/// Handle on a store root. Writes truncate the table files in place; reads
/// validate names, order, and types against the fixed schemas.
pub struct LineStore {
    root: PathBuf,
}

impl LineStore {
    /// Open a store root for writing, creating the directory if needed.
    pub fn create<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Open an existing store root for reading.
    pub fn open<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(IngestError::Store {
                message: format!("no store at {}", root.display()),
            });
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn write_raw(&self, table: &RawLineTable) -> Result<()> {
        self.write_table(RAW_TABLE, &raw_batch(table)?)
    }

    pub fn write_parsed(&self, table: &ParsedLineTable) -> Result<()> {
        self.write_table(PARSED_TABLE, &parsed_batch(table)?)
    }

    pub fn read_raw(&self) -> Result<RawLineTable> {
        let mut records = Vec::new();
        for batch in self.read_table(RAW_TABLE, &RAW_COLUMNS)? {
            let elm_ion = utf8_column(&batch, "elm_ion")?;
            let wl_air = f64_column(&batch, "wl_air")?;
            let log_gf = f64_column(&batch, "log_gf")?;
            let e_low = f64_column(&batch, "e_low")?;
            let j_lo = f64_column(&batch, "j_lo")?;
            let e_up = f64_column(&batch, "e_up")?;
            let j_up = f64_column(&batch, "j_up")?;
            let lande_lower = f64_column(&batch, "lande_lower")?;
            let lande_upper = f64_column(&batch, "lande_upper")?;
            let lande_mean = f64_column(&batch, "lande_mean")?;
            let rad = f64_column(&batch, "rad")?;
            let stark = f64_column(&batch, "stark")?;
            let waals = f64_column(&batch, "waals")?;

            for i in 0..batch.num_rows() {
                records.push(RawLineRecord {
                    elm_ion: elm_ion.value(i).to_string(),
                    wl_air: wl_air.value(i),
                    log_gf: log_gf.value(i),
                    e_low: e_low.value(i),
                    j_lo: j_lo.value(i),
                    e_up: e_up.value(i),
                    j_up: j_up.value(i),
                    lande_lower: lande_lower.value(i),
                    lande_upper: lande_upper.value(i),
                    lande_mean: lande_mean.value(i),
                    rad: rad.value(i),
                    stark: stark.value(i),
                    waals: waals.value(i),
                });
            }
        }
        Ok(RawLineTable { records })
    }

    pub fn read_parsed(&self) -> Result<ParsedLineTable> {
        let mut records = Vec::new();
        for batch in self.read_table(PARSED_TABLE, &PARSED_COLUMNS)? {
            let wl_air = f64_column(&batch, "wl_air")?;
            let log_gf = f64_column(&batch, "log_gf")?;
            let e_low = f64_column(&batch, "e_low")?;
            let j_lo = f64_column(&batch, "j_lo")?;
            let e_up = f64_column(&batch, "e_up")?;
            let j_up = f64_column(&batch, "j_up")?;
            let lande_lower = f64_column(&batch, "lande_lower")?;
            let lande_upper = f64_column(&batch, "lande_upper")?;
            let lande_mean = f64_column(&batch, "lande_mean")?;
            let rad = f64_column(&batch, "rad")?;
            let stark = f64_column(&batch, "stark")?;
            let waals = f64_column(&batch, "waals")?;
            let molecule = utf8_column(&batch, "molecule")?;
            let ion_charge = utf8_column(&batch, "ion_charge")?;

            for i in 0..batch.num_rows() {
                records.push(ParsedLineRecord {
                    wl_air: wl_air.value(i),
                    log_gf: log_gf.value(i),
                    e_low: e_low.value(i),
                    j_lo: j_lo.value(i),
                    e_up: e_up.value(i),
                    j_up: j_up.value(i),
                    lande_lower: lande_lower.value(i),
                    lande_upper: lande_upper.value(i),
                    lande_mean: lande_mean.value(i),
                    rad: rad.value(i),
                    stark: stark.value(i),
                    waals: waals.value(i),
                    molecule: molecule.value(i).to_string(),
                    ion_charge: ion_charge.value(i).to_string(),
                });
            }
        }
        Ok(ParsedLineTable { records })
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.parquet"))
    }

    fn write_table(&self, name: &str, batch: &RecordBatch) -> Result<()> {
        let path = self.table_path(name);
        // File::create truncates prior content for this run; the handle is
        // dropped on every exit path.
        let file = File::create(&path)?;
        let props = WriterProperties::builder()
            .set_compression(Compression::ZSTD(ZstdLevel::default()))
            .build();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(batch)?;
        writer.close()?;
        debug!("Wrote {} rows to {}", batch.num_rows(), path.display());
        Ok(())
    }

    fn read_table(&self, name: &str, expected_columns: &[&str]) -> Result<Vec<RecordBatch>> {
        let path = self.table_path(name);
        let file = File::open(&path).map_err(|e| IngestError::Store {
            message: format!("table '{}' unreadable at {}: {}", name, path.display(), e),
        })?;

        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let names: Vec<&str> = builder
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect();
        if names != expected_columns {
            return Err(IngestError::Store {
                message: format!(
                    "table '{}' has columns {:?}, expected {:?}",
                    name, names, expected_columns
                ),
            });
        }

        let mut batches = Vec::new();
        for batch in builder.build()? {
            batches.push(batch?);
        }
        Ok(batches)
    }
}

/// The raw table as one Arrow record batch (13 columns, §schema order).
pub fn raw_batch(table: &RawLineTable) -> Result<RecordBatch> {
    let rows = &table.records;
    let schema = Arc::new(Schema::new(
        RAW_COLUMNS
            .iter()
            .map(|name| {
                let data_type = if *name == "elm_ion" {
                    DataType::Utf8
                } else {
                    DataType::Float64
                };
                Field::new(*name, data_type, false)
            })
            .collect::<Vec<_>>(),
    ));

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.elm_ion.as_str()),
        )),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.wl_air))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.log_gf))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.e_low))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.j_lo))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.e_up))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.j_up))),
        Arc::new(Float64Array::from_iter_values(
            rows.iter().map(|r| r.lande_lower),
        )),
        Arc::new(Float64Array::from_iter_values(
            rows.iter().map(|r| r.lande_upper),
        )),
        Arc::new(Float64Array::from_iter_values(
            rows.iter().map(|r| r.lande_mean),
        )),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.rad))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.stark))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.waals))),
    ];

    Ok(RecordBatch::try_new(schema, columns)?)
}

/// The parsed table as one Arrow record batch (12 numeric columns then
/// `molecule` and `ion_charge`).
pub fn parsed_batch(table: &ParsedLineTable) -> Result<RecordBatch> {
    let rows = &table.records;
    let schema = Arc::new(Schema::new(
        PARSED_COLUMNS
            .iter()
            .map(|name| {
                let data_type = match *name {
                    "molecule" | "ion_charge" => DataType::Utf8,
                    _ => DataType::Float64,
                };
                Field::new(*name, data_type, false)
            })
            .collect::<Vec<_>>(),
    ));

    let columns: Vec<ArrayRef> = vec![
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.wl_air))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.log_gf))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.e_low))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.j_lo))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.e_up))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.j_up))),
        Arc::new(Float64Array::from_iter_values(
            rows.iter().map(|r| r.lande_lower),
        )),
        Arc::new(Float64Array::from_iter_values(
            rows.iter().map(|r| r.lande_upper),
        )),
        Arc::new(Float64Array::from_iter_values(
            rows.iter().map(|r| r.lande_mean),
        )),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.rad))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.stark))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.waals))),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.molecule.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.ion_charge.as_str()),
        )),
    ];

    Ok(RecordBatch::try_new(schema, columns)?)
}

fn f64_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float64Array> {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_any().downcast_ref::<Float64Array>())
        .ok_or_else(|| IngestError::Store {
            message: format!("column '{name}' is missing or not Float64"),
        })
}

fn utf8_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| IngestError::Store {
            message: format!("column '{name}' is missing or not Utf8"),
        })
}
