//! Parquet writer over the sample stream
//!
//! The exporter drives the sample iterator once per file and appends one
//! value per projected column per frame. Array-valued non-Char variables are
//! flattened to their last element (downstream pipelines treat the final
//! slot of iRacing's periodic arrays as the most recent reading); callers
//! needing full arrays must project explicitly through the sample API.
//!
//! Memory policy: rows for one file are buffered and emitted as a single
//! record batch. Multi-file export writes one batch per input file into the
//! same writer, so peak memory is bounded by the largest input rather than
//! the whole corpus.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanBuilder, Float32Builder, Float64Builder, Int32Builder, StringBuilder,
    UInt32Builder,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{ExportOptions, FileProgress, MissingVariable};
use crate::ibt::{samples, OpenOptions, Telemetry};
use crate::types::{Value, VarType, VariableDict, VariableInfo};
use crate::{Result, TelemetryError};

/// One column of the output schema. `var_type` is `None` for projection
/// names kept as null columns; those are typed `Float64`.
#[derive(Debug, Clone)]
struct ColumnSpec {
    name: String,
    var_type: Option<VarType>,
}

/// Export one file's samples to a Parquet file.
///
/// Returns the number of rows written. On any error the partially written
/// output is removed.
pub fn export_parquet<R: Read + Seek>(
    telemetry: &mut Telemetry<R>,
    output: &Path,
    options: &ExportOptions,
    cancel: &CancellationToken,
) -> Result<u64> {
    let result = export_single(telemetry, output, options, cancel);
    if result.is_err() {
        let _ = std::fs::remove_file(output);
    }
    result
}

fn export_single<R: Read + Seek>(
    telemetry: &mut Telemetry<R>,
    output: &Path,
    options: &ExportOptions,
    cancel: &CancellationToken,
) -> Result<u64> {
    let columns = resolve_projection(telemetry.variables(), options)?;
    let schema = build_schema(&columns);

    let file = File::create(output).map_err(|e| TelemetryError::from_io(output, e))?;
    let mut writer = ArrowWriter::try_new(file, schema.clone(), None)?;

    let bindings = bind_columns(&columns, telemetry.variables());
    let rows = write_file_batch(&mut writer, &schema, &columns, &bindings, telemetry, cancel)?;
    writer.close()?;

    debug!("exported {rows} rows to {}", output.display());
    Ok(rows)
}

/// Export several files into one Parquet file.
///
/// Files are processed serially. The schema is fixed by the first file;
/// later files lacking a projected variable (or carrying it with a
/// different type) emit typed nulls in that column. Frame indices restart
/// at 0 for each file. `progress` fires once per completed file.
pub fn export_parquet_multi<P, F>(
    inputs: &[P],
    output: &Path,
    options: &ExportOptions,
    open_options: OpenOptions,
    progress: F,
    cancel: &CancellationToken,
) -> Result<u64>
where
    P: AsRef<Path>,
    F: FnMut(FileProgress<'_>),
{
    let result = export_multi(inputs, output, options, open_options, progress, cancel);
    if result.is_err() {
        let _ = std::fs::remove_file(output);
    }
    result
}

fn export_multi<P, F>(
    inputs: &[P],
    output: &Path,
    options: &ExportOptions,
    open_options: OpenOptions,
    mut progress: F,
    cancel: &CancellationToken,
) -> Result<u64>
where
    P: AsRef<Path>,
    F: FnMut(FileProgress<'_>),
{
    if inputs.is_empty() {
        return Err(TelemetryError::parse("multi-file export", "no input files"));
    }

    let total = inputs.len();
    let first_handle = Telemetry::open_with(inputs[0].as_ref(), open_options)?;
    let columns = resolve_projection(first_handle.variables(), options)?;
    let schema = build_schema(&columns);
    let mut first = Some(first_handle);

    let file = File::create(output).map_err(|e| TelemetryError::from_io(output, e))?;
    let mut writer = ArrowWriter::try_new(file, schema.clone(), None)?;

    let mut total_rows = 0u64;
    for (index, path) in inputs.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(TelemetryError::Cancelled);
        }

        let mut telemetry = match first.take() {
            Some(opened) => opened,
            None => Telemetry::open_with(path.as_ref(), open_options)?,
        };
        let bindings = bind_columns(&columns, telemetry.variables());
        total_rows +=
            write_file_batch(&mut writer, &schema, &columns, &bindings, &mut telemetry, cancel)?;

        let name = path.as_ref().display().to_string();
        progress(FileProgress { current: index, total, file_name: &name });
    }

    writer.close()?;
    debug!("exported {total_rows} rows from {total} files to {}", output.display());
    Ok(total_rows)
}

/// Resolve the requested projection against a dictionary.
///
/// At least one name must resolve; otherwise the export fails with
/// `ProjectionEmpty`. The built-in roster always drops unresolved names;
/// explicit projections follow `on_missing_variable`.
fn resolve_projection(dict: &VariableDict, options: &ExportOptions) -> Result<Vec<ColumnSpec>> {
    let (requested, explicit): (Vec<String>, bool) = if options.include_all {
        (dict.iter().map(|v| v.name.clone()).collect(), false)
    } else if let Some(list) = &options.projection {
        (list.clone(), true)
    } else {
        (super::DEFAULT_ROSTER.iter().map(|s| s.to_string()).collect(), false)
    };

    let mut columns = Vec::with_capacity(requested.len());
    let mut seen = std::collections::HashSet::with_capacity(requested.len());
    let mut resolved = 0usize;
    let mut dropped = 0usize;

    for name in requested {
        if !seen.insert(name.to_ascii_lowercase()) {
            continue;
        }
        match dict.get(&name) {
            Some(info) => {
                columns.push(ColumnSpec {
                    name: info.name.clone(),
                    var_type: Some(info.var_type),
                });
                resolved += 1;
            }
            None if explicit && options.on_missing_variable == MissingVariable::NullColumn => {
                columns.push(ColumnSpec { name, var_type: None });
            }
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        warn!("dropped {dropped} projected variable(s) missing from the dictionary");
    }
    if resolved == 0 {
        return Err(TelemetryError::ProjectionEmpty);
    }
    Ok(columns)
}

fn build_schema(columns: &[ColumnSpec]) -> Arc<Schema> {
    let mut fields = Vec::with_capacity(columns.len() + 2);
    fields.push(Field::new("session_id", DataType::Utf8, false));
    fields.push(Field::new("sample_idx", DataType::Int32, false));
    for column in columns {
        fields.push(Field::new(&column.name, arrow_type(column.var_type), true));
    }
    Arc::new(Schema::new(fields))
}

fn arrow_type(var_type: Option<VarType>) -> DataType {
    match var_type {
        Some(VarType::Char) => DataType::Utf8,
        Some(VarType::Bool) => DataType::Boolean,
        Some(VarType::Int) => DataType::Int32,
        Some(VarType::BitField) => DataType::UInt32,
        Some(VarType::Float) => DataType::Float32,
        Some(VarType::Double) => DataType::Float64,
        None => DataType::Float64,
    }
}

/// Bind output columns to one file's dictionary. A missing name, or one
/// whose type drifted from the schema-fixing file, binds to `None` and
/// fills with nulls.
fn bind_columns(columns: &[ColumnSpec], dict: &VariableDict) -> Vec<Option<VariableInfo>> {
    columns
        .iter()
        .map(|column| {
            dict.get(&column.name).filter(|info| Some(info.var_type) == column.var_type).cloned()
        })
        .collect()
}

fn write_file_batch<R: Read + Seek, W: std::io::Write + Send>(
    writer: &mut ArrowWriter<W>,
    schema: &Arc<Schema>,
    columns: &[ColumnSpec],
    bindings: &[Option<VariableInfo>],
    telemetry: &mut Telemetry<R>,
    cancel: &CancellationToken,
) -> Result<u64> {
    let session_id = telemetry.session_id().to_string();
    let mut session_ids = StringBuilder::new();
    let mut sample_idx = Int32Builder::new();
    let mut builders: Vec<ColumnBuilder> = columns.iter().map(ColumnBuilder::for_column).collect();

    let mut rows = 0u64;
    let mut iter = telemetry.samples(cancel.clone());
    while let Some(view) = iter.next_sample()? {
        session_ids.append_value(&session_id);
        sample_idx.append_value(view.index() as i32);
        for (builder, binding) in builders.iter_mut().zip(bindings) {
            match binding {
                Some(info) => builder.append_from_frame(view.frame(), info),
                None => builder.append_null(),
            }
        }
        rows += 1;
    }
    drop(iter);

    if rows == 0 {
        return Ok(0);
    }

    let mut arrays: Vec<ArrayRef> =
        vec![Arc::new(session_ids.finish()), Arc::new(sample_idx.finish())];
    arrays.extend(builders.iter_mut().map(ColumnBuilder::finish));
    let batch = RecordBatch::try_new(schema.clone(), arrays)?;
    writer.write(&batch)?;
    Ok(rows)
}

/// Typed per-column accumulator matching the schema's arrow types.
enum ColumnBuilder {
    Utf8(StringBuilder),
    Bool(BooleanBuilder),
    Int(Int32Builder),
    UInt(UInt32Builder),
    Float(Float32Builder),
    Double(Float64Builder),
}

impl ColumnBuilder {
    fn for_column(column: &ColumnSpec) -> Self {
        match arrow_type(column.var_type) {
            DataType::Utf8 => ColumnBuilder::Utf8(StringBuilder::new()),
            DataType::Boolean => ColumnBuilder::Bool(BooleanBuilder::new()),
            DataType::Int32 => ColumnBuilder::Int(Int32Builder::new()),
            DataType::UInt32 => ColumnBuilder::UInt(UInt32Builder::new()),
            DataType::Float32 => ColumnBuilder::Float(Float32Builder::new()),
            _ => ColumnBuilder::Double(Float64Builder::new()),
        }
    }

    fn append_null(&mut self) {
        match self {
            ColumnBuilder::Utf8(b) => b.append_null(),
            ColumnBuilder::Bool(b) => b.append_null(),
            ColumnBuilder::Int(b) => b.append_null(),
            ColumnBuilder::UInt(b) => b.append_null(),
            ColumnBuilder::Float(b) => b.append_null(),
            ColumnBuilder::Double(b) => b.append_null(),
        }
    }

    /// Append the variable's value from a frame, flattening arrays to their
    /// last element. Decode failures and type mismatches append a null.
    fn append_from_frame(&mut self, frame: &[u8], info: &VariableInfo) {
        if let ColumnBuilder::Utf8(b) = self {
            match samples::decode_value(frame, info) {
                Ok(Value::String(s)) => b.append_value(s),
                _ => b.append_null(),
            }
            return;
        }

        let value = last_element(frame, info);
        match (self, value) {
            (ColumnBuilder::Bool(b), Some(Value::Bool(v))) => b.append_value(v),
            (ColumnBuilder::Int(b), Some(Value::Int(v))) => b.append_value(v),
            (ColumnBuilder::UInt(b), Some(Value::BitField(v))) => b.append_value(v.value()),
            (ColumnBuilder::Float(b), Some(Value::Float(v))) => b.append_value(v),
            (ColumnBuilder::Double(b), Some(Value::Double(v))) => b.append_value(v),
            (other, _) => other.append_null(),
        }
    }

    fn finish(&mut self) -> ArrayRef {
        match self {
            ColumnBuilder::Utf8(b) => Arc::new(b.finish()),
            ColumnBuilder::Bool(b) => Arc::new(b.finish()),
            ColumnBuilder::Int(b) => Arc::new(b.finish()),
            ColumnBuilder::UInt(b) => Arc::new(b.finish()),
            ColumnBuilder::Float(b) => Arc::new(b.finish()),
            ColumnBuilder::Double(b) => Arc::new(b.finish()),
        }
    }
}

fn last_element(frame: &[u8], info: &VariableInfo) -> Option<Value> {
    let width = info.var_type.size();
    let offset = info.offset + (info.count - 1) * width;
    samples::scalar_at(frame, info.var_type, offset).ok()
}
