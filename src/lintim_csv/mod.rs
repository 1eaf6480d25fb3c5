// Copyright (C) 2017 Hove and/or its affiliates.
//
// This program is free software: you can redistribute it and/or modify it
// under the terms of the GNU Affero General Public License as published by the
// Free Software Foundation, version 3.

// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more
// details.

// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>

//! Reading and writing [LinTim](https://www.lintim.net/) datasets.
//!
//! Every table is a `;` separated file without header row, where lines
//! starting with `#` are comments and strings may be quoted. Files are
//! written with a `#` header line and `"; "` between the columns.

mod read;
mod write;

use crate::{error::LinTimError, Parameters, Result};
use anyhow::{anyhow, bail, Context};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

const WRITE_DELIMITER: u8 = b'\x1f';

/// A LinTim dataset directory and the parameters it is read with.
///
/// File locations are taken from [`Parameters::files`], relative to the
/// dataset root.
#[derive(Debug, Clone)]
pub struct Dataset {
    root: PathBuf,
    parameters: Parameters,
}

impl Dataset {
    /// A dataset rooted at `root`.
    pub fn new<P: AsRef<Path>>(root: P, parameters: Parameters) -> Self {
        Dataset {
            root: root.as_ref().to_path_buf(),
            parameters,
        }
    }

    /// The dataset directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The parameters the dataset is read and written with.
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Absolute location of a dataset file.
    pub fn path<P: AsRef<Path>>(&self, file: P) -> PathBuf {
        self.root.join(file)
    }
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map_or(path.to_string_lossy(), |b| b.to_string_lossy())
        .into_owned()
}

fn type_name(kind: &csv::DeserializeErrorKind) -> &'static str {
    match kind {
        csv::DeserializeErrorKind::ParseInt(_) => "integer",
        csv::DeserializeErrorKind::ParseFloat(_) => "float",
        csv::DeserializeErrorKind::ParseBool(_) => "boolean",
        _ => "value",
    }
}

/// Removes the blanks following a `;` outside of quotes, so that a quoted
/// field written after the `"; "` separator is parsed as quoted.
fn strip_separator_blanks(line: &str) -> String {
    let mut stripped = String::with_capacity(line.len());
    let mut quoted = false;
    let mut after_separator = false;
    for c in line.chars() {
        if after_separator && c.is_whitespace() {
            continue;
        }
        after_separator = false;
        match c {
            '"' => quoted = !quoted,
            ';' if !quoted => after_separator = true,
            _ => {}
        }
        stripped.push(c);
    }
    stripped
}

/// Splits the data lines of a LinTim file into records, with their line
/// number in the file. Blank lines and `#` comments are skipped.
pub(crate) fn read_records(path: &Path) -> Result<Vec<(u64, csv::StringRecord)>> {
    let content = fs::read_to_string(path).with_context(|| format!("Error reading {:?}", path))?;
    let mut records = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line_number = index as u64 + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let stripped = strip_separator_blanks(line);
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(stripped.as_bytes());
        let mut record = csv::StringRecord::new();
        rdr.read_record(&mut record)
            .with_context(|| format!("Error reading {:?} line {}", path, line_number))?;
        records.push((line_number, record));
    }
    Ok(records)
}

/// Reads every row of a required file, checking that it has exactly
/// `columns` fields. Rows are returned with their line number.
pub(crate) fn read_rows<T>(path: &Path, columns: usize) -> Result<Vec<(u64, T)>>
where
    T: DeserializeOwned,
{
    info!("Reading {}", basename(path));
    let mut rows = Vec::new();
    for (line, record) in read_records(path)? {
        if record.len() != columns {
            bail!(LinTimError::InputFormat {
                file: path.to_path_buf(),
                line,
                expected: columns,
                found: record.len(),
            });
        }
        let row = record.deserialize(None).map_err(|e| match e.kind() {
            csv::ErrorKind::Deserialize { err, .. } => {
                let column = err.field().unwrap_or(0) as usize;
                anyhow!(LinTimError::InputTypeInconsistency {
                    file: path.to_path_buf(),
                    line,
                    column: column + 1,
                    value: record.get(column).unwrap_or_default().to_string(),
                    expected: type_name(err.kind()),
                })
            }
            _ => anyhow!("Error reading {:?} line {}: {}", path, line, e),
        })?;
        rows.push((line, row));
    }
    Ok(rows)
}

/// Like [`read_rows`], but an absent file reads as no row.
pub(crate) fn read_optional_rows<T>(path: &Path, columns: usize) -> Result<Vec<(u64, T)>>
where
    T: DeserializeOwned,
{
    if !path.exists() {
        info!("Skipping {}", basename(path));
        return Ok(vec![]);
    }
    read_rows(path, columns)
}

/// Writes `# header` followed by one line per row, creating the missing
/// directories.
pub(crate) fn write_rows<T, I>(path: &Path, header: &str, rows: I) -> Result<()>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    info!("Writing {}", basename(path));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Error creating {:?}", parent))?;
    }
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(WRITE_DELIMITER)
        .has_headers(false)
        .quote_style(csv::QuoteStyle::NonNumeric)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(vec![]);
    for row in rows {
        wtr.serialize(row)
            .with_context(|| format!("Error writing {:?}", path))?;
    }
    let content = wtr
        .into_inner()
        .map_err(|e| anyhow!("Error writing {:?}: {}", path, e))?;
    let content = String::from_utf8(content).with_context(|| format!("Error writing {:?}", path))?;
    let file = File::create(path).with_context(|| format!("Error writing {:?}", path))?;
    let mut file = BufWriter::new(file);
    writeln!(file, "# {}", header).with_context(|| format!("Error writing {:?}", path))?;
    file.write_all(content.replace(WRITE_DELIMITER as char, "; ").as_bytes())
        .with_context(|| format!("Error writing {:?}", path))?;
    file.flush().with_context(|| format!("Error writing {:?}", path))?;
    Ok(())
}

#[derive(Serialize, Deserialize, Debug)]
struct StopRow {
    id: i32,
    short_name: String,
    long_name: String,
    x: f64,
    y: f64,
}

#[derive(Serialize, Deserialize, Debug)]
struct LinkRow {
    id: i32,
    left_stop: i32,
    right_stop: i32,
    length: f64,
    lower_bound: i32,
    upper_bound: i32,
}

#[derive(Serialize, Deserialize, Debug)]
struct LoadRow {
    link: i32,
    load: f64,
    lower_frequency: i32,
    upper_frequency: i32,
}

#[derive(Serialize, Deserialize, Debug)]
struct HeadwayRow {
    link: i32,
    headway: i32,
}

#[derive(Serialize, Deserialize, Debug)]
struct PoolRow {
    line: i32,
    order: i32,
    link: i32,
}

#[derive(Serialize, Deserialize, Debug)]
struct PoolCostRow {
    line: i32,
    length: f64,
    cost: f64,
}

#[derive(Serialize, Deserialize, Debug)]
struct LineConceptRow {
    line: i32,
    order: i32,
    link: i32,
    frequency: u32,
}

#[derive(Serialize, Deserialize, Debug)]
struct OdRow {
    origin: i32,
    destination: i32,
    passengers: f64,
}

#[derive(Serialize, Deserialize, Debug)]
struct PeriodicEventRow {
    id: i32,
    event_type: String,
    stop: i32,
    line: i32,
    passengers: f64,
    direction: String,
    repetition: u32,
}

#[derive(Serialize, Deserialize, Debug)]
struct PeriodicActivityRow {
    id: i32,
    activity_type: String,
    tail: i32,
    head: i32,
    lower_bound: i32,
    upper_bound: i32,
    passengers: f64,
}

#[derive(Serialize, Deserialize, Debug)]
struct PeriodicTimeRow {
    event: i32,
    time: i64,
}

#[derive(Serialize, Deserialize, Debug)]
struct AperiodicEventRow {
    id: i32,
    periodic_id: i32,
    event_type: String,
    time: i64,
    passengers: f64,
    stop: i32,
}

#[derive(Serialize, Deserialize, Debug)]
struct AperiodicActivityRow {
    id: i32,
    periodic_id: i32,
    activity_type: String,
    tail: i32,
    head: i32,
    lower_bound: i32,
    upper_bound: i32,
    passengers: i64,
}

#[derive(Serialize, Deserialize, Debug)]
struct AperiodicTimeRow {
    event: i32,
    time: i64,
}

#[derive(Serialize, Deserialize, Debug)]
struct VehicleScheduleRow {
    circulation: i32,
    vehicle: i32,
    trip_number: i32,
    trip_type: String,
    start_aperiodic_event: i32,
    start_periodic_event: i32,
    start_stop: i32,
    start_time: i64,
    end_aperiodic_event: i32,
    end_periodic_event: i32,
    end_stop: i32,
    end_time: i64,
    line: i32,
}

#[derive(Serialize, Deserialize, Debug)]
struct TripRow {
    start_aperiodic_event: i32,
    start_periodic_event: i32,
    start_stop: i32,
    start_time: i64,
    end_aperiodic_event: i32,
    end_periodic_event: i32,
    end_stop: i32,
    end_time: i64,
    line: i32,
}

#[derive(Serialize, Deserialize, Debug)]
struct EndEventRow {
    circulation: i32,
    vehicle: i32,
    event: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_file_with_content, get_file_content, test_in_tmp_dir};
    use pretty_assertions::assert_eq;

    #[test]
    fn rows_are_trimmed_and_unquoted() {
        test_in_tmp_dir(|path| {
            let file = create_file_with_content(
                path,
                "Stop.giv",
                "# stop-id; short-name; long-name; x; y\n1; \"A\"; \"Alpha\"; 0.5; 1\n\n2;B;Beta;2;3\n",
            );
            let rows = read_rows::<StopRow>(&file, 5).unwrap();
            assert_eq!(2, rows.len());
            assert_eq!(2, rows[0].0);
            assert_eq!("Alpha", rows[0].1.long_name);
            assert_eq!(0.5, rows[0].1.x);
            assert_eq!("B", rows[1].1.short_name);
            assert_eq!(4, rows[1].0);
        });
    }

    #[test]
    fn quoted_separators_stay_in_the_field() {
        test_in_tmp_dir(|path| {
            let file = create_file_with_content(
                path,
                "Stop.giv",
                "1; \"A;B\"; \"Say \"\"hi\"\"; later\"; 0; 0\n",
            );
            let rows = read_rows::<StopRow>(&file, 5).unwrap();
            assert_eq!("A;B", rows[0].1.short_name);
            assert_eq!("Say \"hi\"; later", rows[0].1.long_name);
        });
    }

    #[test]
    fn wrong_column_count() {
        test_in_tmp_dir(|path| {
            let file = create_file_with_content(path, "Headway.giv", "# link; headway\n1; 2; 3\n");
            let error = read_rows::<HeadwayRow>(&file, 2).unwrap_err();
            match error.downcast_ref::<LinTimError>() {
                Some(LinTimError::InputFormat {
                    line,
                    expected,
                    found,
                    ..
                }) => {
                    assert_eq!((2, 2, 3), (*line, *expected, *found));
                }
                other => panic!("unexpected error {:?}", other),
            }
        });
    }

    #[test]
    fn wrong_column_type() {
        test_in_tmp_dir(|path| {
            let file = create_file_with_content(
                path,
                "Headway.giv",
                "# link; headway\n\n1; 2\n# second\n2; two\n",
            );
            let error = read_rows::<HeadwayRow>(&file, 2).unwrap_err();
            match error.downcast_ref::<LinTimError>() {
                Some(LinTimError::InputTypeInconsistency {
                    line,
                    column,
                    value,
                    expected,
                    ..
                }) => {
                    assert_eq!(5, *line);
                    assert_eq!(2, *column);
                    assert_eq!("two", value);
                    assert_eq!("integer", *expected);
                }
                other => panic!("unexpected error {:?}", other),
            }
        });
    }

    #[test]
    fn missing_optional_file() {
        test_in_tmp_dir(|path| {
            let rows = read_optional_rows::<HeadwayRow>(&path.join("Headway.giv"), 2).unwrap();
            assert!(rows.is_empty());
            assert!(read_rows::<HeadwayRow>(&path.join("Headway.giv"), 2).is_err());
        });
    }

    #[test]
    fn written_rows() {
        test_in_tmp_dir(|path| {
            let file = path.join("basis/OD.giv");
            let rows = vec![
                OdRow {
                    origin: 1,
                    destination: 3,
                    passengers: 7.0,
                },
                OdRow {
                    origin: 3,
                    destination: 1,
                    passengers: 2.5,
                },
            ];
            write_rows(&file, "origin; destination; passengers", rows).unwrap();
            assert_eq!(
                "# origin; destination; passengers\n1; 3; 7.0\n3; 1; 2.5\n",
                get_file_content(&file)
            );
        });
    }
}
