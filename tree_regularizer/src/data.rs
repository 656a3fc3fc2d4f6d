use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use machine_learning::Dataset;
use rand::{Rng, seq::SliceRandom};

use crate::error::{Result, TrainErr};

/// Parses whitespace separated rows of numbers, the last column of each being its target.
///
/// Blank lines and lines starting with `#` are skipped. Every row must have as many columns
/// as the first one.
pub fn parse_rows<R: BufRead>(reader: R) -> Result<Dataset> {
    let mut values = Vec::new();
    let mut width = None;

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let row = line
            .split_whitespace()
            .map(str::parse::<f32>)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| TrainErr::Parse {
                line: i + 1,
                msg: e.to_string(),
            })?;

        match width {
            None if row.len() < 2 => {
                return Err(TrainErr::Parse {
                    line: i + 1,
                    msg: format!("expected features and a target, got {} columns", row.len()),
                });
            }
            None => width = Some(row.len()),
            Some(w) if w != row.len() => {
                return Err(TrainErr::Parse {
                    line: i + 1,
                    msg: format!("expected {w} columns, got {}", row.len()),
                });
            }
            Some(_) => {}
        }

        values.extend(row);
    }

    let Some(width) = width else {
        return Err(TrainErr::EmptyInput { what: "dataset" });
    };

    Ok(Dataset::new(values, width - 1, 1)?)
}

/// Reads a dataset file, see `parse_rows`.
pub fn read_rows<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let file = File::open(path)?;
    parse_rows(BufReader::new(file))
}

/// Writes every sample of `dataset` as a whitespace separated row.
pub fn write_rows<W: Write>(writer: W, dataset: &Dataset) -> Result<()> {
    let mut writer = BufWriter::new(writer);

    for row in dataset.rows().rows() {
        let line: Vec<String> = row.iter().map(|v| format!("{v:.18e}")).collect();
        writeln!(writer, "{}", line.join(" "))?;
    }

    writer.flush()?;
    Ok(())
}

/// Shuffles the samples and splits them into a training and a test set.
///
/// # Arguments
/// * `dataset` - The samples to split.
/// * `test_fraction` - The fraction of samples, rounded up, that go to the test set.
/// * `rng` - Shuffles the samples.
///
/// # Returns
/// `(train, test)` or `InsufficientData` if either set would be empty.
pub fn train_test_split<R: Rng>(
    dataset: &Dataset,
    test_fraction: f64,
    rng: &mut R,
) -> Result<(Dataset, Dataset)> {
    let n = dataset.len();
    let n_test = (n as f64 * test_fraction).ceil() as usize;

    if n_test == 0 || n_test >= n {
        return Err(TrainErr::InsufficientData {
            got: n,
            required: 2,
        });
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);
    let (test, train) = order.split_at(n_test);

    Ok((dataset.select(train)?, dataset.select(test)?))
}
