use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::catalog::Label;

use super::{Dataset, DatasetError, LabeledExample, ParseErrorKind, SparseFeatures};

/// Read and validate a dataset file.
///
/// Any malformed line aborts the read with its 1-based line number; a
/// partially parsed dataset is never returned.
pub fn read_dataset(path: &Path) -> Result<Dataset, DatasetError> {
    let file = File::open(path).map_err(|source| DatasetError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    parse_dataset(BufReader::new(file), path)
}

/// Parse dataset lines from any buffered reader; `origin` labels errors.
pub fn parse_dataset<R: BufRead>(reader: R, origin: &Path) -> Result<Dataset, DatasetError> {
    let mut examples = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line_number = idx + 1;
        let line = line.map_err(|source| DatasetError::Read {
            path: origin.to_path_buf(),
            line: line_number,
            source,
        })?;
        if line.trim_start().starts_with('#') {
            continue;
        }
        let example = parse_line(&line).map_err(|kind| DatasetError::Parse {
            path: origin.to_path_buf(),
            line: line_number,
            kind,
        })?;
        examples.push(example);
    }
    Ok(Dataset { examples })
}

fn parse_line(line: &str) -> Result<LabeledExample, ParseErrorKind> {
    // Trailing `# info` is allowed on data lines.
    let content = line.split_once('#').map_or(line, |(data, _)| data);
    let mut tokens = content.split_whitespace();
    let label = parse_label(tokens.next().ok_or(ParseErrorKind::MissingLabel)?)?;

    let features = parse_features(tokens)?;
    Ok(LabeledExample { label, features })
}

/// Parse `index:value` tokens with 1-based, strictly increasing indices.
pub(crate) fn parse_features<'a, I>(tokens: I) -> Result<SparseFeatures, ParseErrorKind>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut features = SparseFeatures::new();
    let mut previous: Option<u32> = None;
    for token in tokens {
        let (index_text, value_text) = token
            .split_once(':')
            .ok_or_else(|| ParseErrorKind::MalformedPair(token.to_string()))?;
        let index = index_text
            .parse::<u32>()
            .map_err(|_| ParseErrorKind::InvalidIndex(index_text.to_string()))?;
        if index == 0 {
            return Err(ParseErrorKind::ZeroIndex);
        }
        if let Some(previous) = previous
            && index <= previous
        {
            return Err(ParseErrorKind::NonIncreasingIndex { previous, index });
        }
        let value = value_text
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| ParseErrorKind::InvalidValue(value_text.to_string()))?;
        features.insert(index, value);
        previous = Some(index);
    }
    Ok(features)
}

fn parse_label(token: &str) -> Result<Label, ParseErrorKind> {
    if token.contains(':') {
        return Err(ParseErrorKind::MissingLabel);
    }
    match token.parse::<f64>() {
        Ok(value) if value == 1.0 => Ok(Label::Positive),
        Ok(value) if value == -1.0 => Ok(Label::Negative),
        _ => Err(ParseErrorKind::InvalidLabel(token.to_string())),
    }
}
