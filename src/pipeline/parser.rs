//! Delimited shipment record parser.
//!
//! One record per line: `shipmentCode,supplierCode,itemCode,quantity,shipmentDate`
//! with the date as `YYYY-MM-DD`. No quoting; fields are trimmed.

use chrono::NaiveDate;

use crate::config::PipelineConfig;
use crate::pipeline::error::ParseError;
use crate::pipeline::record::SourceRecord;

const FIELDS: usize = 5;
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    pub separator: char,
    pub skip_header: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            separator: ',',
            skip_header: false,
        }
    }
}

impl From<&PipelineConfig> for ParserOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            separator: config.separator,
            skip_header: config.skip_header,
        }
    }
}

/// Parse every record in `raw`, failing on the first malformed line.
pub fn parse_records(raw: &str, options: &ParserOptions) -> Result<Vec<SourceRecord>, ParseError> {
    let mut records = Vec::new();
    let skip = usize::from(options.skip_header);

    for (index, line) in raw.split('\n').enumerate().skip(skip) {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        records.push(parse_line(index + 1, line, options.separator)?);
    }
    Ok(records)
}

fn parse_line(line_no: usize, line: &str, separator: char) -> Result<SourceRecord, ParseError> {
    let fields: Vec<&str> = line.split(separator).map(str::trim).collect();
    if fields.len() != FIELDS {
        return Err(ParseError::FieldCount {
            line: line_no,
            expected: FIELDS,
            found: fields.len(),
        });
    }

    let required = |value: &str, field: &'static str| {
        if value.is_empty() {
            Err(ParseError::EmptyField { line: line_no, field })
        } else {
            Ok(value.to_string())
        }
    };

    let shipment_code = required(fields[0], "shipment code")?;
    let supplier_code = required(fields[1], "supplier code")?;
    let item_code = required(fields[2], "item code")?;
    let quantity = fields[3].parse::<u32>().map_err(|_| ParseError::Quantity {
        line: line_no,
        value: fields[3].to_string(),
    })?;
    let shipment_date = NaiveDate::parse_from_str(fields[4], DATE_FORMAT).map_err(|_| ParseError::Date {
        line: line_no,
        value: fields[4].to_string(),
    })?;

    Ok(SourceRecord {
        shipment_code,
        supplier_code,
        item_code,
        quantity,
        shipment_date,
    })
}
