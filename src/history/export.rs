use super::record::Measurement;
use crate::errors::NetSpeedError;
use chrono::NaiveDateTime;
use csv::{Terminator, WriterBuilder};
use std::io::Write;

/// Header row of every export.
pub const EXPORT_HEADER: [&str; 6] = [
    "Numéro",
    "Date",
    "Download (Mbps)",
    "Upload (Mbps)",
    "Ping (ms)",
    "Serveur",
];

/// Write `records` as semicolon-delimited text, oldest first.
pub fn write_csv<'a, W: Write>(
    writer: W,
    records: impl IntoIterator<Item = &'a Measurement>,
) -> Result<(), NetSpeedError> {
    let failed = |e: csv::Error| {
        NetSpeedError::persistence("could not write export").with_source(e)
    };

    let mut csv = WriterBuilder::new()
        .delimiter(b';')
        .terminator(Terminator::Any(b'\n'))
        .from_writer(writer);

    csv.write_record(EXPORT_HEADER).map_err(failed)?;

    for record in records {
        csv.write_record([
            record.count.to_string(),
            record.timestamp_string(),
            format_decimal(record.download),
            format_decimal(record.upload),
            format_decimal(record.ping),
            record.server.clone(),
        ])
        .map_err(failed)?;
    }

    csv.flush().map_err(|e| {
        NetSpeedError::persistence("could not write export").with_source(e)
    })
}

/// Name of the export file for an export started at `now`.
pub fn export_file_name(now: NaiveDateTime) -> String {
    format!("speedtest_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

/// Shortest representation that reads back to the same value, always
/// with a decimal point (`50.5`, `10.0`).
fn format_decimal(value: f64) -> String {
    format!("{:?}", value)
}
