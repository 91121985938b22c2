//! Row parser/normalizer
//!
//! Turns raw CSV records into typed [`ParcelRow`]s. Malformed rows are
//! skipped with a warning and the run continues; only structural
//! problems (missing shipment-identifier column, zero parsed rows) fail
//! the batch.

use chrono::NaiveDateTime;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

use super::models::ParcelRow;
use super::{IngestError, IngestMode};

/// Expected upload datetime format: `YYYY-MM-DD HH:mm:ss`
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const COL_SHIPMENT_ID: &str = "ShipmentID";
pub const COL_DEPARTURE_TIME: &str = "Departure_time";
pub const COL_ESTIMATED_ARRIVAL: &str = "Estimated_arrival";
pub const COL_TOTAL_WEIGHT: &str = "Total_Weight";
pub const COL_TOTAL_VOLUME: &str = "Total_Volume";
pub const COL_ORIGIN_HUB: &str = "OriginHubID";
pub const COL_DESTINATION_HUB: &str = "DestinationHubID";
pub const COL_VEHICLE_ID: &str = "VehicleID";
pub const COL_EMP_ID: &str = "EmpID";
pub const COL_WIDTH: &str = "Width";
pub const COL_HEIGHT: &str = "Height";
pub const COL_LENGTH: &str = "Length";
pub const COL_WEIGHT: &str = "Weight";
pub const COL_PRICE: &str = "Price";
pub const COL_SENDER: &str = "Sender";
pub const COL_SENDER_TEL: &str = "Sender_Tel";
pub const COL_RECEIVER: &str = "Receiver";
pub const COL_RECEIVER_TEL: &str = "Receiver_Tel";
pub const COL_SHIPPING_TYPE: &str = "ShippingTypeID";
pub const COL_ADDRESS: &str = "Address";
pub const COL_SUBDISTRICT: &str = "Subdistrict";
pub const COL_DISTRICT: &str = "District";
pub const COL_PROVINCE: &str = "Province";
pub const COL_POSTAL_CODE: &str = "Postal_code";

/// Failure affecting a single row; the row is skipped, the run continues
#[derive(Debug, Error)]
pub enum RowError {
    #[error("missing required column '{column}'")]
    Missing { column: &'static str },

    #[error("invalid numeric value '{value}' in column '{column}'")]
    Numeric { column: &'static str, value: String },

    #[error("invalid datetime value '{value}' in column '{column}'")]
    Datetime { column: &'static str, value: String },
}

/// Parser output: typed rows in original input order, plus the number
/// of rows dropped by row-level errors
#[derive(Debug)]
pub struct ParsedRows {
    pub rows: Vec<ParcelRow>,
    pub skipped: usize,
}

/// Parser for uploaded shipment/parcel CSV files
pub struct RowParser {
    mode: IngestMode,
}

impl RowParser {
    pub fn new(mode: IngestMode) -> Self {
        Self { mode }
    }

    /// Parse the full upload
    ///
    /// Row-level failures (missing field, bad number, bad datetime,
    /// ragged record) skip the row only. A missing shipment-identifier
    /// column in full-shipment mode and an effectively empty batch are
    /// batch-level errors.
    pub fn parse(&self, input: &[u8]) -> Result<ParsedRows, IngestError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(input);

        let headers = reader.headers().map_err(IngestError::Csv)?.clone();
        let columns: HashMap<&str, usize> = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (name, idx))
            .collect();

        if self.mode == IngestMode::FullShipment && !columns.contains_key(COL_SHIPMENT_ID) {
            return Err(IngestError::MissingColumn(COL_SHIPMENT_ID));
        }

        let mut rows = Vec::new();
        let mut skipped = 0usize;
        let mut line = 1usize;

        for record in reader.records() {
            line += 1;
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    warn!(line, error = %e, "Skipping unreadable row");
                    skipped += 1;
                    continue;
                },
            };

            match self.parse_record(&record, &columns) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    warn!(line, error = %e, "Skipping malformed row");
                    skipped += 1;
                },
            }
        }

        if rows.is_empty() {
            return Err(IngestError::EmptyBatch);
        }

        debug!(rows = rows.len(), skipped, "Parsed upload");

        Ok(ParsedRows { rows, skipped })
    }

    /// Parse a single record into a typed row
    fn parse_record(
        &self,
        record: &csv::StringRecord,
        columns: &HashMap<&str, usize>,
    ) -> Result<ParcelRow, RowError> {
        let text = |column: &'static str| -> Result<String, RowError> {
            columns
                .get(column)
                .and_then(|idx| record.get(*idx))
                .map(|value| value.trim().to_string())
                .ok_or(RowError::Missing { column })
        };

        let number = |column: &'static str| -> Result<f64, RowError> {
            let value = text(column)?;
            value.parse().map_err(|_| RowError::Numeric { column, value })
        };

        let datetime = |column: &'static str| -> Result<NaiveDateTime, RowError> {
            let value = text(column)?;
            NaiveDateTime::parse_from_str(&value, DATETIME_FORMAT)
                .map_err(|_| RowError::Datetime { column, value })
        };

        let (
            shipment_id,
            departure_time,
            estimated_arrival,
            total_weight,
            total_volume,
            origin_hub_id,
            destination_hub_id,
            vehicle_id,
            emp_id,
        ) = match self.mode {
            IngestMode::FullShipment => (
                Some(text(COL_SHIPMENT_ID)?),
                Some(datetime(COL_DEPARTURE_TIME)?),
                Some(datetime(COL_ESTIMATED_ARRIVAL)?),
                Some(number(COL_TOTAL_WEIGHT)?),
                Some(number(COL_TOTAL_VOLUME)?),
                Some(text(COL_ORIGIN_HUB)?),
                Some(text(COL_DESTINATION_HUB)?),
                Some(text(COL_VEHICLE_ID)?),
                Some(text(COL_EMP_ID)?),
            ),
            IngestMode::ParcelsOnly => (None, None, None, None, None, None, None, None, None),
        };

        Ok(ParcelRow {
            shipment_id,
            departure_time,
            estimated_arrival,
            total_weight,
            total_volume,
            origin_hub_id,
            destination_hub_id,
            vehicle_id,
            emp_id,
            width: number(COL_WIDTH)?,
            height: number(COL_HEIGHT)?,
            length: number(COL_LENGTH)?,
            weight: number(COL_WEIGHT)?,
            price: number(COL_PRICE)?,
            sender: text(COL_SENDER)?,
            sender_tel: text(COL_SENDER_TEL)?,
            receiver: text(COL_RECEIVER)?,
            receiver_tel: text(COL_RECEIVER_TEL)?,
            shipping_type_id: text(COL_SHIPPING_TYPE)?,
            address: text(COL_ADDRESS)?,
            subdistrict: text(COL_SUBDISTRICT)?,
            district: text(COL_DISTRICT)?,
            province: text(COL_PROVINCE)?,
            // Postal codes keep their content verbatim (leading zeros
            // included); only surrounding whitespace is removed.
            postal_code: text(COL_POSTAL_CODE)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_HEADER: &str = "ShipmentID,Departure_time,Estimated_arrival,Total_Weight,Total_Volume,OriginHubID,DestinationHubID,VehicleID,EmpID,Width,Height,Length,Weight,Price,Sender,Sender_Tel,Receiver,Receiver_Tel,ShippingTypeID,Address,Subdistrict,District,Province,Postal_code";

    const PARCEL_HEADER: &str = "Width,Height,Length,Weight,Price,Sender,Sender_Tel,Receiver,Receiver_Tel,ShippingTypeID,Address,Subdistrict,District,Province,Postal_code";

    fn full_row(shipment: &str, destination: &str) -> String {
        format!(
            "{shipment},2026-01-10 08:00:00,2026-01-11 18:00:00,120.5,3.2,HUB-A,{destination},V1,E1,10,20,30,1.5,99.0,Ann,0811111111,Bob,0822222222,EXP,1 Main Rd,Suan Luang,Krathum Baen,Samut Sakhon,74110"
        )
    }

    #[test]
    fn test_parse_full_mode_rows() {
        let csv = format!("{FULL_HEADER}\n{}\n{}", full_row("S1", "HUB-B"), full_row("S1", "HUB-C"));
        let parsed = RowParser::new(IngestMode::FullShipment)
            .parse(csv.as_bytes())
            .unwrap();

        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.skipped, 0);

        let row = &parsed.rows[0];
        assert_eq!(row.shipment_id.as_deref(), Some("S1"));
        assert_eq!(row.destination_hub_id.as_deref(), Some("HUB-B"));
        assert_eq!(row.width, 10.0);
        assert_eq!(row.price, 99.0);
        assert_eq!(
            row.departure_time.unwrap().format(DATETIME_FORMAT).to_string(),
            "2026-01-10 08:00:00"
        );
    }

    #[test]
    fn test_postal_code_preserved_verbatim() {
        // Leading zero must survive; this column is trimmed, never
        // numerically coerced.
        let csv = format!("{FULL_HEADER}\n{}", full_row("S1", "HUB-B").replace("74110", " 01234 "));
        let parsed = RowParser::new(IngestMode::FullShipment)
            .parse(csv.as_bytes())
            .unwrap();

        assert_eq!(parsed.rows[0].postal_code, "01234");
    }

    #[test]
    fn test_malformed_row_is_skipped_not_fatal() {
        let bad = full_row("S2", "HUB-B").replace("99.0", "not-a-price");
        let csv = format!("{FULL_HEADER}\n{}\n{bad}", full_row("S1", "HUB-B"));
        let parsed = RowParser::new(IngestMode::FullShipment)
            .parse(csv.as_bytes())
            .unwrap();

        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.skipped, 1);
    }

    #[test]
    fn test_bad_datetime_is_skipped() {
        let bad = full_row("S1", "HUB-B").replace("2026-01-10 08:00:00", "10/01/2026");
        let csv = format!("{FULL_HEADER}\n{bad}\n{}", full_row("S1", "HUB-B"));
        let parsed = RowParser::new(IngestMode::FullShipment)
            .parse(csv.as_bytes())
            .unwrap();

        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.skipped, 1);
    }

    #[test]
    fn test_missing_shipment_column_is_batch_error() {
        let csv = format!("{PARCEL_HEADER}\n10,20,30,1.5,99.0,Ann,08,Bob,08,EXP,a,b,c,d,74110");
        let result = RowParser::new(IngestMode::FullShipment).parse(csv.as_bytes());

        assert!(matches!(result, Err(IngestError::MissingColumn(COL_SHIPMENT_ID))));
    }

    #[test]
    fn test_all_rows_malformed_is_empty_batch() {
        let csv = format!("{FULL_HEADER}\nS1,broken");
        let result = RowParser::new(IngestMode::FullShipment).parse(csv.as_bytes());

        assert!(matches!(result, Err(IngestError::EmptyBatch)));
    }

    #[test]
    fn test_parcels_only_mode_without_shipment_columns() {
        let csv = format!("{PARCEL_HEADER}\n10,20,30,1.5,99.0,Ann,08,Bob,08,EXP,1 Main Rd,b,c,d,74110");
        let parsed = RowParser::new(IngestMode::ParcelsOnly)
            .parse(csv.as_bytes())
            .unwrap();

        assert_eq!(parsed.rows.len(), 1);
        let row = &parsed.rows[0];
        assert!(row.shipment_id.is_none());
        assert!(row.departure_time.is_none());
        assert_eq!(row.address, "1 Main Rd");
    }
}
