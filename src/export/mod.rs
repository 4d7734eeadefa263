//! CSV export of the flattened report rows.

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Serialize `rows` with a header line taken from the row type's field names.
pub fn write_rows<W: Write, T: Serialize>(out: W, rows: &[T]) -> Result<usize> {
    let mut writer = csv::WriterBuilder::new().has_headers(true).from_writer(out);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(rows.len())
}

/// Write `rows` to `<dir>/<name>.csv`, creating `dir` when needed.
pub fn export_to_dir<T: Serialize>(dir: &Path, name: &str, rows: &[T]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("create {:?}", dir))?;
    let path = dir.join(format!("{}.csv", name));
    let file = std::fs::File::create(&path).with_context(|| format!("create {:?}", path))?;

    let n = write_rows(file, rows).with_context(|| format!("write {:?}", path))?;
    info!("📄 {} rows → {:?}", n, path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Channel, ReportRow, StayRow};
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn test_report_rows_csv() {
        let rows = vec![ReportRow {
            date: day(10),
            booking_no: "ABC123".into(),
            guest_name: "Asha, R".into(),
            status: "Checked Out".into(),
            source: Channel::WalkIn,
            checkin: Some(day(9)),
            checkout: Some(day(11)),
            cash: 500.0,
            qr: 0.0,
            online: 250.5,
            discount: 0.0,
            total_paid: 750.5,
            times: "09:15, 18:40".into(),
        }];

        let mut buf = Vec::new();
        assert_eq!(write_rows(&mut buf, &rows).unwrap(), 1);
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();

        assert_eq!(
            lines.next().unwrap(),
            "Date,Booking Id,Guest Name,Status,Booking Source,Check In,Check Out,Cash,QR,Online,Discount,Total Paid,Time"
        );
        assert_eq!(
            lines.next().unwrap(),
            "2024-05-10,ABC123,\"Asha, R\",Checked Out,Walk-in,2024-05-09,2024-05-11,500.0,0.0,250.5,0.0,750.5,\"09:15, 18:40\""
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_export_stay_rows_to_dir() {
        let dir = std::env::temp_dir().join(format!("hotel_reports_csv_{}", std::process::id()));
        let rows = vec![StayRow {
            date: day(10),
            booking_no: "XYZ9".into(),
            guest_name: "Ravi".into(),
            source: Channel::Oyo,
            checkin: Some(day(10)),
            checkout: None,
            rooms: 2,
            room_numbers: "101, 102".into(),
            amount: 1500.0,
            cash: 0.0,
            qr: 0.0,
            online: 1500.0,
            discount: 0.0,
            balance: 0.0,
        }];

        let path = export_to_dir(&dir, "occupancy_2024-05-10", &rows).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Date,Booking Id,Guest Name,Booking Source,Check In,Check Out,Rooms"));
        assert!(text.contains("XYZ9,Ravi,OYO,2024-05-10,,2,\"101, 102\",1500.0"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_empty_export_writes_nothing() {
        let mut buf = Vec::new();
        assert_eq!(write_rows::<_, ReportRow>(&mut buf, &[]).unwrap(), 0);
        assert!(buf.is_empty());
    }
}
