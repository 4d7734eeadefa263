//! Spreadsheet builders: one sheet per property, a consolidated sheet, and for
//! the date-wise report a property ranking.

use chrono::NaiveDate;
use rust_xlsxwriter::{
    Chart, ChartPoint, ChartSolidFill, ChartType, Color, Format, FormatAlign, FormatBorder,
    Workbook, Worksheet, XlsxError,
};
use std::collections::HashSet;

use super::ReportError;
use crate::aggregate::{DailyCollection, HourlyCash, HourlyChannels, ModeTotals, rank};
use crate::models::Channel;

pub const CONSOLIDATED: &str = "CONSOLIDATED";
pub const RANKING: &str = "PROPERTY RANKING";

const HEADER_FILL: u32 = 0x1F4E78;
const GRID: u32 = 0xDDDDDD;
const AMOUNT: &str = "#,##0.00";

/// Night blues through daylight yellows to evening reds, one per hour.
const SUNLIGHT: [u32; 24] = [
    0x0B3D91, 0x0F52BA, 0x1C6ED5, 0x2E86DE, 0x5DADE2, 0x85C1E9, 0xAED6F1, 0xF9E79F,
    0xF7DC6F, 0xF4D03F, 0xF1C40F, 0xF39C12, 0xEB984E, 0xE67E22, 0xDC7633, 0xD35400,
    0xCD6155, 0xC0392B, 0xA93226, 0x922B21, 0x7B241C, 0x641E16, 0x512E5F, 0x2C3E50,
];

const PASTEL: [u32; 24] = [
    0xEEF3FB, 0xE8F0FA, 0xE3EDFA, 0xDEEAFA, 0xD9F2FF, 0xDFF7FF, 0xE6FBFF, 0xFFF9DB,
    0xFFF4CC, 0xFFEFB3, 0xFFE699, 0xFFDD80, 0xFFE0CC, 0xFFD6B3, 0xFFCC99, 0xFFC280,
    0xFFD9D9, 0xFFD1D1, 0xFFC9C9, 0xFFC1C1, 0xF3E5F5, 0xEDE7F6, 0xE8EAF6, 0xE3F2FD,
];

// ── Formats ───────────────────────────────────────────────────────────────────

fn header() -> Format {
    Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_align(FormatAlign::Center)
        .set_border(FormatBorder::Thin)
        .set_border_color(Color::RGB(GRID))
}

fn cell(fill: u32, white_bold: bool) -> Format {
    let f = Format::new()
        .set_background_color(Color::RGB(fill))
        .set_align(FormatAlign::Center)
        .set_border(FormatBorder::Thin)
        .set_border_color(Color::RGB(GRID));
    if white_bold {
        f.set_bold().set_font_color(Color::White)
    } else {
        f
    }
}

fn total() -> Format {
    Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::Black)
        .set_align(FormatAlign::Center)
        .set_border(FormatBorder::Thin)
}

fn write_header(ws: &mut Worksheet, columns: &[(&str, f64)]) -> Result<(), XlsxError> {
    let fmt = header();
    for (col, (name, width)) in columns.iter().enumerate() {
        ws.write_string_with_format(0, col as u16, *name, &fmt)?;
        ws.set_column_width(col as u16, *width)?;
    }
    ws.set_freeze_panes(1, 0)?;
    Ok(())
}

/// "12AM - 1AM" … "11PM - 12AM".
pub fn hour_label(hour: u32) -> String {
    fn clock(h: u32) -> String {
        let h = h % 24;
        let n = if h % 12 == 0 { 12 } else { h % 12 };
        format!("{}{}", n, if h < 12 { "AM" } else { "PM" })
    }
    format!("{} - {}", clock(hour), clock(hour + 1))
}

// ── Sheet names ───────────────────────────────────────────────────────────────

/// At most 31 characters, none of `[]:*?/\`, no surrounding apostrophes.
pub fn sanitize_sheet_name(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '_' } else { c })
        .collect();
    let name: String = cleaned.trim_matches('\'').chars().take(31).collect();
    if name.is_empty() { "Sheet".to_string() } else { name }
}

/// Hands out sheet names that are unique ignoring case, as Excel requires.
#[derive(Default)]
struct SheetNamer {
    used: HashSet<String>,
}

impl SheetNamer {
    fn reserving(names: &[&str]) -> Self {
        let mut namer = Self::default();
        for n in names {
            namer.used.insert(n.to_lowercase());
        }
        namer
    }

    fn name(&mut self, raw: &str) -> String {
        let base = sanitize_sheet_name(raw);
        let mut name = base.clone();
        let mut n = 2;
        while !self.used.insert(name.to_lowercase()) {
            let suffix = format!(" ({})", n);
            let keep: String = base.chars().take(31 - suffix.len()).collect();
            name = format!("{}{}", keep, suffix);
            n += 1;
        }
        name
    }
}

// ── Hourly cash ───────────────────────────────────────────────────────────────

pub fn hourly_cash(
    date: NaiveDate,
    properties: &[(String, HourlyCash)],
    consolidated: &HourlyCash,
) -> Result<Vec<u8>, ReportError> {
    if properties.is_empty() {
        return Err(ReportError::Empty);
    }
    let mut wb = Workbook::new();
    let mut names = SheetNamer::reserving(&[CONSOLIDATED]);
    for (prop, cash) in properties {
        cash_sheet(&mut wb, &names.name(prop), date, cash)?;
    }
    cash_sheet(&mut wb, CONSOLIDATED, date, consolidated)?;
    Ok(wb.save_to_buffer()?)
}

fn cash_sheet(wb: &mut Workbook, name: &str, date: NaiveDate, cash: &HourlyCash) -> Result<(), XlsxError> {
    let ws = wb.add_worksheet();
    ws.set_name(name)?;
    write_header(ws, &[("Date", 15.0), ("Time (Hourly)", 18.0), ("Cash", 12.0)])?;

    let day = date.format("%Y-%m-%d").to_string();
    for (h, amount) in cash.hours().iter().enumerate() {
        let row = h as u32 + 1;
        let fmt = cell(SUNLIGHT[h], true);
        ws.write_string_with_format(row, 0, day.as_str(), &fmt)?;
        ws.write_string_with_format(row, 1, hour_label(h as u32).as_str(), &fmt)?;
        ws.write_number_with_format(row, 2, *amount, &fmt.clone().set_num_format(AMOUNT))?;
    }

    let t = total();
    ws.write_blank(25, 0, &t)?;
    ws.write_string_with_format(25, 1, "TOTAL", &t)?;
    ws.write_number_with_format(25, 2, cash.total(), &t.clone().set_num_format(AMOUNT))?;

    let mut chart = Chart::new(ChartType::Column);
    chart
        .add_series()
        .set_categories((name, 1, 1, 24, 1))
        .set_values((name, 1, 2, 24, 2))
        .set_name("Cash");
    chart.title().set_name("Hourly Cash Collection");
    chart.legend().set_hidden();
    ws.insert_chart(1, 4, &chart)?;
    Ok(())
}

// ── Booking modes ─────────────────────────────────────────────────────────────

pub fn booking_modes(
    date: NaiveDate,
    properties: &[(String, HourlyChannels)],
    consolidated: &HourlyChannels,
) -> Result<Vec<u8>, ReportError> {
    if properties.is_empty() {
        return Err(ReportError::Empty);
    }
    let mut wb = Workbook::new();
    let mut names = SheetNamer::reserving(&[CONSOLIDATED]);
    for (prop, counts) in properties {
        modes_sheet(&mut wb, &names.name(prop), date, counts)?;
    }
    modes_sheet(&mut wb, CONSOLIDATED, date, consolidated)?;
    Ok(wb.save_to_buffer()?)
}

fn modes_sheet(
    wb: &mut Workbook,
    name: &str,
    date: NaiveDate,
    counts: &HourlyChannels,
) -> Result<(), XlsxError> {
    let ws = wb.add_worksheet();
    ws.set_name(name)?;

    let mut columns = vec![("Date", 14.0), ("Time (Hourly)", 18.0)];
    columns.extend(Channel::ALL.iter().map(|c| (c.label(), 10.0)));
    columns.push(("Total", 12.0));
    write_header(ws, &columns)?;
    let total_col = columns.len() as u16 - 1;

    let day = date.format("%d-%m-%Y").to_string();
    for h in 0..24u32 {
        let row = h + 1;
        let fmt = cell(PASTEL[h as usize], false);
        let hour = counts.hour(h);
        ws.write_string_with_format(row, 0, day.as_str(), &fmt)?;
        ws.write_string_with_format(row, 1, hour_label(h).as_str(), &fmt)?;
        for (i, ch) in Channel::ALL.iter().enumerate() {
            ws.write_number_with_format(row, 2 + i as u16, hour.get(*ch) as f64, &fmt)?;
        }
        ws.write_number_with_format(row, total_col, hour.total() as f64, &fmt)?;
    }

    let t = total();
    let sums = counts.column_totals();
    ws.write_blank(25, 0, &t)?;
    ws.write_string_with_format(25, 1, "TOTAL", &t)?;
    for (i, ch) in Channel::ALL.iter().enumerate() {
        ws.write_number_with_format(25, 2 + i as u16, sums.get(*ch) as f64, &t)?;
    }
    ws.write_number_with_format(25, total_col, sums.total() as f64, &t)?;

    for (i, ch) in Channel::ALL.iter().enumerate() {
        let col = 2 + i as u16;
        let points: Vec<ChartPoint> = PASTEL
            .iter()
            .map(|c| ChartPoint::new().set_format(ChartSolidFill::new().set_color(Color::RGB(*c))))
            .collect();
        let title = format!("{} Bookings by Hour", ch.label());

        let mut chart = Chart::new(ChartType::Column);
        chart
            .add_series()
            .set_categories((name, 1, 1, 24, 1))
            .set_values((name, 1, col, 24, col))
            .set_name(ch.label())
            .set_points(&points);
        chart.title().set_name(title.as_str());
        chart.legend().set_hidden();
        ws.insert_chart(1 + i as u32 * 15, total_col + 2, &chart)?;
    }
    Ok(())
}

// ── Date-wise collection ──────────────────────────────────────────────────────

const MODE_COLUMNS: [(&str, f64); 5] =
    [("Cash", 14.0), ("QR", 14.0), ("Online", 14.0), ("Discount", 14.0), ("Total", 16.0)];

fn mode_values(t: &ModeTotals) -> [f64; 5] {
    [t.cash, t.qr, t.online, t.discount, t.total()]
}

pub fn date_wise(
    properties: &[(String, DailyCollection)],
    consolidated: &DailyCollection,
) -> Result<Vec<u8>, ReportError> {
    if properties.is_empty() {
        return Err(ReportError::Empty);
    }
    let mut wb = Workbook::new();
    let mut names = SheetNamer::reserving(&[CONSOLIDATED, RANKING]);
    for (prop, daily) in properties {
        daily_sheet(&mut wb, &names.name(prop), daily)?;
    }
    daily_sheet(&mut wb, CONSOLIDATED, consolidated)?;
    ranking_sheet(&mut wb, properties)?;
    Ok(wb.save_to_buffer()?)
}

fn daily_sheet(wb: &mut Workbook, name: &str, daily: &DailyCollection) -> Result<(), XlsxError> {
    let ws = wb.add_worksheet();
    ws.set_name(name)?;

    let mut columns = vec![("Date", 14.0)];
    columns.extend(MODE_COLUMNS);
    write_header(ws, &columns)?;

    let mut row = 1u32;
    for (i, (date, totals)) in daily.iter().enumerate() {
        let fmt = cell(PASTEL[i % PASTEL.len()], false);
        let amount = fmt.clone().set_num_format(AMOUNT);
        ws.write_string_with_format(row, 0, date.format("%d-%m-%Y").to_string().as_str(), &fmt)?;
        for (c, v) in mode_values(totals).iter().enumerate() {
            ws.write_number_with_format(row, 1 + c as u16, *v, &amount)?;
        }
        row += 1;
    }

    let t = total();
    let amount = t.clone().set_num_format(AMOUNT);
    ws.write_string_with_format(row, 0, "TOTAL", &t)?;
    for (c, v) in mode_values(&daily.totals()).iter().enumerate() {
        ws.write_number_with_format(row, 1 + c as u16, *v, &amount)?;
    }
    Ok(())
}

fn ranking_sheet(wb: &mut Workbook, properties: &[(String, DailyCollection)]) -> Result<(), XlsxError> {
    let ws = wb.add_worksheet();
    ws.set_name(RANKING)?;

    let mut columns = vec![("Rank", 8.0), ("Property", 22.0)];
    columns.extend(MODE_COLUMNS);
    columns.push(("Badge", 14.0));
    write_header(ws, &columns)?;
    let badge_col = columns.len() as u16 - 1;

    let per_property: Vec<ModeTotals> = properties.iter().map(|(_, d)| d.totals()).collect();
    let totals: Vec<(String, f64)> = properties
        .iter()
        .zip(&per_property)
        .map(|((name, _), t)| (name.clone(), t.total()))
        .collect();

    let mut grand = ModeTotals::default();
    let mut row = 1u32;
    for entry in rank(&totals) {
        let t = &per_property[entry.index];
        grand.merge(t);

        let fmt = cell(PASTEL[(row as usize - 1) % PASTEL.len()], false);
        let amount = fmt.clone().set_num_format(AMOUNT);
        ws.write_number_with_format(row, 0, entry.rank as f64, &fmt)?;
        ws.write_string_with_format(row, 1, entry.name.as_str(), &fmt)?;
        for (c, v) in mode_values(t).iter().enumerate() {
            ws.write_number_with_format(row, 2 + c as u16, *v, &amount)?;
        }
        ws.write_string_with_format(row, badge_col, entry.badge(), &fmt)?;
        row += 1;
    }

    let t = total();
    let amount = t.clone().set_num_format(AMOUNT);
    ws.write_blank(row, 0, &t)?;
    ws.write_string_with_format(row, 1, "TOTAL", &t)?;
    for (c, v) in mode_values(&grand).iter().enumerate() {
        ws.write_number_with_format(row, 2 + c as u16, *v, &amount)?;
    }
    ws.write_blank(row, badge_col, &t)?;
    Ok(())
}
