#![allow(dead_code)]

use rust_xlsxwriter::Workbook;
use std::path::Path;

pub const HEADERS: [&str; 5] = [
    "Last Name",
    "First Name",
    "Total Hours",
    "Target Hours",
    "Finished Hours",
];

/// One family row: last name, total, target, finished.
pub type FamilyRow<'a> = (&'a str, f64, f64, f64);

fn report_workbook(rows: &[FamilyRow<'_>]) -> Workbook {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, header) in HEADERS.iter().enumerate() {
        sheet.write_string(0, col as u16, *header).unwrap();
    }
    for (i, (last, total, target, finished)) in rows.iter().enumerate() {
        let row = (i + 1) as u32;
        sheet.write_string(row, 0, *last).unwrap();
        sheet.write_string(row, 1, "Pat").unwrap();
        sheet.write_number(row, 2, *total).unwrap();
        sheet.write_number(row, 3, *target).unwrap();
        sheet.write_number(row, 4, *finished).unwrap();
    }
    workbook
}

pub fn report_bytes(rows: &[FamilyRow<'_>]) -> Vec<u8> {
    report_workbook(rows).save_to_buffer().unwrap()
}

pub fn write_report(path: &Path, rows: &[FamilyRow<'_>]) {
    report_workbook(rows).save(path).unwrap();
}

/// A workbook with no "Total Hours" column.
pub fn unrelated_bytes() -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Event").unwrap();
    sheet.write_string(1, 0, "Bake Sale").unwrap();
    workbook.save_to_buffer().unwrap()
}

pub const VOLUNTEER_ROWS: [FamilyRow<'static>; 3] = [
    ("Nguyen", 12.0, 20.0, 10.0),
    ("Garcia", 25.0, 20.0, 25.0),
    ("Smith", 5.0, 20.0, 0.0),
];

pub const PARKING_ROWS: [FamilyRow<'static>; 2] = [("Lee", 1.0, 2.0, 1.0), ("Khan", 2.0, 2.0, 2.0)];
