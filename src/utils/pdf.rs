//! Payslip and salary-report rendering.

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};

use crate::error::ApiError;
use crate::model::payroll::{PayrollRecord, PayrollWithName};

const LAYER: &str = "Layer 1";

fn pdf_error(e: impl std::fmt::Display) -> ApiError {
    ApiError::internal(format!("pdf: {e}"))
}

fn money(v: f64) -> String {
    format!("{v:.2}")
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

fn a4(title: &str) -> Result<(PdfDocumentReference, PdfLayerReference, Fonts), ApiError> {
    let (doc, page, layer) = PdfDocument::new(title, Mm(210.0), Mm(297.0), LAYER);
    let fonts = Fonts {
        regular: doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?,
        bold: doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_error)?,
    };
    let canvas = doc.get_page(page).get_layer(layer);
    Ok((doc, canvas, fonts))
}

/// Single-month payslip for one employee.
pub fn render_payslip(employee_name: &str, record: &PayrollRecord) -> Result<Vec<u8>, ApiError> {
    let title = format!("Payslip {} {}", record.employee_id, record.salary_month);
    let (doc, canvas, fonts) = a4(&title)?;

    canvas.use_text("Payslip", 18.0, Mm(20.0), Mm(275.0), &fonts.bold);

    let currency = &record.currency;
    let lines = [
        format!("Employee: {} ({})", employee_name, record.employee_id),
        format!("Month: {}", record.salary_month),
        format!("Basic Salary: {} {}", money(record.basic_salary), currency),
        format!("Bonus: {} {}", money(record.bonus), currency),
        format!("Deductions: {} {}", money(record.deductions), currency),
        format!("Net Salary: {} {}", money(record.net_salary), currency),
        format!("Net Pay (direct deposit): {} {}", money(record.direct_deposit_amount), currency),
        format!("Pay Frequency: {}", record.pay_frequency),
    ];

    let mut y = 260.0;
    for line in lines {
        canvas.use_text(line, 12.0, Mm(20.0), Mm(y), &fonts.regular);
        y -= 8.0;
    }

    doc.save_to_bytes().map_err(pdf_error)
}

/// Tabular report; rows spill onto new pages.
pub fn render_salary_report(records: &[PayrollWithName]) -> Result<Vec<u8>, ApiError> {
    let (doc, first, fonts) = a4("Salary Records Report")?;

    let headers = ["Emp ID", "Name", "Month", "Basic", "Bonus", "Deductions", "Net Pay", "Currency"];
    let columns = [12.0, 32.0, 72.0, 92.0, 114.0, 134.0, 158.0, 182.0];

    first.use_text("Salary Records Report", 14.0, Mm(70.0), Mm(282.0), &fonts.bold);

    let draw_header = |canvas: &PdfLayerReference, y| {
        for (header, x) in headers.iter().zip(columns) {
            canvas.use_text(*header, 10.0, Mm(x), Mm(y), &fonts.bold);
        }
    };

    let mut canvas = first;
    let mut y = 270.0;
    draw_header(&canvas, y);
    y -= 8.0;

    for record in records {
        if y < 15.0 {
            let (page, layer) = doc.add_page(Mm(210.0), Mm(297.0), LAYER);
            canvas = doc.get_page(page).get_layer(layer);
            y = 282.0;
            draw_header(&canvas, y);
            y -= 8.0;
        }

        let name: String = record.name.chars().take(20).collect();
        let values = [
            record.employee_id.clone(),
            name,
            record.salary_month.clone(),
            money(record.basic_salary),
            money(record.bonus),
            money(record.deductions),
            money(record.direct_deposit_amount),
            record.currency.clone(),
        ];
        for (value, x) in values.into_iter().zip(columns) {
            canvas.use_text(value, 9.0, Mm(x), Mm(y), &fonts.regular);
        }
        y -= 7.0;
    }

    doc.save_to_bytes().map_err(pdf_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn record(month: &str) -> PayrollRecord {
        PayrollRecord {
            id: 1,
            employee_id: "EMP0002".into(),
            salary_month: month.into(),
            basic_salary: 5000.0,
            bonus: 250.0,
            deductions: 120.5,
            net_salary: 5129.5,
            currency: "NZD".into(),
            pay_frequency: "Monthly".into(),
            direct_deposit_amount: 5129.5,
            generated_at: NaiveDateTime::default(),
        }
    }

    #[test]
    fn payslip_is_a_pdf() {
        let bytes = render_payslip("Jane Doe", &record("2025-06")).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn long_report_spans_pages() {
        let rows: Vec<PayrollWithName> = (0..80)
            .map(|i| PayrollWithName {
                name: format!("Employee number {i} with a long name"),
                record: record("2025-06"),
            })
            .collect();

        let one_page = render_salary_report(&rows[..3]).unwrap();
        let many_pages = render_salary_report(&rows).unwrap();
        assert!(many_pages.starts_with(b"%PDF"));
        assert!(many_pages.len() > one_page.len());
    }

    #[test]
    fn money_has_two_decimals() {
        assert_eq!(money(5.0), "5.00");
        assert_eq!(money(1234.567), "1234.57");
    }
}
