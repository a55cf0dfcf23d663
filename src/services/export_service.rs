use chrono::{DateTime, Utc};
use rust_xlsxwriter::*;

use crate::dto::assessment_dto::{decimal_to_f64, ResultRow};
use crate::error::Result;

pub const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// `results_<title>_<yyyymmdd>.xlsx`, with anything outside `[A-Za-z0-9_-]` replaced.
pub fn results_filename(title: &str, now: DateTime<Utc>) -> String {
    let safe: String = title
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let safe = if safe.is_empty() { "assessment".to_string() } else { safe };
    format!("results_{}_{}.xlsx", safe, now.format("%Y%m%d"))
}

fn format_duration(secs: i64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

pub struct ExportService;

impl ExportService {
    /// Styled workbook with one row per attempt on an assessment.
    pub fn generate_results_xlsx(
        assessment_title: &str,
        passing_score: f64,
        rows: &[ResultRow],
        now: DateTime<Utc>,
    ) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Results")?;

        let primary_color = Color::RGB(0x1E293B);
        let header_bg = Color::RGB(0x0F172A);
        let header_text = Color::White;
        let alt_row_1 = Color::RGB(0xF8FAFC);
        let alt_row_2 = Color::White;
        let border_color = Color::RGB(0xE2E8F0);

        let passed_color = Color::RGB(0x10B981);
        let failed_color = Color::RGB(0xEF4444);
        let pending_color = Color::RGB(0xF59E0B);

        let columns = [
            ("#", 6.0),
            ("Candidate", 28.0),
            ("Email", 30.0),
            ("Status", 14.0),
            ("Score (%)", 12.0),
            ("Result", 12.0),
            ("Review", 14.0),
            ("Time spent", 12.0),
            ("Started", 18.0),
            ("Completed", 18.0),
        ];

        for (i, (_, width)) in columns.iter().enumerate() {
            worksheet.set_column_width(i as u16, *width)?;
        }

        let title_format = Format::new()
            .set_font_size(16)
            .set_bold()
            .set_font_color(header_text)
            .set_background_color(primary_color)
            .set_align(FormatAlign::CenterAcross)
            .set_align(FormatAlign::VerticalCenter);

        worksheet.set_row_height(0, 40)?;
        worksheet.merge_range(0, 0, 0, (columns.len() - 1) as u16, assessment_title, &title_format)?;

        let subtitle_format = Format::new()
            .set_font_size(10)
            .set_italic()
            .set_font_color(Color::RGB(0x94A3B8))
            .set_background_color(primary_color)
            .set_align(FormatAlign::CenterAcross)
            .set_align(FormatAlign::VerticalCenter);

        worksheet.set_row_height(1, 22)?;
        let subtitle_text = format!(
            "Exported {}  •  Candidates: {}  •  Passing score: {:.0}%",
            now.format("%Y-%m-%d %H:%M UTC"),
            rows.len(),
            passing_score
        );
        worksheet.merge_range(1, 0, 1, (columns.len() - 1) as u16, &subtitle_text, &subtitle_format)?;

        let header_format = Format::new()
            .set_bold()
            .set_font_size(10)
            .set_font_color(header_text)
            .set_background_color(header_bg)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_text_wrap()
            .set_border(FormatBorder::Thin)
            .set_border_color(border_color);

        let header_row = 2;
        worksheet.set_row_height(header_row, 30)?;
        for (i, (name, _)) in columns.iter().enumerate() {
            worksheet.write_string_with_format(header_row, i as u16, *name, &header_format)?;
        }

        let data_start_row = 3;
        for (idx, result) in rows.iter().enumerate() {
            let row = data_start_row + idx as u32;
            let bg = if idx % 2 == 0 { alt_row_1 } else { alt_row_2 };

            let base_fmt = Format::new()
                .set_font_size(10)
                .set_background_color(bg)
                .set_align(FormatAlign::VerticalCenter)
                .set_border(FormatBorder::Thin)
                .set_border_color(border_color);
            let center_fmt = base_fmt.clone().set_align(FormatAlign::Center);

            worksheet.set_row_height(row, 22)?;
            worksheet.write_number_with_format(row, 0, (idx + 1) as f64, &center_fmt)?;
            worksheet.write_string_with_format(row, 1, &result.candidate_name, &base_fmt.clone().set_bold())?;
            worksheet.write_string_with_format(row, 2, &result.email, &base_fmt)?;
            worksheet.write_string_with_format(row, 3, &result.status, &center_fmt)?;

            match result.score {
                Some(score) => {
                    worksheet.write_number_with_format(row, 4, decimal_to_f64(score), &center_fmt)?;
                }
                None => {
                    worksheet.write_string_with_format(row, 4, "-", &center_fmt)?;
                }
            }

            let (label, color) = match result.passed {
                Some(true) => ("Passed", passed_color),
                Some(false) => ("Failed", failed_color),
                None => ("Pending", pending_color),
            };
            let result_fmt = Format::new()
                .set_font_size(10)
                .set_bold()
                .set_font_color(Color::White)
                .set_background_color(color)
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter)
                .set_border(FormatBorder::Thin)
                .set_border_color(border_color);
            worksheet.write_string_with_format(row, 5, label, &result_fmt)?;

            let review = result.review_status.as_deref().unwrap_or("-");
            worksheet.write_string_with_format(row, 6, review, &center_fmt)?;
            worksheet.write_string_with_format(row, 7, &format_duration(result.time_spent), &center_fmt)?;
            worksheet.write_string_with_format(
                row,
                8,
                &result.started_at.format("%Y-%m-%d %H:%M").to_string(),
                &center_fmt,
            )?;
            let completed = result
                .completed_at
                .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string());
            worksheet.write_string_with_format(row, 9, &completed, &center_fmt)?;
        }

        let total_row = data_start_row + rows.len() as u32 + 1;
        let summary_fmt = Format::new()
            .set_bold()
            .set_font_size(10)
            .set_font_color(primary_color)
            .set_background_color(Color::RGB(0xE0E7FF))
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_border(FormatBorder::Thin)
            .set_border_color(border_color);

        let scores: Vec<f64> = rows.iter().filter_map(|r| r.score.map(decimal_to_f64)).collect();
        let average = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };
        let passed = rows.iter().filter(|r| r.passed == Some(true)).count();
        let pending = rows.iter().filter(|r| r.passed.is_none()).count();

        worksheet.set_row_height(total_row, 26)?;
        worksheet.merge_range(total_row, 0, total_row, 2, &format!("Total: {} candidates", rows.len()), &summary_fmt)?;
        worksheet.merge_range(
            total_row,
            3,
            total_row,
            (columns.len() - 1) as u16,
            &format!("Average score: {:.1}% | Passed: {} | Awaiting review: {}", average, passed, pending),
            &summary_fmt,
        )?;

        worksheet.set_freeze_panes(3, 0)?;
        worksheet.autofilter(2, 0, (data_start_row + rows.len() as u32).saturating_sub(1).max(2), (columns.len() - 1) as u16)?;

        let buffer = workbook.save_to_buffer()?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn result(score: Option<i64>, passed: Option<bool>) -> ResultRow {
        let started = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        ResultRow {
            attempt_id: Uuid::new_v4(),
            candidate_id: Uuid::new_v4(),
            candidate_name: "Alan Turing".into(),
            email: "alan@example.com".into(),
            avatar: None,
            status: "submitted".into(),
            started_at: started,
            completed_at: Some(started + chrono::Duration::minutes(42)),
            time_spent: 42 * 60,
            review_id: Some(Uuid::new_v4()),
            review_status: Some("completed".into()),
            score: score.map(Decimal::from),
            passed,
            results_released: Some(false),
        }
    }

    #[test]
    fn workbook_is_a_zip_archive() {
        let rows = vec![result(Some(85), Some(true)), result(None, None)];
        let bytes = ExportService::generate_results_xlsx("Backend screen", 70.0, &rows, Utc::now()).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn empty_results_still_export() {
        let bytes = ExportService::generate_results_xlsx("Empty", 70.0, &[], Utc::now()).unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn filename_is_sanitised() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        assert_eq!(results_filename("Rust / Backend", now), "results_Rust___Backend_20260302.xlsx");
        assert_eq!(results_filename("  ", now), "results_assessment_20260302.xlsx");
    }

    #[test]
    fn durations_read_as_minutes_and_seconds() {
        assert_eq!(format_duration(125), "2:05");
    }
}
