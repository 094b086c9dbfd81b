use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::{format_cents, TripSheet};

/// Company details printed at the top of every trip sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Letterhead {
    pub name: String,
    pub tagline: Option<String>,
    /// Address and phone numbers, printed as one line.
    pub contact: Option<String>,
}

impl Default for Letterhead {
    fn default() -> Self {
        Self {
            name: "FLEETBOOK".to_string(),
            tagline: None,
            contact: None,
        }
    }
}

/// One row of the printed sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayoutRow {
    Single { label: String, value: String },
    Pair { left: (String, String), right: (String, String) },
    Total { label: String, value: String },
    Signatures { driver_name: String, customer_name: String },
}

impl LayoutRow {
    fn single(label: &str, value: impl Into<String>) -> Self {
        LayoutRow::Single {
            label: label.to_string(),
            value: value.into(),
        }
    }

    fn pair(l1: &str, v1: impl Into<String>, l2: &str, v2: impl Into<String>) -> Self {
        LayoutRow::Pair {
            left: (l1.to_string(), v1.into()),
            right: (l2.to_string(), v2.into()),
        }
    }
}

/// Everything a renderer needs to print a trip sheet, with every value
/// already formatted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripSheetLayout {
    pub letterhead: Letterhead,
    pub title: String,
    pub number: String,
    /// `dd/mm/YYYY`
    pub date: String,
    pub rows: Vec<LayoutRow>,
    /// Suggested download name without extension.
    pub file_stem: String,
}

impl TripSheetLayout {
    pub fn build(sheet: &TripSheet, letterhead: &Letterhead) -> Self {
        let d = &sheet.details;
        let km = |v: Option<i64>| v.map(|n| n.to_string()).unwrap_or_default();
        let date = |v: Option<chrono::NaiveDate>| {
            v.map(|d| d.format("%d/%m/%Y").to_string())
                .unwrap_or_default()
        };

        let mut rows = vec![
            LayoutRow::single("Guest Name", d.guest_name.as_str()),
            LayoutRow::pair(
                "Type of Vehicle",
                d.vehicle_type.as_str(),
                "Reg. No.",
                d.vehicle_reg_no.as_str(),
            ),
            LayoutRow::single("Trip Details", d.trip_details.as_str()),
            LayoutRow::pair("Garage KM", km(d.garage_km_start), "Pick-Up KM", km(d.pickup_km)),
            LayoutRow::pair(
                "Garage Time",
                d.garage_time_start.as_str(),
                "Pick-Up Time",
                d.pickup_time.as_str(),
            ),
            LayoutRow::pair("Drop KM", km(d.drop_km), "Garage KM", km(d.garage_km_end)),
            LayoutRow::pair(
                "Drop Time",
                d.drop_time.as_str(),
                "Garage Time",
                d.garage_time_end.as_str(),
            ),
            LayoutRow::pair(
                "Starting Date",
                date(d.starting_date),
                "Closing Date",
                date(d.closing_date),
            ),
        ];
        if let Some(total) = sheet.total_km() {
            rows.push(LayoutRow::single("Total KM", total.to_string()));
        }
        rows.push(LayoutRow::Total {
            label: "TOTAL BILL AMOUNT Rs.".to_string(),
            value: d.total_bill_amount.map(format_cents).unwrap_or_default(),
        });
        rows.push(LayoutRow::Signatures {
            driver_name: d.driver_name.clone(),
            customer_name: d.customer_name.clone(),
        });

        Self {
            letterhead: letterhead.clone(),
            title: "TRIP SHEET".to_string(),
            number: sheet.trip_sheet_no.clone(),
            date: sheet.trip_sheet_date.format("%d/%m/%Y").to_string(),
            rows,
            file_stem: format!("TripSheet_{}", sheet.trip_sheet_no),
        }
    }
}

/// Turns a layout into printable bytes. A PDF backend plugs in here.
pub trait TripSheetRenderer {
    fn content_type(&self) -> &'static str;
    fn file_extension(&self) -> &'static str;
    fn render(&self, layout: &TripSheetLayout) -> Result<Vec<u8>>;
}

/// Fixed-width plain text rendering, for terminals and quick prints.
#[derive(Debug, Clone, Copy)]
pub struct TextRenderer {
    pub width: usize,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self { width: 72 }
    }
}

impl TextRenderer {
    fn centered(&self, text: &str) -> String {
        let len = text.chars().count();
        let pad = self.width.saturating_sub(len) / 2;
        format!("{}{}", " ".repeat(pad), text)
    }

    fn rule(&self, c: char) -> String {
        c.to_string().repeat(self.width)
    }

    /// Write `left` and `right` on one line, pushed to both margins.
    fn spread(&self, left: &str, right: &str) -> String {
        let used = left.chars().count() + right.chars().count();
        let gap = self.width.saturating_sub(used).max(1);
        format!("{}{}{}", left, " ".repeat(gap), right)
    }
}

impl TripSheetRenderer for TextRenderer {
    fn content_type(&self) -> &'static str {
        "text/plain; charset=utf-8"
    }

    fn file_extension(&self) -> &'static str {
        "txt"
    }

    fn render(&self, layout: &TripSheetLayout) -> Result<Vec<u8>> {
        let half = self.width / 2;
        let mut lines = vec![self.centered(&layout.letterhead.name)];
        if let Some(tagline) = &layout.letterhead.tagline {
            lines.push(self.centered(tagline));
        }
        if let Some(contact) = &layout.letterhead.contact {
            lines.push(self.centered(contact));
        }
        lines.push(self.rule('='));
        lines.push(self.centered(&layout.title));
        lines.push(self.rule('='));
        lines.push(self.spread(
            &format!("No. {}", layout.number),
            &format!("Date: {}", layout.date),
        ));
        lines.push(self.rule('-'));

        for row in &layout.rows {
            match row {
                LayoutRow::Single { label, value } => {
                    lines.push(format!("{:<16}{}", label, value));
                }
                LayoutRow::Pair { left, right } => {
                    let left = format!("{:<16}{}", left.0, left.1);
                    lines.push(format!("{:<half$}{:<16}{}", left, right.0, right.1));
                }
                LayoutRow::Total { label, value } => {
                    lines.push(self.rule('-'));
                    lines.push(self.spread(label, value));
                    lines.push(self.rule('-'));
                }
                LayoutRow::Signatures {
                    driver_name,
                    customer_name,
                } => {
                    lines.push(String::new());
                    lines.push(format!(
                        "{:<half$}{}",
                        format!("Driver's Name: {}", driver_name),
                        format!("Customer Name: {}", customer_name)
                    ));
                    lines.push(String::new());
                    lines.push(format!("{:<half$}{}", "Signature:", "Signature:"));
                }
            }
        }

        let mut text = lines.join("\n");
        text.push('\n');
        Ok(text.into_bytes())
    }
}
