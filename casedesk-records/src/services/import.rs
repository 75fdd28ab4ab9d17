//! Bulk import of tabular record data
//!
//! Headers are resolved once against [`HEADER_TABLE`]; every data row is then
//! turned into [`RecordFields`] and handed to [`RecordWriter::create`]. A row
//! that fails (bad cell or failed create) is reported and the batch carries on.

use casedesk_common::time::parse_calendar_date;
use casedesk_common::{Actor, Error, Result};
use chrono::NaiveDate;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::assignment::resolve_collector;
use super::writer::RecordWriter;
use crate::models::{
    derive_outstanding, FailedImportRow, ImportReport, MultiEntry, RecordFields,
};

/// Column a spreadsheet header maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportField {
    Provider,
    PtName,
    RenderingFacility,
    TaxId,
    Dob,
    Ssn,
    Employer,
    Insurance,
    Bill,
    Paid,
    Outstanding,
    Fds,
    Lds,
    Ledger,
    Hcf,
    Invoice,
    SigninSheet,
    SolDate,
    HearingStatus,
    HearingDate,
    HearingTime,
    JudgeName,
    CourtRoomLink,
    JudgePhone,
    AccessCode,
    BoardLocation,
    LienStatus,
    CaseStatus,
    CaseDate,
    CrAmount,
    DorFiledBy,
    Status4903_8,
    PmrStatus,
    JudgeOrderStatus,
    Adjuster,
    AdjusterPhone,
    AdjusterFax,
    AdjusterEmail,
    DefenseAttorney,
    DefenseAttorneyPhone,
    DefenseAttorneyFax,
    DefenseAttorneyEmail,
    /// Zero-based slot of a repeatable list
    ClaimNo(usize),
    AdjNumber(usize),
    Doi(usize),
}

/// Normalized header → field
pub const HEADER_TABLE: &[(&str, ImportField)] = &[
    ("provider", ImportField::Provider),
    ("ptname", ImportField::PtName),
    ("renderingfacility", ImportField::RenderingFacility),
    ("taxid", ImportField::TaxId),
    ("dob", ImportField::Dob),
    ("ssn", ImportField::Ssn),
    ("employer", ImportField::Employer),
    ("insurance", ImportField::Insurance),
    ("bill", ImportField::Bill),
    ("paid", ImportField::Paid),
    ("outstanding", ImportField::Outstanding),
    ("fds", ImportField::Fds),
    ("lds", ImportField::Lds),
    ("ledger", ImportField::Ledger),
    ("hcf", ImportField::Hcf),
    ("invoice", ImportField::Invoice),
    ("signinsheet", ImportField::SigninSheet),
    ("soldate", ImportField::SolDate),
    ("hearingstatus", ImportField::HearingStatus),
    ("hearingdate", ImportField::HearingDate),
    ("hearingtime", ImportField::HearingTime),
    ("judgename", ImportField::JudgeName),
    ("courtroomlink", ImportField::CourtRoomLink),
    ("judgephone", ImportField::JudgePhone),
    ("accesscode", ImportField::AccessCode),
    // Spelling used by older export templates
    ("accescode", ImportField::AccessCode),
    ("boardlocation", ImportField::BoardLocation),
    ("lienstatus", ImportField::LienStatus),
    ("casestatus", ImportField::CaseStatus),
    ("casedate", ImportField::CaseDate),
    ("cramount", ImportField::CrAmount),
    ("dorfiledby", ImportField::DorFiledBy),
    ("status4903_8", ImportField::Status4903_8),
    ("pmrstatus", ImportField::PmrStatus),
    ("judgeorderstatus", ImportField::JudgeOrderStatus),
    ("adjuster", ImportField::Adjuster),
    ("adjusterphone", ImportField::AdjusterPhone),
    ("adjusterfax", ImportField::AdjusterFax),
    ("adjusteremail", ImportField::AdjusterEmail),
    ("defenseattorney", ImportField::DefenseAttorney),
    ("defenseattorneyphone", ImportField::DefenseAttorneyPhone),
    ("defenseattorneyfax", ImportField::DefenseAttorneyFax),
    ("defenseattorneyemail", ImportField::DefenseAttorneyEmail),
];

/// Strip all whitespace and lower-case
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

impl ImportField {
    /// Resolve a raw header; unknown headers are ignored by the importer
    pub fn resolve(header: &str) -> Option<Self> {
        let normalized = normalize_header(header);

        if let Some((prefix, slot)) = normalized.split_once('.') {
            let slot: usize = slot.parse().ok().filter(|n| *n >= 1)?;
            return match prefix {
                "claimno" => Some(ImportField::ClaimNo(slot - 1)),
                "adjnumber" => Some(ImportField::AdjNumber(slot - 1)),
                "doi" => Some(ImportField::Doi(slot - 1)),
                _ => None,
            };
        }

        HEADER_TABLE
            .iter()
            .find(|(name, _)| *name == normalized)
            .map(|(_, field)| *field)
    }
}

/// Parse a currency-like cell: `$1,234.50`, `(300)` for negatives
pub fn parse_currency(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    let negative = trimmed.starts_with('(') && trimmed.ends_with(')');
    let cleaned: String = trimmed
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '€' | '£' | '¥' | '(' | ')') && !c.is_whitespace())
        .collect();
    let amount: f64 = cleaned.parse().ok()?;
    if !amount.is_finite() {
        return None;
    }
    Some(if negative { -amount } else { amount })
}

/// Dates as spreadsheets render them, plus the ISO forms
fn parse_cell_date(value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    ["%m/%d/%Y", "%m/%d/%y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .map(Ok)
        .unwrap_or_else(|| parse_calendar_date(trimmed))
}

/// Fields of one row while its cells are being applied
#[derive(Debug, Default)]
struct RowDraft {
    fields: RecordFields,
    claim_no: BTreeMap<usize, String>,
    adj_number: BTreeMap<usize, String>,
    doi: BTreeMap<usize, String>,
}

impl RowDraft {
    fn apply(&mut self, field: ImportField, value: &str) -> Result<()> {
        let text = || Some(value.to_string());
        let f = &mut self.fields;
        let d = &mut f.details;

        match field {
            ImportField::Provider => f.provider = value.to_string(),
            ImportField::PtName => f.pt_name = value.to_string(),
            ImportField::RenderingFacility => d.rendering_facility = text(),
            ImportField::TaxId => d.tax_id = text(),
            ImportField::Dob => d.dob = Some(parse_cell_date(value)?),
            ImportField::Ssn => d.ssn = text(),
            ImportField::Employer => d.employer = text(),
            ImportField::Insurance => d.insurance = text(),
            ImportField::Bill => f.bill = parse_currency(value),
            ImportField::Paid => f.paid = parse_currency(value),
            ImportField::Outstanding => f.outstanding = parse_currency(value),
            ImportField::Fds => d.fds = Some(parse_cell_date(value)?),
            ImportField::Lds => d.lds = Some(parse_cell_date(value)?),
            ImportField::Ledger => f.ledger = value.parse()?,
            ImportField::Hcf => f.hcf = value.parse()?,
            ImportField::Invoice => f.invoice = value.parse()?,
            ImportField::SigninSheet => f.signin_sheet = value.parse()?,
            ImportField::SolDate => d.sol_date = Some(parse_cell_date(value)?),
            ImportField::HearingStatus => d.hearing_status = text(),
            ImportField::HearingDate => f.hearing_date = Some(parse_cell_date(value)?),
            ImportField::HearingTime => f.hearing_time = Some(value.parse()?),
            ImportField::JudgeName => d.judge_name = text(),
            ImportField::CourtRoomLink => d.court_room_link = text(),
            ImportField::JudgePhone => d.judge_phone = text(),
            ImportField::AccessCode => d.access_code = text(),
            ImportField::BoardLocation => d.board_location = text(),
            ImportField::LienStatus => f.lien_status = Some(value.parse()?),
            ImportField::CaseStatus => f.case_status = Some(value.parse()?),
            ImportField::CaseDate => d.case_date = Some(parse_cell_date(value)?),
            ImportField::CrAmount => d.cr_amount = parse_currency(value),
            ImportField::DorFiledBy => d.dor_filed_by = Some(value.parse()?),
            ImportField::Status4903_8 => d.status_4903_8 = Some(value.parse()?),
            ImportField::PmrStatus => d.pmr_status = Some(value.parse()?),
            ImportField::JudgeOrderStatus => d.judge_order_status = Some(value.parse()?),
            ImportField::Adjuster => d.adjuster = text(),
            ImportField::AdjusterPhone => d.adjuster_phone = text(),
            ImportField::AdjusterFax => d.adjuster_fax = text(),
            ImportField::AdjusterEmail => d.adjuster_email = text(),
            ImportField::DefenseAttorney => d.defense_attorney = text(),
            ImportField::DefenseAttorneyPhone => d.defense_attorney_phone = text(),
            ImportField::DefenseAttorneyFax => d.defense_attorney_fax = text(),
            ImportField::DefenseAttorneyEmail => d.defense_attorney_email = text(),
            ImportField::ClaimNo(slot) => {
                self.claim_no.insert(slot, value.to_string());
            }
            ImportField::AdjNumber(slot) => {
                self.adj_number.insert(slot, value.to_string());
            }
            ImportField::Doi(slot) => {
                self.doi.insert(slot, value.to_string());
            }
        }
        Ok(())
    }

    fn finish(self) -> RecordFields {
        let dense = |slots: BTreeMap<usize, String>| -> Vec<MultiEntry> {
            slots.into_values().map(MultiEntry::new).collect()
        };

        let mut fields = self.fields;
        fields.claim_no = dense(self.claim_no);
        fields.adj_number = dense(self.adj_number);
        fields.doi = dense(self.doi);
        if fields.outstanding.is_none() {
            fields.outstanding = derive_outstanding(fields.bill, fields.paid);
        }
        fields
    }

    fn failure(&self, row_number: usize, reason: String) -> FailedImportRow {
        let non_empty = |v: &str| Some(v.to_string()).filter(|s| !s.trim().is_empty());
        FailedImportRow {
            row_number,
            provider: non_empty(&self.fields.provider),
            pt_name: non_empty(&self.fields.pt_name),
            error_reason: reason,
        }
    }
}

enum RowOutcome {
    Skip,
    Ready(RecordFields),
    Failed(FailedImportRow),
}

fn build_row(columns: &[Option<ImportField>], row: &[Option<String>], row_number: usize) -> RowOutcome {
    let mut draft = RowDraft::default();
    let mut first_error: Option<String> = None;

    for (field, cell) in columns.iter().zip(row) {
        let (Some(field), Some(value)) = (field, cell.as_deref().map(str::trim)) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        if let Err(e) = draft.apply(*field, value) {
            first_error.get_or_insert_with(|| e.to_string());
        }
    }

    if draft.fields.pt_name.trim().is_empty() {
        return RowOutcome::Skip;
    }
    match first_error {
        Some(reason) => RowOutcome::Failed(draft.failure(row_number, reason)),
        None => RowOutcome::Ready(draft.finish()),
    }
}

#[derive(Clone)]
pub struct ImportEngine {
    db: SqlitePool,
    writer: RecordWriter,
}

impl ImportEngine {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            writer: RecordWriter::new(db.clone()),
            db,
        }
    }

    /// Import `rows` under `headers`, optionally assigning every new record
    /// to `collector`
    pub async fn import(
        &self,
        headers: &[String],
        rows: &[Vec<Option<String>>],
        collector: Option<&str>,
        actor: Option<&Actor>,
    ) -> Result<ImportReport> {
        let collector = collector.map(str::trim).filter(|c| !c.is_empty());
        if let Some(value) = collector {
            // Fail the whole batch up front rather than once per row
            resolve_collector(&mut *self.db.acquire().await?, value).await?;
        }

        let columns: Vec<Option<ImportField>> =
            headers.iter().map(|h| ImportField::resolve(h)).collect();
        if !columns.iter().any(|c| *c == Some(ImportField::PtName)) {
            return Err(Error::InvalidArgument(
                "Import needs a ptName column".to_string(),
            ));
        }

        let mut report = ImportReport::default();
        let mut skipped = 0usize;

        for (index, row) in rows.iter().enumerate() {
            // Header is spreadsheet row 1
            let row_number = index + 2;
            match build_row(&columns, row, row_number) {
                RowOutcome::Skip => skipped += 1,
                RowOutcome::Failed(failed) => {
                    warn!(row = row_number, reason = %failed.error_reason, "Import row rejected");
                    report.failed_records.push(failed);
                }
                RowOutcome::Ready(fields) => {
                    let provider = Some(fields.provider.clone()).filter(|p| !p.trim().is_empty());
                    let pt_name = Some(fields.pt_name.clone());
                    match self.writer.create(fields, collector, actor).await {
                        Ok(_) => report.count += 1,
                        Err(e) => {
                            warn!(row = row_number, error = %e, "Import row failed to save");
                            report.failed_records.push(FailedImportRow {
                                row_number,
                                provider,
                                pt_name,
                                error_reason: e.to_string(),
                            });
                        }
                    }
                }
            }
        }

        info!(
            imported = report.count,
            failed = report.failed_records.len(),
            skipped,
            "Import finished"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CaseStatus, DocFlag};

    fn cells(values: &[&str]) -> Vec<Option<String>> {
        values
            .iter()
            .map(|v| if v.is_empty() { None } else { Some(v.to_string()) })
            .collect()
    }

    #[test]
    fn test_header_resolution() {
        assert_eq!(ImportField::resolve(" Pt Name "), Some(ImportField::PtName));
        assert_eq!(ImportField::resolve("SIGNIN SHEET"), Some(ImportField::SigninSheet));
        assert_eq!(ImportField::resolve("claimNo.1"), Some(ImportField::ClaimNo(0)));
        assert_eq!(ImportField::resolve("Adj Number.3"), Some(ImportField::AdjNumber(2)));
        assert_eq!(ImportField::resolve("doi.0"), None);
        assert_eq!(ImportField::resolve("favourite colour"), None);
    }

    #[test]
    fn test_parse_currency() {
        assert_eq!(parse_currency("$1,234.50"), Some(1234.5));
        assert_eq!(parse_currency("(300)"), Some(-300.0));
        assert_eq!(parse_currency(" € 12 "), Some(12.0));
        assert_eq!(parse_currency("n/a"), None);
    }

    #[test]
    fn test_row_slots_are_densified_in_order() {
        let headers = ["ptName", "adjNumber.3", "adjNumber.1", "bill", "paid", "caseStatus", "ledger"];
        let columns: Vec<_> = headers.iter().map(|h| ImportField::resolve(h)).collect();
        let row = cells(&["Pat Doe", "ADJ3", "ADJ1", "$1,000", "250", "cic pending", "YES"]);

        let RowOutcome::Ready(fields) = build_row(&columns, &row, 2) else {
            panic!("row should be ready");
        };
        assert_eq!(fields.adj_values(), vec!["ADJ1".to_string(), "ADJ3".to_string()]);
        assert_eq!(fields.outstanding, Some(750.0));
        assert_eq!(fields.case_status, Some(CaseStatus::CicPending));
        assert_eq!(fields.ledger, DocFlag::Yes);
    }

    #[test]
    fn test_row_without_patient_is_skipped() {
        let columns = vec![ImportField::resolve("provider"), ImportField::resolve("ptName")];
        assert!(matches!(
            build_row(&columns, &cells(&["Clinic", ""]), 2),
            RowOutcome::Skip
        ));
    }

    #[test]
    fn test_bad_cell_fails_row() {
        let columns = vec![ImportField::resolve("ptName"), ImportField::resolve("lienStatus")];
        match build_row(&columns, &cells(&["Pat", "Lost"]), 5) {
            RowOutcome::Failed(failed) => {
                assert_eq!(failed.row_number, 5);
                assert_eq!(failed.pt_name.as_deref(), Some("Pat"));
            }
            _ => panic!("row should fail"),
        }
    }

    #[test]
    fn test_spreadsheet_dates() {
        assert_eq!(
            parse_cell_date("1/5/2024").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
        );
        assert_eq!(
            parse_cell_date("2024-01-05").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
        );
    }
}
