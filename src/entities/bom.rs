//! Bill of materials rows - jobs and the work-order lots that compose them

use serde::{Deserialize, Serialize};

use crate::core::identity::TOP_LEVEL_LOT;

/// Description shown for rows whose part could not be resolved
pub const UNKNOWN_DESCRIPTION: &str = "Unknown/unavailable";

/// Customer order (job) header, root of a BOM search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    /// Job number (customer order id)
    pub job_number: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,

    /// Number of top-level assemblies (lot "00") in the job
    pub assembly_count: u32,
}

impl JobSummary {
    pub fn customer_display(&self) -> &str {
        self.customer_name.as_deref().unwrap_or("Unknown Customer")
    }

    /// One-line header, e.g. `8113 - ACME CORP (3 assemblies)`
    pub fn formatted_display(&self) -> String {
        format!(
            "{} - {} ({} assemblies)",
            self.job_number,
            self.customer_display(),
            self.assembly_count
        )
    }
}

/// One work-order row of a job's bill of materials.
///
/// Key fields are optional because snapshots occasionally contain rows with
/// missing values; classification turns those into explicit placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomRow {
    pub job_number: String,

    #[serde(default)]
    pub lot_id: Option<String>,

    #[serde(default)]
    pub sub_id: Option<String>,

    /// Lot id of the assembly this row belongs to
    #[serde(default)]
    pub base_lot_id: Option<String>,

    #[serde(default)]
    pub part_id: Option<String>,

    #[serde(default)]
    pub part_description: Option<String>,

    #[serde(default)]
    pub fabricated: bool,

    #[serde(default)]
    pub purchased: bool,

    /// Computed by the query: other rows reference this row's lot as their
    /// `base_lot_id`
    #[serde(default)]
    pub has_children: bool,
}

impl BomRow {
    pub fn lot_id(&self) -> &str {
        self.lot_id.as_deref().map(str::trim).unwrap_or("")
    }

    pub fn sub_id(&self) -> &str {
        self.sub_id.as_deref().map(str::trim).unwrap_or("")
    }

    pub fn part_id(&self) -> &str {
        self.part_id.as_deref().map(str::trim).unwrap_or("")
    }

    pub fn is_top_level(&self) -> bool {
        self.lot_id() == TOP_LEVEL_LOT
    }

    /// Part description, or an explicit placeholder when the part is missing
    pub fn description(&self) -> String {
        match (self.part_id(), self.part_description.as_deref()) {
            ("", _) => UNKNOWN_DESCRIPTION.to_string(),
            (_, Some(desc)) if !desc.trim().is_empty() => desc.trim().to_string(),
            (_, _) => UNKNOWN_DESCRIPTION.to_string(),
        }
    }

    /// `LOT/SUB PART` as shown in the BOM tree columns
    pub fn formatted_label(&self) -> String {
        let part = if self.part_id().is_empty() {
            "?"
        } else {
            self.part_id()
        };
        format!("{}/{} {}", self.lot_id(), self.sub_id(), part)
    }

    /// Full lot path `BASE_LOT/LOT` (just the lot for top-level rows)
    pub fn full_lot_id(&self) -> String {
        match self.base_lot_id.as_deref().map(str::trim) {
            Some(base) if !base.is_empty() => format!("{}/{}", base, self.lot_id()),
            _ => self.lot_id().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(lot: &str, part: Option<&str>, desc: Option<&str>) -> BomRow {
        BomRow {
            job_number: "8113".to_string(),
            lot_id: Some(lot.to_string()),
            sub_id: Some("1".to_string()),
            base_lot_id: Some("00".to_string()),
            part_id: part.map(String::from),
            part_description: desc.map(String::from),
            fabricated: true,
            purchased: false,
            has_children: false,
        }
    }

    #[test]
    fn test_description_fallback() {
        assert_eq!(row("01", Some("M1"), Some(" GEAR ")).description(), "GEAR");
        assert_eq!(row("01", Some("M1"), None).description(), UNKNOWN_DESCRIPTION);
        assert_eq!(row("01", None, Some("GEAR")).description(), UNKNOWN_DESCRIPTION);
    }

    #[test]
    fn test_labels() {
        let r = row("01", Some("M1"), None);
        assert_eq!(r.formatted_label(), "01/1 M1");
        assert_eq!(r.full_lot_id(), "00/01");
        assert!(!r.is_top_level());
        assert!(row("00", None, None).is_top_level());
        assert_eq!(row("00", None, None).formatted_label(), "00/1 ?");
    }

    #[test]
    fn test_job_display() {
        let job = JobSummary {
            job_number: "8113".to_string(),
            customer_id: None,
            customer_name: None,
            assembly_count: 2,
        };
        assert_eq!(job.formatted_display(), "8113 - Unknown Customer (2 assemblies)");
    }
}
