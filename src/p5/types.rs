use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use super::error::{P5Error, P5Result};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TermSummary {
    pub id: String,
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClassSummary {
    pub id: String,
    pub name: String,
    pub room_code: Option<String>,
    pub term_id: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClassDetail {
    pub locked: bool,
    #[serde(flatten)]
    pub class: ClassSummary,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInput {
    pub theme: String,
    pub title: String,
    pub description: String,
}

impl ProjectInput {
    pub fn normalized(&self) -> P5Result<ProjectInput> {
        let out = ProjectInput {
            theme: self.theme.trim().to_string(),
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
        };
        if out.title.is_empty() {
            return Err(P5Error::invalid("project title must not be empty"));
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetail {
    pub locked: bool,
    pub id: String,
    pub class_id: String,
    pub theme: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TargetInput {
    pub dimension: String,
    pub element: String,
    pub sub_element: String,
    pub target: String,
}

impl TargetInput {
    pub fn normalized(&self) -> P5Result<TargetInput> {
        let out = TargetInput {
            dimension: self.dimension.trim().to_string(),
            element: self.element.trim().to_string(),
            sub_element: self.sub_element.trim().to_string(),
            target: self.target.trim().to_string(),
        };
        if out.target.is_empty() {
            return Err(P5Error::invalid("target text must not be empty"));
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TargetSummary {
    pub id: String,
    pub dimension: String,
    pub target: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TargetDetail {
    pub locked: bool,
    pub id: String,
    pub dimension: String,
    pub element: String,
    pub sub_element: String,
    pub target: String,
}

/// P5 achievement scale.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GradeLevel {
    /// Belum berkembang
    #[serde(rename = "BB")]
    Bb,
    /// Mulai berkembang
    #[serde(rename = "MB")]
    Mb,
    /// Berkembang sesuai harapan
    #[serde(rename = "BSH")]
    Bsh,
    /// Sangat berkembang
    #[serde(rename = "SB")]
    Sb,
}

impl GradeLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            GradeLevel::Bb => "BB",
            GradeLevel::Mb => "MB",
            GradeLevel::Bsh => "BSH",
            GradeLevel::Sb => "SB",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "BB" => Some(GradeLevel::Bb),
            "MB" => Some(GradeLevel::Mb),
            "BSH" => Some(GradeLevel::Bsh),
            "SB" => Some(GradeLevel::Sb),
            _ => None,
        }
    }
}

impl FromSql for GradeLevel {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = value.as_str()?;
        GradeLevel::from_code(code)
            .ok_or_else(|| FromSqlError::Other(format!("unknown grade code: {code}").into()))
    }
}

impl ToSql for GradeLevel {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NoteInput {
    pub student_id: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GradeInput {
    pub student_id: String,
    #[serde(default)]
    pub grade: Option<GradeLevel>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StudentNote {
    pub student_id: String,
    pub name: String,
    pub nis: Option<String>,
    pub nisn: Option<String>,
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StudentGrade {
    pub student_id: String,
    pub name: String,
    pub nis: Option<String>,
    pub nisn: Option<String>,
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<GradeLevel>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn grade_input_accepts_scale_codes_and_missing_grade() {
        let g: GradeInput =
            serde_json::from_value(json!({ "studentId": "S1", "grade": "BSH" })).expect("bsh");
        assert_eq!(g.grade, Some(GradeLevel::Bsh));
        let g: GradeInput = serde_json::from_value(json!({ "studentId": "S1" })).expect("none");
        assert_eq!(g.grade, None);
        assert!(serde_json::from_value::<GradeInput>(json!({ "studentId": "S1", "grade": "A" }))
            .is_err());
    }

    #[test]
    fn missing_value_is_omitted_from_output() {
        let row = StudentNote {
            student_id: "S1".into(),
            name: "Ani".into(),
            nis: None,
            nisn: None,
            locked: false,
            note: None,
        };
        let v = serde_json::to_value(&row).expect("serialize");
        assert!(v.get("note").is_none());
        assert_eq!(v.get("locked"), Some(&json!(false)));
    }

    #[test]
    fn blank_title_is_rejected_after_trim() {
        let input = ProjectInput {
            theme: "Kearifan Lokal".into(),
            title: "   ".into(),
            description: String::new(),
        };
        assert!(matches!(input.normalized(), Err(P5Error::Validation { .. })));
    }

    #[test]
    fn class_detail_flattens_summary() {
        let detail = ClassDetail {
            locked: true,
            class: ClassSummary {
                id: "C1".into(),
                name: "X-1".into(),
                room_code: Some("R101".into()),
                term_id: "T1".into(),
            },
        };
        let v = serde_json::to_value(&detail).expect("serialize");
        assert_eq!(v.get("roomCode"), Some(&json!("R101")));
        assert_eq!(v.get("locked"), Some(&json!(true)));
    }

    #[test]
    fn grade_codes_round_trip_through_storage_form() {
        for g in [GradeLevel::Bb, GradeLevel::Mb, GradeLevel::Bsh, GradeLevel::Sb] {
            assert_eq!(GradeLevel::from_code(g.as_str()), Some(g));
        }
        assert_eq!(GradeLevel::from_code("A"), None);
    }
}
