//! Registration record and input types.

use crate::error::StoreError;
use crate::validate::{normalize_email, normalize_name, normalize_phone};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Class an applicant wants to join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassInterest {
    #[serde(rename = "SQL master class")]
    SqlMasterClass,
    #[serde(rename = "Python master class")]
    PythonMasterClass,
}

impl ClassInterest {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassInterest::SqlMasterClass => "SQL master class",
            ClassInterest::PythonMasterClass => "Python master class",
        }
    }
}

impl FromStr for ClassInterest {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SQL master class" => Ok(ClassInterest::SqlMasterClass),
            "Python master class" => Ok(ClassInterest::PythonMasterClass),
            other => Err(format!("`{}` is not a valid class of interest", other)),
        }
    }
}

impl fmt::Display for ClassInterest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Preferred class schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionInterest {
    #[serde(rename = "Morning Class")]
    MorningClass,
    #[serde(rename = "Evening Class")]
    EveningClass,
    #[serde(rename = "Only Weekend")]
    OnlyWeekend,
}

impl SectionInterest {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionInterest::MorningClass => "Morning Class",
            SectionInterest::EveningClass => "Evening Class",
            SectionInterest::OnlyWeekend => "Only Weekend",
        }
    }
}

impl FromStr for SectionInterest {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Morning Class" => Ok(SectionInterest::MorningClass),
            "Evening Class" => Ok(SectionInterest::EveningClass),
            "Only Weekend" => Ok(SectionInterest::OnlyWeekend),
            other => Err(format!("`{}` is not a valid section of interest", other)),
        }
    }
}

impl fmt::Display for SectionInterest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review status of a registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    /// Submitted, payment proof not yet reviewed
    #[default]
    Pending,
    /// Payment proof accepted
    Approved,
    /// Payment proof refused
    Rejected,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Approved => "approved",
            RegistrationStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for RegistrationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RegistrationStatus::Pending),
            "approved" => Ok(RegistrationStatus::Approved),
            "rejected" => Ok(RegistrationStatus::Rejected),
            other => Err(format!("`{}` is not a valid status", other)),
        }
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,
    pub name: String,
    /// Lowercased, unique across all registrations
    pub email: String,
    pub phone: String,
    pub class_interest: ClassInterest,
    pub section_interest: SectionInterest,
    /// URL of the stored proof-of-payment image
    pub image: String,
    pub status: RegistrationStatus,
    /// Hex-encoded capability secret, assigned once at creation
    pub access_token: String,
    pub registration_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw registration fields as submitted by a client.
///
/// Every field is optional so the same shape serves create (where the
/// applicant fields are required) and partial update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub class_interest: Option<String>,
    pub section_interest: Option<String>,
    pub status: Option<String>,
}

impl RegistrationInput {
    /// Set a field by its wire name. Unknown names are ignored.
    pub fn set(&mut self, field: &str, value: String) -> bool {
        let slot = match field {
            "name" => &mut self.name,
            "email" => &mut self.email,
            "phone" => &mut self.phone,
            "classInterest" => &mut self.class_interest,
            "sectionInterest" => &mut self.section_interest,
            "status" => &mut self.status,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    /// Validate the applicant fields required at creation.
    pub fn into_fields(self) -> Result<RegistrationFields, StoreError> {
        let name = required(self.name, "Name is required")?;
        let email = required(self.email, "Email is required")?;
        let phone = required(self.phone, "Phone number is required")?;
        let class_interest = required(
            self.class_interest,
            "Please specify the class of interest",
        )?;
        let section_interest = required(
            self.section_interest,
            "Please specify the Interested Section (time)",
        )?;

        Ok(RegistrationFields {
            name: normalize_name(&name).map_err(StoreError::Validation)?,
            email: normalize_email(&email).map_err(StoreError::Validation)?,
            phone: normalize_phone(&phone).map_err(StoreError::Validation)?,
            class_interest: class_interest.parse().map_err(StoreError::Validation)?,
            section_interest: section_interest.parse().map_err(StoreError::Validation)?,
        })
    }

    /// Validate whichever fields are present for a partial update.
    pub fn into_patch(self) -> Result<RegistrationPatch, StoreError> {
        Ok(RegistrationPatch {
            name: self
                .name
                .map(|v| normalize_name(&v))
                .transpose()
                .map_err(StoreError::Validation)?,
            email: self
                .email
                .map(|v| normalize_email(&v))
                .transpose()
                .map_err(StoreError::Validation)?,
            phone: self
                .phone
                .map(|v| normalize_phone(&v))
                .transpose()
                .map_err(StoreError::Validation)?,
            class_interest: self
                .class_interest
                .map(|v| v.parse())
                .transpose()
                .map_err(StoreError::Validation)?,
            section_interest: self
                .section_interest
                .map(|v| v.parse())
                .transpose()
                .map_err(StoreError::Validation)?,
            status: self
                .status
                .map(|v| v.parse())
                .transpose()
                .map_err(StoreError::Validation)?,
            image: None,
        })
    }
}

fn required(value: Option<String>, message: &str) -> Result<String, StoreError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| StoreError::Validation(message.to_string()))
}

/// Validated applicant fields, before an image has been stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationFields {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub class_interest: ClassInterest,
    pub section_interest: SectionInterest,
}

impl RegistrationFields {
    /// Attach the URL of the uploaded proof of payment.
    pub fn with_image(self, image: impl Into<String>) -> NewRegistration {
        NewRegistration {
            fields: self,
            image: image.into(),
            access_token: None,
        }
    }
}

/// Everything needed to create a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRegistration {
    pub fields: RegistrationFields,
    pub image: String,
    /// Generated by the store when absent
    pub access_token: Option<String>,
}

/// A partial update. `None` leaves the stored value unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub class_interest: Option<ClassInterest>,
    pub section_interest: Option<SectionInterest>,
    pub status: Option<RegistrationStatus>,
    pub image: Option<String>,
}

impl RegistrationPatch {
    pub fn is_empty(&self) -> bool {
        self == &RegistrationPatch::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> RegistrationInput {
        RegistrationInput {
            name: Some(" Ada ".into()),
            email: Some("ADA@X.COM".into()),
            phone: Some("1234567890".into()),
            class_interest: Some("SQL master class".into()),
            section_interest: Some("Morning Class".into()),
            status: None,
        }
    }

    #[test]
    fn test_enum_wire_strings() {
        assert_eq!(
            serde_json::to_string(&ClassInterest::PythonMasterClass).unwrap(),
            "\"Python master class\""
        );
        assert_eq!(
            serde_json::to_string(&SectionInterest::OnlyWeekend).unwrap(),
            "\"Only Weekend\""
        );
        assert_eq!(
            serde_json::to_string(&RegistrationStatus::Rejected).unwrap(),
            "\"rejected\""
        );
        assert_eq!(RegistrationStatus::default(), RegistrationStatus::Pending);
    }

    #[test]
    fn test_enum_parsing_is_exact() {
        assert_eq!(
            "Evening Class".parse::<SectionInterest>(),
            Ok(SectionInterest::EveningClass)
        );
        assert!("evening class".parse::<SectionInterest>().is_err());
        assert!("Rust master class".parse::<ClassInterest>().is_err());
        assert!("SQL master class ".parse::<ClassInterest>().is_err());
        assert!(" Morning Class".parse::<SectionInterest>().is_err());
        assert!("approved\n".parse::<RegistrationStatus>().is_err());
        assert_eq!(
            "approved".parse::<RegistrationStatus>(),
            Ok(RegistrationStatus::Approved)
        );
    }

    #[test]
    fn test_into_fields_normalizes() {
        let fields = input().into_fields().unwrap();
        assert_eq!(fields.name, "Ada");
        assert_eq!(fields.email, "ada@x.com");
        assert_eq!(fields.class_interest, ClassInterest::SqlMasterClass);
        assert_eq!(fields.section_interest, SectionInterest::MorningClass);
    }

    #[test]
    fn test_into_fields_requires_every_field() {
        let mut missing = input();
        missing.phone = None;
        let err = missing.into_fields().unwrap_err();
        assert_eq!(err.to_string(), "Phone number is required");

        let mut blank = input();
        blank.name = Some("   ".into());
        assert!(matches!(blank.into_fields(), Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_into_fields_rejects_bad_enum() {
        let mut bad = input();
        bad.class_interest = Some("Go master class".into());
        assert!(matches!(bad.into_fields(), Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_into_patch_only_validates_present_fields() {
        let patch = RegistrationInput {
            status: Some("approved".into()),
            ..Default::default()
        }
        .into_patch()
        .unwrap();

        assert_eq!(patch.status, Some(RegistrationStatus::Approved));
        assert!(patch.name.is_none());
        assert!(!patch.is_empty());

        assert!(RegistrationInput::default().into_patch().unwrap().is_empty());

        let bad = RegistrationInput {
            email: Some("nope".into()),
            ..Default::default()
        };
        assert!(bad.into_patch().is_err());
    }

    #[test]
    fn test_input_set_by_wire_name() {
        let mut input = RegistrationInput::default();
        assert!(input.set("classInterest", "SQL master class".into()));
        assert!(!input.set("accessToken", "forged".into()));
        assert_eq!(input.class_interest.as_deref(), Some("SQL master class"));
    }

    #[test]
    fn test_input_deserializes_camel_case() {
        let input: RegistrationInput = serde_json::from_str(
            r#"{"name":"Ada","sectionInterest":"Only Weekend","accessToken":"ignored"}"#,
        )
        .unwrap();
        assert_eq!(input.name.as_deref(), Some("Ada"));
        assert_eq!(input.section_interest.as_deref(), Some("Only Weekend"));
    }
}
