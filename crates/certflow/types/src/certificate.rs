//! Issued certificates
//!
//! A [`Certificate`] is the permanent artifact of a completed
//! application. It is immutable once issued; renewal creates a new
//! application rather than touching the old certificate.

use crate::{ActorId, ApplicantDetails, ApplicationId, CertificateId};
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A certificate issued for a completed application
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: CertificateId,
    pub application_id: ApplicationId,
    pub serial_number: String,
    /// Applicant details as they stood when the application completed
    pub applicant: ApplicantDetails,
    /// The applicant account that owns the certificate
    pub holder: ActorId,
    pub issuing_officer: IssuingOfficer,
    pub issued_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    /// blake3 digest of the rendered document
    pub document_digest: String,
    pub media_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renewal_of: Option<CertificateId>,
}

impl Certificate {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.valid_until
    }

    /// Whether renewal may be requested `window_days` before expiry
    pub fn renewal_open(&self, now: DateTime<Utc>, window_days: i64) -> bool {
        match self.renewal_opens_at(window_days) {
            Some(opens) => now >= opens,
            None => window_days > 0,
        }
    }

    /// First instant renewal may be requested, `None` when the window
    /// falls outside the representable date range
    pub fn renewal_opens_at(&self, window_days: i64) -> Option<DateTime<Utc>> {
        Duration::try_days(window_days).and_then(|w| self.valid_until.checked_sub_signed(w))
    }

    /// The immutable snapshot handed to a renderer
    pub fn document(&self) -> CertificateDocument {
        CertificateDocument {
            serial_number: self.serial_number.clone(),
            application_id: self.application_id.clone(),
            applicant: self.applicant.clone(),
            issuing_officer: self.issuing_officer.clone(),
            issued_at: self.issued_at,
            valid_until: self.valid_until,
        }
    }
}

/// The officer whose approval completed the application
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuingOfficer {
    pub id: ActorId,
    pub name: String,
}

/// Applicant and officer data rendered onto the certificate
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateDocument {
    pub serial_number: String,
    pub application_id: ApplicationId,
    pub applicant: ApplicantDetails,
    pub issuing_officer: IssuingOfficer,
    pub issued_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

/// Derive the serial number for an application's certificate.
///
/// The serial depends only on the application id and the issue year, so
/// retried issuance always computes the same serial.
pub fn derive_serial(
    prefix: &str,
    application_id: &ApplicationId,
    issued_at: DateTime<Utc>,
) -> String {
    let digest = blake3::hash(application_id.as_str().as_bytes()).to_hex().to_string();
    format!(
        "{}-{}-{}",
        prefix,
        issued_at.year(),
        digest[..12].to_ascii_uppercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_certificate(valid_until: DateTime<Utc>) -> Certificate {
        let issued_at = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        Certificate {
            id: CertificateId::generate(),
            application_id: ApplicationId::new("app-1"),
            serial_number: derive_serial("CC", &ApplicationId::new("app-1"), issued_at),
            applicant: ApplicantDetails::new("Lakshmi Devi", "123412341234", "BC-A"),
            holder: ActorId::new("applicant-1"),
            issuing_officer: IssuingOfficer {
                id: ActorId::new("mro-1"),
                name: "Srinivas".into(),
            },
            issued_at,
            valid_until,
            document_digest: String::new(),
            media_type: "application/json".into(),
            renewal_of: None,
        }
    }

    #[test]
    fn test_serial_is_deterministic() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let id = ApplicationId::new("app-1");
        let a = derive_serial("CC", &id, at);
        let b = derive_serial("CC", &id, at);
        assert_eq!(a, b);
        assert!(a.starts_with("CC-2026-"));
        assert_eq!(a.len(), "CC-2026-".len() + 12);
        assert_ne!(a, derive_serial("CC", &ApplicationId::new("app-2"), at));
    }

    #[test]
    fn test_expiry_and_renewal_window() {
        let until = Utc.with_ymd_and_hms(2027, 3, 1, 0, 0, 0).unwrap();
        let cert = make_certificate(until);

        let well_before = until - Duration::days(90);
        assert!(!cert.is_expired(well_before));
        assert!(!cert.renewal_open(well_before, 30));

        let inside_window = until - Duration::days(10);
        assert!(cert.renewal_open(inside_window, 30));
        assert!(cert.is_expired(until));
    }

    #[test]
    fn test_renewal_window_out_of_range_does_not_panic() {
        let until = Utc.with_ymd_and_hms(2027, 3, 1, 0, 0, 0).unwrap();
        let cert = make_certificate(until);
        assert_eq!(cert.renewal_opens_at(i64::MAX), None);
        assert!(cert.renewal_open(until - Duration::days(400), i64::MAX));
        assert!(!cert.renewal_open(until, i64::MIN));
    }

    #[test]
    fn test_document_snapshot() {
        let cert = make_certificate(Utc::now());
        let doc = cert.document();
        assert_eq!(doc.serial_number, cert.serial_number);
        assert_eq!(doc.applicant, cert.applicant);
    }
}
