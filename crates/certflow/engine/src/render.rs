//! Certificate rendering collaborator

use certflow_types::{CertificateDocument, WorkflowError, WorkflowResult};

/// Produces the issued document for a certificate.
///
/// Rendering must be deterministic for a given document; the digest stored
/// on the certificate is taken over the rendered bytes.
pub trait CertificateRenderer: Send + Sync {
    fn media_type(&self) -> &str;

    fn render(&self, document: &CertificateDocument) -> WorkflowResult<Vec<u8>>;
}

/// Renders the certificate as pretty-printed JSON
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCertificateRenderer;

impl CertificateRenderer for JsonCertificateRenderer {
    fn media_type(&self) -> &str {
        "application/json"
    }

    fn render(&self, document: &CertificateDocument) -> WorkflowResult<Vec<u8>> {
        serde_json::to_vec_pretty(document).map_err(|e| WorkflowError::Rendering(e.to_string()))
    }
}

/// Hex blake3 digest of a rendered document
pub fn document_digest(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}
