//! PKCS#10 certificate signing request decoding.

use super::error::SignerError;
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::{FromDer, X509CertificationRequest};

/// The parts of a CSR forwarded to Key Vault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrInfo {
    /// Subject distinguished name, e.g. `CN=web.example.com`
    pub subject: String,
    pub dns_names: Vec<String>,
}

/// Decode a PEM (as stored by cert-manager) or DER encoded CSR
pub fn decode_csr(bytes: &[u8]) -> Result<CsrInfo, SignerError> {
    if bytes.trim_ascii_start().starts_with(b"-----BEGIN") {
        let (_, pem) = parse_x509_pem(bytes).map_err(|e| SignerError::InvalidCsr(e.to_string()))?;
        if !pem.label.contains("CERTIFICATE REQUEST") {
            return Err(SignerError::InvalidCsr(format!(
                "unexpected PEM block type {:?}",
                pem.label
            )));
        }
        decode_der(&pem.contents)
    } else {
        decode_der(bytes)
    }
}

fn decode_der(der: &[u8]) -> Result<CsrInfo, SignerError> {
    let (_, csr) = X509CertificationRequest::from_der(der)
        .map_err(|e| SignerError::InvalidCsr(e.to_string()))?;

    let mut dns_names = Vec::new();
    if let Some(extensions) = csr.requested_extensions() {
        for extension in extensions {
            if let ParsedExtension::SubjectAlternativeName(san) = extension {
                dns_names.extend(san.general_names.iter().filter_map(|name| match name {
                    GeneralName::DNSName(dns) => Some((*dns).to_string()),
                    _ => None,
                }));
            }
        }
    }

    Ok(CsrInfo {
        subject: csr.certification_request_info.subject.to_string(),
        dns_names,
    })
}
