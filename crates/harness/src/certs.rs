//! Certificate inspection.
//!
//! Scenario assertions need two facts about an issued certificate: its
//! serial number and its subject-alternative-name list. Both are read once
//! from the PEM file on disk; the descriptor is immutable afterwards.

use std::path::Path;

use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::*;

use crate::error::HarnessError;

/// Serial number and SAN list of one certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateDescriptor {
    /// Serial number bytes, big-endian, leading zeros stripped
    serial: Vec<u8>,
    /// DNS names from the subject-alternative-name extension, in
    /// certificate order, wildcard names included
    san: Vec<String>,
}

impl CertificateDescriptor {
    /// Read the first certificate of a PEM file.
    pub fn from_pem_file(path: &Path) -> Result<Self, HarnessError> {
        let data = std::fs::read(path)?;
        Self::from_pem(&data)
    }

    /// Parse the first certificate of a PEM document.
    pub fn from_pem(data: &[u8]) -> Result<Self, HarnessError> {
        let (_, pem) =
            parse_x509_pem(data).map_err(|e| HarnessError::CertParse(e.to_string()))?;
        let cert = pem
            .parse_x509()
            .map_err(|e| HarnessError::CertParse(e.to_string()))?;

        // DER may prefix a sign byte; strip it for comparisons
        let mut serial: Vec<u8> = cert
            .raw_serial()
            .iter()
            .copied()
            .skip_while(|b| *b == 0)
            .collect();
        if serial.is_empty() {
            serial.push(0);
        }

        let mut san = Vec::new();
        for ext in cert.extensions() {
            if let ParsedExtension::SubjectAlternativeName(names) = ext.parsed_extension() {
                for name in &names.general_names {
                    if let GeneralName::DNSName(dns) = name {
                        san.push((*dns).to_string());
                    }
                }
            }
        }

        Ok(Self { serial, san })
    }

    /// Serial number as uppercase hex.
    pub fn serial_hex(&self) -> String {
        self.serial.iter().map(|b| format!("{b:02X}")).collect()
    }

    /// Whether the serial equals the given number.
    pub fn same_serial_as(&self, serial: u64) -> bool {
        let bytes = serial.to_be_bytes();
        let mut trimmed: Vec<u8> = bytes.iter().copied().skip_while(|b| *b == 0).collect();
        if trimmed.is_empty() {
            trimmed.push(0);
        }
        self.serial == trimmed
    }

    /// DNS subject-alternative-names.
    pub fn san_list(&self) -> &[String] {
        &self.san
    }

    /// How often `name` appears in the SAN list.
    pub fn san_count(&self, name: &str) -> usize {
        self.san.iter().filter(|n| n.as_str() == name).count()
    }
}
