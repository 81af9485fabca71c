//! CA material supplied through OVF properties
//!
//! Certificates pasted into OVF property fields frequently arrive with
//! their newlines collapsed to spaces. [`reformat_pem`] restores the PEM
//! layout before the files are written.

use tracing::info;

use super::files::write_file;
use crate::ProvisionError;
use crate::config::ApplianceConfig;
use crate::guestinfo::is_unset;
use crate::state::AppliancePaths;

const BEGIN: &str = "-----BEGIN ";
const END: &str = "-----END ";
const DASHES: &str = "-----";

/// Whether the default CA has to be generated.
///
/// True unless both the CA certificate and its key were supplied.
pub fn get_create_default_ca(config: &ApplianceConfig) -> bool {
    let missing = |value: &Option<String>| value.as_deref().is_none_or(is_unset);
    missing(&config.ca_cert) || missing(&config.ca_cert_key)
}

/// Write the supplied CA certificate and key.
///
/// Returns `false` without touching the filesystem when the default CA is
/// used instead; that one is created by `lb-ca-gen` when dataplaneapi
/// starts.
pub async fn write_ca_files(
    paths: &AppliancePaths,
    config: &ApplianceConfig,
) -> Result<bool, ProvisionError> {
    if get_create_default_ca(config) {
        info!("No CA supplied, default CA will be generated");
        return Ok(false);
    }
    let (Some(cert), Some(key)) = (&config.ca_cert, &config.ca_cert_key) else {
        return Ok(false);
    };

    let cert = reformat_pem(cert)?;
    let key = reformat_pem(key)?;

    write_file(&paths.ca_cert(), &cert, 0o644).await?;
    write_file(&paths.ca_key(), &key, 0o600).await?;

    info!("Installed supplied CA at {}", paths.ca_cert().display());
    Ok(true)
}

/// Restore PEM line breaks in text whose newlines became spaces.
///
/// Each `-----BEGIN <label>-----` / `-----END <label>-----` block is
/// rebuilt with the armor lines and every whitespace separated body token
/// on a line of its own. Already well-formed input comes back unchanged,
/// so applying this twice equals applying it once. Blocks with RFC 1421
/// headers (`Proc-Type:`, `DEK-Info:`) are rejected.
pub fn reformat_pem(input: &str) -> Result<String, ProvisionError> {
    let mut out = String::new();
    let mut rest = input;

    while let Some(start) = rest.find(BEGIN) {
        let after_begin = &rest[start + BEGIN.len()..];
        let label_end = after_begin.find(DASHES).ok_or_else(|| {
            ProvisionError::Certificate("unterminated PEM BEGIN marker".to_string())
        })?;
        let raw_label = &after_begin[..label_end];
        let label = raw_label.split_whitespace().collect::<Vec<_>>().join(" ");

        let body_and_rest = &after_begin[label_end + DASHES.len()..];
        let end_marker = body_and_rest.find(END).ok_or_else(|| {
            ProvisionError::Certificate(format!("missing END marker for '{label}'"))
        })?;
        let body = &body_and_rest[..end_marker];

        let after_end = &body_and_rest[end_marker + END.len()..];
        let end_label_len = after_end.find(DASHES).ok_or_else(|| {
            ProvisionError::Certificate("unterminated PEM END marker".to_string())
        })?;
        let end_label = after_end[..end_label_len]
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if end_label != label {
            return Err(ProvisionError::Certificate(format!(
                "PEM block '{label}' closed by '{end_label}'"
            )));
        }

        // Base64 has no ':'; one means RFC 1421 headers, i.e. an encrypted key
        if body.split_whitespace().any(|token| token.contains(':')) {
            return Err(ProvisionError::Certificate(format!(
                "PEM block '{label}' carries headers; encrypted keys are not supported"
            )));
        }

        out.push_str(BEGIN);
        out.push_str(&label);
        out.push_str(DASHES);
        out.push('\n');
        for token in body.split_whitespace() {
            out.push_str(token);
            out.push('\n');
        }
        out.push_str(END);
        out.push_str(&label);
        out.push_str(DASHES);
        out.push('\n');

        rest = &after_end[end_label_len + DASHES.len()..];
    }

    if out.is_empty() {
        return Err(ProvisionError::Certificate("no PEM block found".to_string()));
    }

    Ok(out)
}
