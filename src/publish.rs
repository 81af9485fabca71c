//! User-data and metadata publication
//!
//! Rendered payloads are encoded, persisted under `/var/lib/vmware` and
//! written to guestinfo together with a `<key>.encoding` marker. Guestinfo
//! does not survive a power cycle, so later boots republish the persisted
//! metadata with [`refresh_metadata`].

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use minijinja::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::ProvisionError;
use crate::config::{ApplianceConfig, ProvisionSettings};
use crate::guestinfo::{GuestInfo, keys};
use crate::network::NetworkConfig;
use crate::state::AppliancePaths;
use crate::template::{
    Context, METADATA_TEMPLATE, USERDATA_TEMPLATE, escape_value, load_template, render_template,
};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Guestinfo payload encodings understood by cloud-init's VMware datasource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PayloadEncoding {
    #[default]
    #[serde(rename = "base64")]
    Base64,
    #[serde(rename = "gzip+base64")]
    GzipBase64,
}

impl PayloadEncoding {
    /// Value written to the `<key>.encoding` companion key
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Base64 => "base64",
            Self::GzipBase64 => "gzip+base64",
        }
    }

    pub fn encode(&self, payload: &str) -> Result<String, ProvisionError> {
        match self {
            Self::Base64 => Ok(BASE64.encode(payload)),
            Self::GzipBase64 => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(payload.as_bytes())?;
                Ok(BASE64.encode(encoder.finish()?))
            }
        }
    }

    pub fn decode(&self, encoded: &str) -> Result<String, ProvisionError> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| ProvisionError::InvalidData(format!("Invalid base64: {}", e)))?;

        let bytes = match self {
            Self::Base64 => bytes,
            Self::GzipBase64 => {
                let mut decompressed = Vec::new();
                GzDecoder::new(bytes.as_slice())
                    .read_to_end(&mut decompressed)
                    .map_err(|e| {
                        ProvisionError::InvalidData(format!("Failed to decompress gzip: {}", e))
                    })?;
                decompressed
            }
        };

        String::from_utf8(bytes)
            .map_err(|e| ProvisionError::InvalidData(format!("Invalid UTF-8: {}", e)))
    }

    /// Work out how a persisted payload was encoded
    pub fn detect(encoded: &str) -> Result<Self, ProvisionError> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| ProvisionError::InvalidData(format!("Invalid base64: {}", e)))?;
        if bytes.starts_with(&GZIP_MAGIC) {
            Ok(Self::GzipBase64)
        } else {
            Ok(Self::Base64)
        }
    }
}

/// Template variables for user-data.
///
/// String fields of [`ApplianceConfig`] arrive already escaped.
pub fn userdata_context(config: &ApplianceConfig) -> Context {
    let mut context = BTreeMap::new();
    context.insert("hostname".into(), Value::from(config.hostname.as_str()));
    context.insert("root_pwd".into(), Value::from(config.root_pwd.as_str()));
    context.insert(
        "disable_root".into(),
        Value::from(!config.permit_root_login),
    );
    context
}

/// Template variables for metadata
pub fn metadata_context(
    config: &ApplianceConfig,
    instance_id: &str,
    network: &NetworkConfig,
) -> Result<Context, ProvisionError> {
    let mut document = BTreeMap::new();
    document.insert("network", network);

    let mut context = BTreeMap::new();
    context.insert("instance_id".into(), Value::from(escape_value(instance_id)));
    context.insert("hostname".into(), Value::from(config.hostname.as_str()));
    context.insert(
        "network".into(),
        Value::from(serde_yaml::to_string(&document)?),
    );
    Ok(context)
}

/// Render user-data without publishing it
pub async fn render_userdata(
    settings: &ProvisionSettings,
    config: &ApplianceConfig,
) -> Result<String, ProvisionError> {
    let template = load_template(settings.userdata_template.as_deref(), USERDATA_TEMPLATE).await?;
    render_template("userdata", &template, &userdata_context(config))
}

/// Render metadata without publishing it
pub async fn render_metadata(
    settings: &ProvisionSettings,
    config: &ApplianceConfig,
    instance_id: &str,
    network: &NetworkConfig,
) -> Result<String, ProvisionError> {
    let template = load_template(settings.metadata_template.as_deref(), METADATA_TEMPLATE).await?;
    render_template(
        "metadata",
        &template,
        &metadata_context(config, instance_id, network)?,
    )
}

/// Render, persist and publish user-data
pub async fn publish_userdata(
    guestinfo: &dyn GuestInfo,
    paths: &AppliancePaths,
    settings: &ProvisionSettings,
    config: &ApplianceConfig,
) -> Result<(), ProvisionError> {
    let rendered = render_userdata(settings, config).await?;
    publish_payload(
        guestinfo,
        &paths.userdata(),
        keys::USERDATA,
        &rendered,
        settings.payload_encoding,
    )
    .await
}

/// Render, persist and publish metadata with a fresh instance id
pub async fn publish_metadata(
    guestinfo: &dyn GuestInfo,
    paths: &AppliancePaths,
    settings: &ProvisionSettings,
    config: &ApplianceConfig,
    network: &NetworkConfig,
) -> Result<(), ProvisionError> {
    let instance_id = uuid::Uuid::new_v4().to_string();
    let rendered = render_metadata(settings, config, &instance_id, network).await?;
    publish_payload(
        guestinfo,
        &paths.metadata(),
        keys::METADATA,
        &rendered,
        settings.payload_encoding,
    )
    .await
}

/// Encode `rendered`, persist it to `local` and set `key` plus its encoding marker
pub async fn publish_payload(
    guestinfo: &dyn GuestInfo,
    local: &Path,
    key: &str,
    rendered: &str,
    encoding: PayloadEncoding,
) -> Result<(), ProvisionError> {
    let encoded = encoding.encode(rendered)?;

    if let Some(parent) = local.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(local, &encoded).await?;
    debug!("Persisted {} to {}", key, local.display());

    guestinfo.set(key, &encoded).await?;
    guestinfo
        .set(&keys::encoding_of(key), encoding.marker())
        .await?;

    info!("Published {} ({})", key, encoding.marker());
    Ok(())
}

/// Restore guestinfo metadata from the persisted copy.
///
/// Returns `true` when the metadata was republished. Does nothing if the
/// store still holds metadata or nothing was ever persisted; a persisted
/// copy that is not valid base64 is skipped with a warning.
pub async fn refresh_metadata(
    guestinfo: &dyn GuestInfo,
    paths: &AppliancePaths,
) -> Result<bool, ProvisionError> {
    if guestinfo.get(keys::METADATA).await?.is_some() {
        debug!("Guestinfo metadata present, nothing to refresh");
        return Ok(false);
    }

    let local = paths.metadata();
    if !local.exists() {
        debug!("No persisted metadata at {}", local.display());
        return Ok(false);
    }

    let encoded = fs::read_to_string(&local).await?;
    let encoding = match PayloadEncoding::detect(&encoded) {
        Ok(encoding) => encoding,
        Err(e) => {
            warn!("Ignoring unreadable {}: {}", local.display(), e);
            return Ok(false);
        }
    };

    guestinfo.set(keys::METADATA, encoded.trim()).await?;
    guestinfo
        .set(&keys::encoding_of(keys::METADATA), encoding.marker())
        .await?;

    info!("Restored guestinfo metadata from {}", local.display());
    Ok(true)
}
