//! Self-signed certificate authority generation
//!
//! Wraps the `openssl` toolkit: an X.509 request config is rendered into a
//! scratch directory, `openssl req -x509` creates the certificate and key,
//! `openssl pkcs8` rewrites the key as unencrypted PKCS#8 on every OpenSSL
//! version, and both files are copied to the output directory. The scratch
//! directory is a [`tempfile::TempDir`] and is removed on every exit path.

use minijinja::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};

use crate::ProvisionError;
use crate::modules::files::write_file;
use crate::template::{Context, render_template};

const REQUEST_CONFIG_TEMPLATE: &str = r#"[ req ]
default_bits = {{ bits }}
prompt = no
distinguished_name = req_distinguished_name
x509_extensions = v3_ca

[ req_distinguished_name ]
C = {{ country }}
ST = {{ state }}
L = {{ locality }}
O = {{ organization }}
OU = {{ org_unit }}
CN = {{ common_name }}

[ v3_ca ]
basicConstraints = critical, CA:TRUE
keyUsage = critical, keyCertSign, cRLSign, digitalSignature, keyEncipherment
subjectKeyIdentifier = hash
authorityKeyIdentifier = keyid:always, issuer
"#;

/// Upper bound for an X.509 common name
const MAX_COMMON_NAME: usize = 64;

/// CA generation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct CaOptions {
    pub common_name: String,
    pub output_dir: PathBuf,
    pub country: String,
    pub state: String,
    pub locality: String,
    pub organization: String,
    pub org_unit: String,
    /// RSA key size
    pub bits: u32,
    /// Validity in days
    pub days: u32,
    /// Output file stem: `<prefix>.crt`, `<prefix>.key`
    pub prefix: String,
    /// Keep existing output files
    pub no_overwrite: bool,
    /// Toolkit binary
    pub openssl: String,
    /// Where the scratch directory is created (system temp dir if unset)
    pub scratch_parent: Option<PathBuf>,
}

impl Default for CaOptions {
    fn default() -> Self {
        Self {
            common_name: String::new(),
            output_dir: PathBuf::from("."),
            country: "US".to_string(),
            state: "California".to_string(),
            locality: "Palo Alto".to_string(),
            organization: "VMware".to_string(),
            org_unit: "CAPV".to_string(),
            bits: 2048,
            days: 3650,
            prefix: "ca".to_string(),
            no_overwrite: false,
            openssl: "openssl".to_string(),
            scratch_parent: None,
        }
    }
}

impl CaOptions {
    /// Defaults for `common_name`
    pub fn new(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            ..Default::default()
        }
    }

    pub fn cert_file_name(&self) -> String {
        format!("{}.crt", self.prefix)
    }

    pub fn key_file_name(&self) -> String {
        format!("{}.key", self.prefix)
    }

    pub fn cert_path(&self) -> PathBuf {
        self.output_dir.join(self.cert_file_name())
    }

    pub fn key_path(&self) -> PathBuf {
        self.output_dir.join(self.key_file_name())
    }

    /// Check parameters before anything touches the filesystem
    pub fn validate(&self) -> Result<(), ProvisionError> {
        let invalid = |msg: String| Err(ProvisionError::Certificate(msg));

        if self.common_name.trim().is_empty() {
            return invalid("common name is required".to_string());
        }
        if self.common_name.chars().count() > MAX_COMMON_NAME {
            return invalid(format!("common name longer than {MAX_COMMON_NAME} characters"));
        }
        let country = &self.country;
        if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
            return invalid(format!("country '{}' must be a two-letter code", self.country));
        }
        for (field, value) in [
            ("common name", &self.common_name),
            ("state", &self.state),
            ("locality", &self.locality),
            ("organization", &self.organization),
            ("organizational unit", &self.org_unit),
        ] {
            if value.trim().is_empty() {
                return invalid(format!("{field} must not be empty"));
            }
            if value.chars().any(char::is_control) {
                return invalid(format!("{field} contains control characters"));
            }
        }
        if !(1024..=16384).contains(&self.bits) {
            return invalid(format!("key size {} outside 1024..=16384", self.bits));
        }
        if self.days == 0 {
            return invalid("validity must be at least one day".to_string());
        }
        if self.prefix.is_empty() || self.prefix.contains(['/', '\\']) {
            return invalid(format!("invalid file prefix '{}'", self.prefix));
        }
        Ok(())
    }
}

/// Result of a generator run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaOutcome {
    Generated { cert: PathBuf, key: PathBuf },
    /// `no_overwrite` was set and both files already existed
    Skipped,
}

/// Escape a distinguished-name value for an openssl config file
pub fn escape_config_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '$' | '#' | '"' | '\'') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Render the openssl request config for `options`
pub fn render_request_config(options: &CaOptions) -> Result<String, ProvisionError> {
    let mut context = Context::new();
    context.insert("bits".into(), Value::from(options.bits));
    for (key, value) in [
        ("country", &options.country),
        ("state", &options.state),
        ("locality", &options.locality),
        ("organization", &options.organization),
        ("org_unit", &options.org_unit),
        ("common_name", &options.common_name),
    ] {
        context.insert(key.into(), Value::from(escape_config_value(value)));
    }
    render_template("req.cnf", REQUEST_CONFIG_TEMPLATE, &context)
}

/// Generate a self-signed CA certificate and key
pub async fn generate_ca(options: &CaOptions) -> Result<CaOutcome, ProvisionError> {
    options.validate()?;

    let cert_path = options.cert_path();
    let key_path = options.key_path();

    if options.no_overwrite && cert_path.exists() && key_path.exists() {
        info!(
            "{} and {} exist, skipping generation",
            cert_path.display(),
            key_path.display()
        );
        return Ok(CaOutcome::Skipped);
    }

    let mut builder = tempfile::Builder::new();
    builder.prefix("lb-ca-gen.");
    let scratch = match &options.scratch_parent {
        Some(parent) => builder.tempdir_in(parent)?,
        None => builder.tempdir()?,
    };
    debug!("Scratch directory: {}", scratch.path().display());

    let request_config = scratch.path().join("req.cnf");
    fs::write(&request_config, render_request_config(options)?).await?;

    let cert_name = options.cert_file_name();
    let key_name = options.key_file_name();
    let raw_key_name = format!("{key_name}.raw");
    let bits = format!("rsa:{}", options.bits);
    let days = options.days.to_string();

    run_openssl(
        &options.openssl,
        scratch.path(),
        &[
            "req",
            "-config",
            "req.cnf",
            "-x509",
            "-new",
            "-nodes",
            "-newkey",
            &bits,
            "-days",
            &days,
            "-keyout",
            &raw_key_name,
            "-out",
            &cert_name,
        ],
    )
    .await?;

    run_openssl(
        &options.openssl,
        scratch.path(),
        &[
            "pkcs8",
            "-topk8",
            "-nocrypt",
            "-in",
            &raw_key_name,
            "-out",
            &key_name,
        ],
    )
    .await?;

    let cert = read_output(scratch.path(), &cert_name).await?;
    let key = read_output(scratch.path(), &key_name).await?;

    write_file(&cert_path, &cert, 0o644).await?;
    write_file(&key_path, &key, 0o600).await?;

    info!(
        "Generated CA '{}': {}, {}",
        options.common_name,
        cert_path.display(),
        key_path.display()
    );

    Ok(CaOutcome::Generated {
        cert: cert_path,
        key: key_path,
    })
}

async fn read_output(dir: &Path, name: &str) -> Result<String, ProvisionError> {
    let path = dir.join(name);
    if !path.is_file() {
        return Err(ProvisionError::Certificate(format!(
            "openssl did not produce {name}"
        )));
    }
    Ok(fs::read_to_string(&path).await?)
}

async fn run_openssl(program: &str, cwd: &Path, args: &[&str]) -> Result<(), ProvisionError> {
    debug!("Running {} {:?}", program, args);

    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .output()
        .await
        .map_err(|e| ProvisionError::Command(format!("{program}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProvisionError::Command(format!(
            "{} {} exited with {}: {}",
            program,
            args.first().copied().unwrap_or_default(),
            output.status.code().unwrap_or(-1),
            stderr.trim()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let options = CaOptions::new("test.local");
        assert_eq!(options.country, "US");
        assert_eq!(options.state, "California");
        assert_eq!(options.locality, "Palo Alto");
        assert_eq!(options.organization, "VMware");
        assert_eq!(options.org_unit, "CAPV");
        assert_eq!(options.bits, 2048);
        assert_eq!(options.days, 3650);
        assert_eq!(options.cert_path(), PathBuf::from("./ca.crt"));
        assert!(!options.no_overwrite);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        let cases = [
            CaOptions::new(""),
            CaOptions::new("x".repeat(65)),
            CaOptions {
                country: "USA".into(),
                ..CaOptions::new("test.local")
            },
            CaOptions {
                bits: 512,
                ..CaOptions::new("test.local")
            },
            CaOptions {
                days: 0,
                ..CaOptions::new("test.local")
            },
            CaOptions {
                prefix: "../ca".into(),
                ..CaOptions::new("test.local")
            },
            CaOptions {
                locality: "Palo\nAlto".into(),
                ..CaOptions::new("test.local")
            },
        ];
        for options in cases {
            assert!(options.validate().is_err(), "{options:?}");
        }
    }

    #[test]
    fn test_request_config() {
        let options = CaOptions {
            organization: "Acme $ #1".into(),
            ..CaOptions::new("test.local")
        };
        let config = render_request_config(&options).unwrap();

        assert!(config.contains("default_bits = 2048\n"));
        assert!(config.contains("C = US\n"));
        assert!(config.contains("L = Palo Alto\n"));
        assert!(config.contains("O = Acme \\$ \\#1\n"));
        assert!(config.contains("CN = test.local\n"));
        assert!(config.contains("basicConstraints = critical, CA:TRUE"));
        assert!(config.contains("keyCertSign"));
    }

    #[tokio::test]
    async fn test_no_overwrite_skips_existing() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("ca.crt"), "existing cert").unwrap();
        std::fs::write(temp.path().join("ca.key"), "existing key").unwrap();

        let options = CaOptions {
            output_dir: temp.path().to_path_buf(),
            no_overwrite: true,
            openssl: "/nonexistent/openssl".into(),
            ..CaOptions::new("test.local")
        };

        assert_eq!(generate_ca(&options).await.unwrap(), CaOutcome::Skipped);
        assert_eq!(
            std::fs::read_to_string(temp.path().join("ca.crt")).unwrap(),
            "existing cert"
        );
        assert_eq!(
            std::fs::read_to_string(temp.path().join("ca.key")).unwrap(),
            "existing key"
        );
    }

    #[tokio::test]
    async fn test_scratch_removed_on_failure() {
        let out = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();

        let options = CaOptions {
            output_dir: out.path().to_path_buf(),
            openssl: "/nonexistent/openssl".into(),
            scratch_parent: Some(scratch.path().to_path_buf()),
            ..CaOptions::new("test.local")
        };

        let err = generate_ca(&options).await.unwrap_err();
        assert!(matches!(err, ProvisionError::Command(_)));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
        assert!(!options.cert_path().exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_output_is_error() {
        // `true` succeeds without producing anything
        let out = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let options = CaOptions {
            output_dir: out.path().to_path_buf(),
            openssl: "true".into(),
            scratch_parent: Some(scratch.path().to_path_buf()),
            ..CaOptions::new("test.local")
        };

        let err = generate_ca(&options).await.unwrap_err();
        assert!(err.to_string().contains("did not produce ca.crt"));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }
}
