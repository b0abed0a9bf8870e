//! Registry-backed supplier.
//!
//! Talks to a package registry over HTTP. Two endpoints are used:
//! `GET <base>/packages/<name>/manifest` and
//! `GET <base>/packages/<name>/archive`, both taking the constraint as a
//! query parameter; the registry performs best-version selection. Archive
//! responses may carry an `x-archive-sha256` header, in which case the
//! downloaded bytes are verified against it.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use reqwest::blocking::Client;
use reqwest::header;
use reqwest::StatusCode;
use sha2::{Digest, Sha256};

use crate::core::manifest::Manifest;
use crate::core::version::Constraint;
use crate::supplier::{Supplier, SupplierError};
use crate::types::PackageName;

const DIGEST_HEADER: &str = "x-archive-sha256";

pub struct RegistrySupplier {
    base: String,
    client: Client,
}

impl RegistrySupplier {
    pub fn new(base: impl Into<String>) -> Result<Self, SupplierError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static(crate::USER_AGENT),
        );
        let client = Client::builder().default_headers(headers).build()?;
        Ok(Self {
            base: base.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn get(
        &self,
        name: &PackageName,
        constraint: &Constraint,
        leaf: &str,
    ) -> Result<reqwest::blocking::Response, SupplierError> {
        let url = format!("{}/packages/{}/{}", self.base, name, leaf);
        let response = self
            .client
            .get(&url)
            .query(&[("constraint", constraint.to_string())])
            .send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(SupplierError::NotFound {
                name: name.clone(),
                constraint: constraint.clone(),
            });
        }
        Ok(response.error_for_status()?)
    }
}

impl Supplier for RegistrySupplier {
    fn manifest(
        &self,
        name: &PackageName,
        constraint: &Constraint,
    ) -> Result<Manifest, SupplierError> {
        let response = self.get(name, constraint, "manifest")?;
        let bytes = response.bytes()?;
        Ok(Manifest::from_slice(&bytes)?)
    }

    fn store(
        &self,
        dest: &Path,
        name: &PackageName,
        constraint: &Constraint,
    ) -> Result<(), SupplierError> {
        let mut response = self.get(name, constraint, "archive")?;
        let expected = response
            .headers()
            .get(DIGEST_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_ascii_lowercase());

        // Download next to the destination, rename once complete, so `dest`
        // never holds a truncated archive.
        let part = dest.with_extension("part");
        let digest = {
            let mut file = File::create(&part)?;
            let mut hasher = Sha256::new();
            let mut buf = [0u8; 64 * 1024];
            loop {
                let n = response.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
                file.write_all(&buf[..n])?;
            }
            file.sync_all()?;
            format!("{:x}", hasher.finalize())
        };

        if let Some(expected) = expected {
            if digest != expected {
                let _ = fs::remove_file(&part);
                return Err(SupplierError::DigestMismatch {
                    expected,
                    actual: digest,
                });
            }
        }

        fs::rename(&part, dest)?;
        Ok(())
    }
}
