//! Dependency Manifest
//!
//! The native libraries this project was first declared against, kept as
//! typed data so the declarations can be checked for consistency: the
//! complete manifest (utility, TLS and HTTP client libraries) and the
//! minimal one without the HTTP client.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::models::errors::{AppError, AppResult, ErrorCode};

pub const PACKAGE_NAME: &str = "network-monitor";
pub const PACKAGE_VERSION: &str = "0.1.0";
pub const GENERATOR: &str = "cmake_find_package";

/// Version of a declared dependency.
///
/// `major.minor.patch` with an optional lowercase letter suffix, as used by
/// OpenSSL releases (`1.1.1h`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub suffix: Option<String>,
}

impl PackageVersion {
    pub fn parse(s: &str) -> AppResult<Self> {
        let invalid = || {
            AppError::new(
                ErrorCode::ManifestInvalidVersion,
                format!("Invalid version: {:?}", s),
            )
        };

        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(invalid());
        }

        let numeric = |part: &str| -> AppResult<u32> {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse().map_err(|_| invalid())
        };

        let last = parts[2];
        let digits_end = last
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(last.len());
        let (patch, suffix) = last.split_at(digits_end);
        if !suffix.bytes().all(|b| b.is_ascii_lowercase()) {
            return Err(invalid());
        }

        Ok(Self {
            major: numeric(parts[0])?,
            minor: numeric(parts[1])?,
            patch: numeric(patch)?,
            suffix: (!suffix.is_empty()).then(|| suffix.to_string()),
        })
    }
}

impl FromStr for PackageVersion {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PackageVersion {
    type Error = AppError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<PackageVersion> for String {
    fn from(v: PackageVersion) -> Self {
        v.to_string()
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(suffix) = &self.suffix {
            f.write_str(suffix)?;
        }
        Ok(())
    }
}

/// A `name/version` requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub name: String,
    pub version: String,
}

impl Requirement {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
        }
    }

    pub fn parsed_version(&self) -> AppResult<PackageVersion> {
        PackageVersion::parse(&self.version)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageId {
    pub name: String,
    pub version: String,
}

/// Value of a boolean build option
pub type OptionValue = bool;

/// Build options, keyed `dependency:option`
pub type ManifestOptions = BTreeMap<String, OptionValue>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyManifest {
    pub package: PackageId,
    pub generator: String,
    pub requires: Vec<Requirement>,
    pub options: ManifestOptions,
}

impl DependencyManifest {
    /// Utility, TLS and HTTP client libraries
    pub fn complete() -> Self {
        let mut manifest = Self::minimal();
        manifest.requires.push(Requirement::new("libcurl", "7.73.0"));
        manifest
    }

    /// Utility and TLS libraries only
    pub fn minimal() -> Self {
        let options = [
            ("boost:shared", true),
            ("boost:without_fiber", true),
            ("boost:without_nowide", true),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            package: PackageId {
                name: PACKAGE_NAME.to_string(),
                version: PACKAGE_VERSION.to_string(),
            },
            generator: GENERATOR.to_string(),
            requires: vec![
                Requirement::new("boost", "1.74.0"),
                Requirement::new("openssl", "1.1.1h"),
            ],
            options,
        }
    }

    pub fn from_json(src: &str) -> AppResult<Self> {
        let manifest: Self = serde_json::from_str(src)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn requirement(&self, name: &str) -> Option<&Requirement> {
        self.requires.iter().find(|r| r.name == name)
    }

    pub fn option(&self, dependency: &str, option: &str) -> Option<OptionValue> {
        self.options.get(&format!("{}:{}", dependency, option)).copied()
    }

    /// Versions parse, no dependency is declared twice, and every option
    /// targets a declared dependency
    pub fn validate(&self) -> AppResult<()> {
        PackageVersion::parse(&self.package.version)?;

        for (i, requirement) in self.requires.iter().enumerate() {
            requirement.parsed_version()?;
            if self.requires[..i].iter().any(|r| r.name == requirement.name) {
                return Err(AppError::new(
                    ErrorCode::ManifestInconsistent,
                    format!("Dependency declared twice: {}", requirement.name),
                ));
            }
        }

        for key in self.options.keys() {
            let dependency = key.split(':').next().unwrap_or("");
            if !key.contains(':') || self.requirement(dependency).is_none() {
                return Err(AppError::new(
                    ErrorCode::ManifestInconsistent,
                    format!("Option {} does not target a declared dependency", key),
                ));
            }
        }

        Ok(())
    }

    /// Every requirement of `self` appears, with the same version, in `other`
    pub fn is_subset_of(&self, other: &DependencyManifest) -> bool {
        self.requires
            .iter()
            .all(|r| other.requirement(&r.name) == Some(r))
    }

    /// Options on dependencies declared by both manifests are identical
    pub fn options_consistent_with(&self, other: &DependencyManifest) -> bool {
        let shared = |key: &String| {
            let dependency = key.split(':').next().unwrap_or("");
            self.requirement(dependency).is_some() && other.requirement(dependency).is_some()
        };

        let ours: ManifestOptions = self
            .options
            .iter()
            .filter(|(k, _)| shared(k))
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        let theirs: ManifestOptions = other
            .options
            .iter()
            .filter(|(k, _)| shared(k))
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        ours == theirs
    }
}
