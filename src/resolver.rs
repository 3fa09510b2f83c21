// Recipient resolution - roles and class names to addresses

use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

#[cfg(test)]
use mockall::automock;

use crate::config::DirectoryConfig;

/// Settings-sheet keys, as used on the school's settings sheet
pub const GUIDANCE_KEY: &str = "進路部メール";
pub const OFFICE_KEY: &str = "事務室メール";
pub const ADMIN_KEY: &str = "管理者メール";
/// `<class>担任メール`, e.g. `A組担任メール`
pub const TEACHER_KEY_SUFFIX: &str = "担任メール";

static ADDRESS_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

/// Loose shape check applied before any send
pub fn looks_like_address(value: &str) -> bool {
    ADDRESS_PATTERN
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(value.trim()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Guidance department (進路部)
    Guidance,
    /// Administrative office (事務室)
    Office,
    /// Script administrator, the operator channel
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Guidance => write!(f, "guidance department"),
            Role::Office => write!(f, "office"),
            Role::Admin => write!(f, "administrator"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecipientKey {
    Role(Role),
    /// Homeroom teacher of the named class
    ClassTeacher(String),
}

impl fmt::Display for RecipientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecipientKey::Role(role) => write!(f, "{role}"),
            RecipientKey::ClassTeacher(class) => write!(f, "homeroom teacher of class '{class}'"),
        }
    }
}

/// Maps a role or class name to an address. Absence is not an error here;
/// callers decide what a missing address means.
#[cfg_attr(test, automock)]
pub trait RecipientResolver {
    fn resolve(&self, key: &RecipientKey) -> Option<String>;
}

impl<F> RecipientResolver for F
where
    F: Fn(&RecipientKey) -> Option<String>,
{
    fn resolve(&self, key: &RecipientKey) -> Option<String> {
        self(key)
    }
}

/// Resolved address book for one event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    pub guidance: Option<String>,
    pub office: Option<String>,
    pub admin: Option<String>,
    pub teachers: BTreeMap<String, String>,
}

impl Directory {
    pub fn from_config(config: &DirectoryConfig) -> Self {
        Self {
            guidance: non_empty(config.guidance.as_deref()),
            office: non_empty(config.office.as_deref()),
            admin: non_empty(config.admin.as_deref()),
            teachers: config
                .teachers
                .iter()
                .filter(|entry| !entry.class.trim().is_empty() && !entry.address.trim().is_empty())
                .map(|entry| (entry.class.trim().to_string(), entry.address.trim().to_string()))
                .collect(),
        }
    }

    /// Parse settings-sheet (key, value) rows; rows with an empty side are skipped
    pub fn from_settings_rows<K, V>(rows: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut directory = Self::default();
        for (key, value) in rows {
            let key = key.as_ref().trim();
            let value = value.as_ref().trim();
            if key.is_empty() || value.is_empty() {
                continue;
            }
            match key {
                GUIDANCE_KEY => directory.guidance = Some(value.to_string()),
                OFFICE_KEY => directory.office = Some(value.to_string()),
                ADMIN_KEY => directory.admin = Some(value.to_string()),
                _ => {
                    if let Some(class) = key.strip_suffix(TEACHER_KEY_SUFFIX) {
                        let class = class.trim();
                        if !class.is_empty() {
                            directory.teachers.insert(class.to_string(), value.to_string());
                        }
                    }
                }
            }
        }
        directory
    }

    /// Entries in `other` win over entries in `self`
    pub fn overlay(mut self, other: Directory) -> Self {
        if other.guidance.is_some() {
            self.guidance = other.guidance;
        }
        if other.office.is_some() {
            self.office = other.office;
        }
        if other.admin.is_some() {
            self.admin = other.admin;
        }
        self.teachers.extend(other.teachers);
        self
    }

    /// Gaps worth telling an operator about
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.admin.is_none() {
            warnings.push(format!(
                "'{ADMIN_KEY}' is not configured; error notices will only be logged"
            ));
        }
        if self.guidance.is_none() {
            warnings.push(format!("'{GUIDANCE_KEY}' is not configured"));
        }
        if self.office.is_none() {
            warnings.push(format!("'{OFFICE_KEY}' is not configured"));
        }
        if self.teachers.is_empty() {
            warnings.push(format!(
                "no homeroom teacher addresses configured (expecting keys like 'A組{TEACHER_KEY_SUFFIX}')"
            ));
        }
        for (class, address) in &self.teachers {
            if !looks_like_address(address) {
                warnings.push(format!("teacher address for class '{class}' looks malformed: {address}"));
            }
        }
        warnings
    }
}

impl RecipientResolver for Directory {
    fn resolve(&self, key: &RecipientKey) -> Option<String> {
        match key {
            RecipientKey::Role(Role::Guidance) => self.guidance.clone(),
            RecipientKey::Role(Role::Office) => self.office.clone(),
            RecipientKey::Role(Role::Admin) => self.admin.clone(),
            RecipientKey::ClassTeacher(class) => self.teachers.get(class.trim()).cloned(),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
