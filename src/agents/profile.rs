//! User profile store.
//!
//! Operator profiles and job preferences live in a keyed persistent store:
//! either one `profiles.csv` row per profile or one `<user_id>.json` file
//! per user, selected by configuration. All writes serialise through a
//! per-store lock.

use crate::agents::cv_parser::CvData;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

/// Work arrangement preferences.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum WorkMode {
    Onsite,
    Remote,
    Hybrid,
    Flexible,
}

/// Job-search preferences attached to a profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPreferences {
    #[serde(default)]
    pub titles: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub work_modes: BTreeSet<WorkMode>,
}

/// One operator profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub current_title: Option<String>,
    #[serde(default)]
    pub preferences: JobPreferences,
    #[serde(default)]
    pub min_salary: Option<u64>,
    #[serde(default)]
    pub current_cv_path: Option<String>,
    #[serde(default)]
    pub cv_last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub parsed_cv_data: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// A fresh profile with both timestamps set to now.
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            name: name.into(),
            email: email.into(),
            phone: None,
            location: None,
            current_title: None,
            preferences: JobPreferences::default(),
            min_salary: None,
            current_cv_path: None,
            cv_last_updated: None,
            parsed_cv_data: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Persistent backend for the profile store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileBackend {
    #[default]
    Csv,
    Json,
}

/// Keyed profile store.
pub struct UserProfileStore {
    dir: PathBuf,
    backend: ProfileBackend,
    lock: Mutex<()>,
}

impl UserProfileStore {
    pub fn new(dir: impl Into<PathBuf>, backend: ProfileBackend) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        Ok(Self {
            dir,
            backend,
            lock: Mutex::new(()),
        })
    }

    /// Create and persist a new profile. The `user_id` must be unused and
    /// the email must pass format validation.
    pub fn create(&self, profile: UserProfile) -> Result<UserProfile> {
        validate_profile(&profile)?;
        let _guard = self.lock.lock().expect("profile store lock poisoned");
        if self.read(&profile.user_id)?.is_some() {
            return Err(Error::Storage(format!(
                "profile '{}' already exists",
                profile.user_id
            )));
        }
        self.write_all_or_one(&profile, None)?;
        tracing::info!(user_id = %profile.user_id, "profile created");
        Ok(profile)
    }

    /// Fetch a profile by id.
    pub fn get(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let _guard = self.lock.lock().expect("profile store lock poisoned");
        self.read(user_id)
    }

    /// Merge `updates` (a JSON object) into an existing profile.
    ///
    /// The key and creation timestamp are immutable; `updated_at` is
    /// refreshed to now.
    pub fn update(&self, user_id: &str, updates: Value) -> Result<UserProfile> {
        let Value::Object(updates) = updates else {
            return Err(Error::Storage("profile updates must be a JSON object".into()));
        };

        let _guard = self.lock.lock().expect("profile store lock poisoned");
        let existing = self
            .read(user_id)?
            .ok_or_else(|| Error::Storage(format!("profile '{}' not found", user_id)))?;

        let mut merged = serde_json::to_value(&existing)?;
        if let Value::Object(target) = &mut merged {
            for (key, value) in updates {
                target.insert(key, value);
            }
        }
        let mut updated: UserProfile = serde_json::from_value(merged)?;
        updated.user_id = existing.user_id;
        updated.created_at = existing.created_at;
        updated.updated_at = Utc::now();
        validate_profile(&updated)?;

        self.write_all_or_one(&updated, Some(user_id))?;
        tracing::info!(user_id, "profile updated");
        Ok(updated)
    }

    /// Remove a profile; `Ok(true)` when something was deleted.
    pub fn delete(&self, user_id: &str) -> Result<bool> {
        let _guard = self.lock.lock().expect("profile store lock poisoned");
        match self.backend {
            ProfileBackend::Json => {
                let path = self.json_path(user_id);
                if !path.exists() {
                    return Ok(false);
                }
                std::fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
                Ok(true)
            }
            ProfileBackend::Csv => {
                let mut rows = self.read_csv_rows()?;
                let before = rows.len();
                rows.retain(|p| p.user_id != user_id);
                if rows.len() == before {
                    return Ok(false);
                }
                self.rewrite_csv(&rows)?;
                Ok(true)
            }
        }
    }

    /// Attach CV information to a profile.
    pub fn update_cv_info(
        &self,
        user_id: &str,
        cv_path: &std::path::Path,
        cv_data: &CvData,
    ) -> Result<UserProfile> {
        let updates = serde_json::json!({
            "current_cv_path": cv_path.to_string_lossy(),
            "cv_last_updated": Utc::now(),
            "parsed_cv_data": {
                "filename": cv_data.filename,
                "skills": cv_data.skills,
            },
        });
        self.update(user_id, updates)
    }

    // ---- backend plumbing ----

    fn read(&self, user_id: &str) -> Result<Option<UserProfile>> {
        match self.backend {
            ProfileBackend::Json => {
                let path = self.json_path(user_id);
                if !path.exists() {
                    return Ok(None);
                }
                let raw = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
                Ok(Some(serde_json::from_str(&raw)?))
            }
            ProfileBackend::Csv => Ok(self
                .read_csv_rows()?
                .into_iter()
                .find(|p| p.user_id == user_id)),
        }
    }

    /// Persist one profile: overwrite its JSON file, or splice it into the
    /// CSV table (replacing `replacing` when given, appending otherwise).
    fn write_all_or_one(&self, profile: &UserProfile, replacing: Option<&str>) -> Result<()> {
        match self.backend {
            ProfileBackend::Json => {
                let path = self.json_path(&profile.user_id);
                let raw = serde_json::to_string_pretty(profile)?;
                std::fs::write(&path, raw).map_err(|e| Error::io(&path, e))
            }
            ProfileBackend::Csv => {
                let mut rows = self.read_csv_rows()?;
                match replacing {
                    Some(user_id) => {
                        for row in rows.iter_mut() {
                            if row.user_id == user_id {
                                *row = profile.clone();
                            }
                        }
                    }
                    None => rows.push(profile.clone()),
                }
                self.rewrite_csv(&rows)
            }
        }
    }

    fn read_csv_rows(&self) -> Result<Vec<UserProfile>> {
        let path = self.csv_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(&path)?;
        let mut rows = Vec::new();
        for row in reader.deserialize::<ProfileRow>() {
            rows.push(row?.into_profile()?);
        }
        Ok(rows)
    }

    fn rewrite_csv(&self, rows: &[UserProfile]) -> Result<()> {
        let path = self.csv_path();
        let mut writer = csv::WriterBuilder::new().has_headers(true).from_path(&path)?;
        for profile in rows {
            writer.serialize(ProfileRow::from_profile(profile)?)?;
        }
        writer.flush().map_err(|e| Error::io(&path, e))?;
        Ok(())
    }

    fn csv_path(&self) -> PathBuf {
        self.dir.join("profiles.csv")
    }

    fn json_path(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", user_id))
    }
}

/// Flat CSV row; nested fields travel as JSON strings inside their cells.
#[derive(Debug, Serialize, Deserialize)]
struct ProfileRow {
    user_id: String,
    name: String,
    email: String,
    phone: Option<String>,
    location: Option<String>,
    current_title: Option<String>,
    preferences: String,
    min_salary: Option<u64>,
    current_cv_path: Option<String>,
    cv_last_updated: Option<DateTime<Utc>>,
    parsed_cv_data: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProfileRow {
    fn from_profile(profile: &UserProfile) -> Result<Self> {
        Ok(Self {
            user_id: profile.user_id.clone(),
            name: profile.name.clone(),
            email: profile.email.clone(),
            phone: profile.phone.clone(),
            location: profile.location.clone(),
            current_title: profile.current_title.clone(),
            preferences: serde_json::to_string(&profile.preferences)?,
            min_salary: profile.min_salary,
            current_cv_path: profile.current_cv_path.clone(),
            cv_last_updated: profile.cv_last_updated,
            parsed_cv_data: profile
                .parsed_cv_data
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?
                .unwrap_or_default(),
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        })
    }

    fn into_profile(self) -> Result<UserProfile> {
        Ok(UserProfile {
            user_id: self.user_id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            location: self.location,
            current_title: self.current_title,
            preferences: serde_json::from_str(&self.preferences)?,
            min_salary: self.min_salary,
            current_cv_path: self.current_cv_path,
            cv_last_updated: self.cv_last_updated,
            parsed_cv_data: if self.parsed_cv_data.is_empty() {
                None
            } else {
                Some(serde_json::from_str(&self.parsed_cv_data)?)
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn validate_profile(profile: &UserProfile) -> Result<()> {
    if profile.user_id.trim().is_empty() {
        return Err(Error::Storage("user_id must not be empty".into()));
    }
    if !email_regex().is_match(&profile.email) {
        return Err(Error::Storage(format!("invalid email: {}", profile.email)));
    }
    if profile.updated_at < profile.created_at {
        return Err(Error::Storage("updated_at precedes created_at".into()));
    }
    Ok(())
}

fn email_regex() -> &'static regex::Regex {
    static EMAIL: OnceLock<regex::Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        regex::Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles")
    })
}
