//! Grading defaults and their overrides.
//!
//! Effective values are layered: built-in constants, then the workspace
//! `grading.defaults` setting, then whatever a single request supplies. Each
//! layer is a [`GradingConfigPatch`] where only present keys apply.

use crate::calc::CalcError;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const DEFAULT_INTERNAL_OUT_OF: f64 = 30.0;
pub const DEFAULT_EXTERNAL_OUT_OF: f64 = 70.0;
pub const DEFAULT_PASS_PCT_EXTERNAL: f64 = 40.0;
pub const DEFAULT_PASS_PCT_TOTAL: f64 = 40.0;
pub const DEFAULT_GRACE_MARKS: f64 = 0.0;

pub const SETTINGS_KEY: &str = "grading.defaults";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingConfig {
    pub internal_out_of: f64,
    pub external_out_of: f64,
    pub pass_pct_external: f64,
    pub pass_pct_total: f64,
    pub grace_marks: f64,
    pub max_grace_marks: Option<f64>,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            internal_out_of: DEFAULT_INTERNAL_OUT_OF,
            external_out_of: DEFAULT_EXTERNAL_OUT_OF,
            pass_pct_external: DEFAULT_PASS_PCT_EXTERNAL,
            pass_pct_total: DEFAULT_PASS_PCT_TOTAL,
            grace_marks: DEFAULT_GRACE_MARKS,
            max_grace_marks: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GradingConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_out_of: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_out_of: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_pct_external: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_pct_total: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_marks: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_grace_marks: Option<f64>,
}

impl GradingConfigPatch {
    pub fn parse(raw: Option<&serde_json::Value>) -> Result<Self, CalcError> {
        let Some(raw) = raw else {
            return Ok(Self::default());
        };
        if raw.is_null() {
            return Ok(Self::default());
        }
        let patch: Self = serde_json::from_value(raw.clone())
            .map_err(|e| CalcError::new("bad_params", format!("invalid grading config: {}", e)))?;
        patch.validate()?;
        Ok(patch)
    }

    pub fn validate(&self) -> Result<(), CalcError> {
        for (key, v) in [
            ("internalOutOf", self.internal_out_of),
            ("externalOutOf", self.external_out_of),
        ] {
            if let Some(v) = v {
                if !v.is_finite() || v <= 0.0 {
                    return Err(CalcError::new("bad_params", format!("{} must be > 0", key))
                        .with_details(json!({ key: v })));
                }
            }
        }
        for (key, v) in [
            ("passPctExternal", self.pass_pct_external),
            ("passPctTotal", self.pass_pct_total),
        ] {
            if let Some(v) = v {
                if !(0.0..=100.0).contains(&v) {
                    return Err(CalcError::new("bad_params", format!("{} must be in 0..=100", key))
                        .with_details(json!({ key: v })));
                }
            }
        }
        for (key, v) in [
            ("graceMarks", self.grace_marks),
            ("maxGraceMarks", self.max_grace_marks),
        ] {
            if let Some(v) = v {
                if !v.is_finite() || v < 0.0 {
                    return Err(CalcError::new("bad_params", format!("{} must be >= 0", key))
                        .with_details(json!({ key: v })));
                }
            }
        }
        Ok(())
    }

    /// Later patch wins key by key.
    pub fn merged(&self, over: &GradingConfigPatch) -> GradingConfigPatch {
        GradingConfigPatch {
            internal_out_of: over.internal_out_of.or(self.internal_out_of),
            external_out_of: over.external_out_of.or(self.external_out_of),
            pass_pct_external: over.pass_pct_external.or(self.pass_pct_external),
            pass_pct_total: over.pass_pct_total.or(self.pass_pct_total),
            grace_marks: over.grace_marks.or(self.grace_marks),
            max_grace_marks: over.max_grace_marks.or(self.max_grace_marks),
        }
    }
}

impl GradingConfig {
    pub fn with_patch(mut self, patch: &GradingConfigPatch) -> Self {
        if let Some(v) = patch.internal_out_of {
            self.internal_out_of = v;
        }
        if let Some(v) = patch.external_out_of {
            self.external_out_of = v;
        }
        if let Some(v) = patch.pass_pct_external {
            self.pass_pct_external = v;
        }
        if let Some(v) = patch.pass_pct_total {
            self.pass_pct_total = v;
        }
        if let Some(v) = patch.grace_marks {
            self.grace_marks = v;
        }
        if patch.max_grace_marks.is_some() {
            self.max_grace_marks = patch.max_grace_marks;
        }
        self
    }

    pub fn max_total(&self) -> f64 {
        self.internal_out_of + self.external_out_of
    }
}
