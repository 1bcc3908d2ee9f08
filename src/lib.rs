//! Marks and grading pipeline for a university ERP: internal-assessment
//! aggregation, external-mark scaling, pass/detain evaluation, letter grades
//! and SGPA/CGPA accumulation.
//!
//! The calc modules are pure functions of their inputs. [`ipc`] wraps them in
//! a newline-delimited JSON sidecar that can also read inputs from a SQLite
//! workspace.

pub mod calc;
pub mod config;
pub mod db;
pub mod external;
pub mod gpa;
pub mod grading_scale;
pub mod internal;
pub mod ipc;
pub mod logging;
pub mod store;
pub mod total;
