//! `plugins.model.settings` — currently empty, reserved for per-deployment
//! tuning (e.g. a future default page size override).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelCatalogSettings {}
