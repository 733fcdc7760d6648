// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Wishbox-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Wishbox and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ids::WishId;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum WishCategory {
    Toy,
    Experience,
    Kindness,
    #[default]
    Magic,
}

impl WishCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Toy => "toy",
            Self::Experience => "experience",
            Self::Kindness => "kindness",
            Self::Magic => "magic",
        }
    }
}

impl fmt::Display for WishCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much the wisher wants it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
pub enum WishPriority {
    #[serde(rename = "dream wish")]
    Dream,
    #[default]
    #[serde(rename = "hopeful wish")]
    Hopeful,
    #[serde(rename = "small wish")]
    Small,
}

impl WishPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dream => "dream wish",
            Self::Hopeful => "hopeful wish",
            Self::Small => "small wish",
        }
    }
}

impl fmt::Display for WishPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WishError {
    #[error("Wish cannot be empty")]
    EmptyText,
}

/// A wish stored in one session's partition.
///
/// `granted`/`granted_at` are the only fields that change after creation. The serialized field
/// names (`wish`, `timestamp`, `grantedAt`) are the persisted file layout and the widget payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wish {
    id: WishId,
    #[serde(rename = "wish")]
    text: String,
    category: WishCategory,
    priority: WishPriority,
    #[serde(rename = "timestamp")]
    created_at: DateTime<Utc>,
    #[serde(default)]
    granted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    granted_at: Option<DateTime<Utc>>,
}

impl Wish {
    pub fn new(
        text: impl Into<String>,
        category: WishCategory,
        priority: WishPriority,
        created_at: DateTime<Utc>,
    ) -> Result<Self, WishError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(WishError::EmptyText);
        }

        Ok(Self {
            id: WishId::generate(),
            text,
            category,
            priority,
            created_at,
            granted: false,
            granted_at: None,
        })
    }

    pub fn id(&self) -> &WishId {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn category(&self) -> WishCategory {
        self.category
    }

    pub fn priority(&self) -> WishPriority {
        self.priority
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn granted(&self) -> bool {
        self.granted
    }

    pub fn granted_at(&self) -> Option<DateTime<Utc>> {
        self.granted_at
    }

    /// Marks the wish as granted. Granting again only moves `granted_at`.
    pub fn grant(&mut self, at: DateTime<Utc>) {
        self.granted = true;
        self.granted_at = Some(at);
    }
}

/// Case-insensitive substring lookup used by `grant_wish` and `release_wish`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WishQuery {
    needle: String,
}

impl WishQuery {
    pub fn new(text: &str) -> Result<Self, WishError> {
        if text.trim().is_empty() {
            return Err(WishError::EmptyText);
        }
        Ok(Self {
            needle: text.to_lowercase(),
        })
    }

    pub fn matches(&self, wish: &Wish) -> bool {
        wish.text.to_lowercase().contains(&self.needle)
    }
}
