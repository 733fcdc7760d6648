// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Wishbox-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Wishbox and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::{Wish, WishCategory, WishPriority};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct MakeWishParams {
    /// What you wish for.
    pub message: String,
    /// Kind of wish; defaults to `magic`.
    #[serde(default)]
    pub category: WishCategory,
    /// How much it matters; defaults to `hopeful wish`.
    #[serde(default)]
    pub priority: WishPriority,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GrantWishParams {
    /// Part of the wish text; the first wish containing it (case-insensitive) is granted.
    pub wish_text: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReleaseWishParams {
    /// Part of the wish text; the first wish containing it (case-insensitive) is released.
    pub wish_text: String,
}

/// Data rendered by the `wish-box` widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishBoxPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub wish: String,
    pub category: WishCategory,
    pub priority: WishPriority,
    pub timestamp: DateTime<Utc>,
    pub granted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granted_at: Option<DateTime<Utc>>,
}

impl WishBoxPayload {
    /// Preview of a wish that was never stored: no id, default category and priority.
    pub fn preview(message: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            wish: message.into(),
            category: WishCategory::default(),
            priority: WishPriority::default(),
            timestamp: now,
            granted: false,
            granted_at: None,
        }
    }
}

impl From<&Wish> for WishBoxPayload {
    fn from(wish: &Wish) -> Self {
        Self {
            id: Some(wish.id().to_string()),
            wish: wish.text().to_owned(),
            category: wish.category(),
            priority: wish.priority(),
            timestamp: wish.created_at(),
            granted: wish.granted(),
            granted_at: wish.granted_at(),
        }
    }
}

/// Data rendered by the `wish-list` widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishListPayload {
    pub wishes: Vec<WishBoxPayload>,
}

impl WishListPayload {
    pub fn from_wishes(wishes: &[Wish]) -> Self {
        Self {
            wishes: wishes.iter().map(WishBoxPayload::from).collect(),
        }
    }
}
