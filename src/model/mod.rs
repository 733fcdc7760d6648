// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Wishbox-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Wishbox and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Core data model.
//!
//! Sessions are identified by opaque ids and own an ordered list of wishes.

pub mod ids;
pub mod wish;

pub use ids::{Id, IdError, SessionId, WishId};
pub use wish::{Wish, WishCategory, WishError, WishPriority, WishQuery};
