// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Wishbox-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Wishbox and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Per-session wish storage.
//!
//! `WishStore` keeps every session's wishes in memory; `WishFile` optionally snapshots them to a
//! flat JSON file that is read back on startup.

pub mod snapshot;
pub mod wish_store;

pub use snapshot::{StoreError, WishFile, WishPersistence, WishSnapshot, WriteDurability};
pub use wish_store::WishStore;
