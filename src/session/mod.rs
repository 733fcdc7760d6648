// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Wishbox-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Wishbox and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Live protocol sessions. The table owns each session's streamable-HTTP handle and serves as
//! rmcp's session manager.

mod manager;
pub mod table;

pub use table::{Session, SessionTable};

/// Header carrying the session token on every request after the first.
pub const SESSION_HEADER: &str = "mcp-session-id";
