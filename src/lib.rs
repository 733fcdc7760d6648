// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Wishbox-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Wishbox and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Winter Fairy Wishbox: an MCP server whose tool results render as MCP-UI widgets.

pub mod app;
pub mod config;
pub mod http;
pub mod logging;
pub mod mcp;
pub mod model;
pub mod session;
pub mod store;
