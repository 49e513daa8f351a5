// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Veriscan Store — persistent scan preferences backed by SQLite.

pub mod prefs;

pub use prefs::{PrefsStore, ScanPrefs};
