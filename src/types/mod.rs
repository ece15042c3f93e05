// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Strong types for type safety across geocache.
//!
//! This module provides newtype wrappers for various domain concepts:
//! - Cache metadata (expiry timestamps, write sequences, TTLs)
//! - Geospatial points, distance units and proximity results

pub mod cache;
pub mod geo;

// Note: Public types are re-exported from lib.rs, not here
