// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! In-process grid index
//!
//! Points are bucketed into cells of `cell_size` degrees on each side. A
//! radius query derives the latitude/longitude bounding box of the search
//! circle, enumerates the cells it overlaps and measures great-circle distance
//! only to members of those cells.
//!
//! # Bounding box
//!
//! For an angular radius `d` around latitude `φ`, the latitude bounds are
//! `φ ± d` and the longitude half-width is `asin(sin d / cos φ)`. When the
//! latitude bounds reach a pole, the box spans every longitude. A box that
//! crosses the antimeridian is split into two longitude intervals.
//!
//! # Fallback
//!
//! When the box covers more cells than are currently occupied (huge radii,
//! polar caps, sparse indexes), the query walks the occupied cells instead.
//! That scan is linear in the number of occupied cells, not in the number of
//! points within them.
//!
//! # Locking
//!
//! `points` and `cells` are separate `DashMap`s. Writers hold the entry lock
//! of the point's id in `points` for the whole update and only then touch
//! `cells`. Readers copy ids out of a cell and release it before looking up
//! points, so they never wait on `points` while holding `cells`.
//!
//! A point that changes cells is added to its new cell before it leaves the
//! old one, and the `moves` counter is bumped in between. A reader walking
//! the cells one at a time can still visit the new cell too early and the old
//! one too late, so it compares `moves` before and after collecting and
//! collects again if a move overlapped. After `COLLECT_ATTEMPTS` overlapping
//! passes it takes `move_gate` exclusively, which holds off cross-cell moves
//! for one final pass.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use std::f64::consts::FRAC_PI_2;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, Instrument};

use super::{check_radius, finish_results, ProximityIndex};
use crate::config::constants::DEFAULT_CELL_SIZE_DEGREES;
use crate::errors::ProximityError;
use crate::tracing::spans;
use crate::types::geo::{GeoPoint, ProximityResult, RadiusQuery, EARTH_RADIUS_METERS};

/// Row (latitude) and column (longitude) of a grid cell
type CellId = (i32, i32);

/// Relative slack added to the search box so points exactly on the radius
/// are not lost to rounding
const BOX_SLACK: f64 = 1e-9;

/// Inclusive range of column indexes
type ColumnRange = (i32, i32);

/// Optimistic candidate passes before a query blocks cross-cell moves
const COLLECT_ATTEMPTS: usize = 4;

/// In-process proximity index over a latitude/longitude grid
///
/// # Examples
///
/// ```rust
/// use geocache::GridIndex;
///
/// // 1 degree cells, permissive coordinates
/// let index = GridIndex::new();
///
/// // Finer cells for dense city-level data, rejecting out-of-range points
/// let index = GridIndex::with_cell_size(0.25).strict();
/// ```
#[derive(Debug)]
pub struct GridIndex {
    points: DashMap<String, GeoPoint>,
    cells: DashMap<CellId, HashSet<String>>,
    /// Count of cross-cell moves, bumped while the point is in both cells
    moves: AtomicU64,
    /// Shared by moving writers, exclusive for a query's last pass
    move_gate: RwLock<()>,
    cell_size: f64,
    rows: i32,
    columns: i32,
    strict: bool,
}

impl Default for GridIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl GridIndex {
    /// Creates an index with 1 degree cells
    pub fn new() -> Self {
        Self::with_cell_size(DEFAULT_CELL_SIZE_DEGREES)
    }

    /// Creates an index with `cell_size_degrees` cells
    ///
    /// Values outside `(0, 180]` fall back to the default cell size.
    pub fn with_cell_size(cell_size_degrees: f64) -> Self {
        let cell_size = if cell_size_degrees.is_finite()
            && cell_size_degrees > 0.0
            && cell_size_degrees <= 180.0
        {
            cell_size_degrees
        } else {
            DEFAULT_CELL_SIZE_DEGREES
        };

        Self {
            points: DashMap::new(),
            cells: DashMap::new(),
            moves: AtomicU64::new(0),
            move_gate: RwLock::new(()),
            cell_size,
            rows: (180.0 / cell_size).ceil() as i32,
            columns: (360.0 / cell_size).ceil() as i32,
            strict: false,
        }
    }

    /// Rejects points outside -180..=180 longitude or -90..=90 latitude
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Edge length of a cell, in degrees
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Returns the stored coordinates of `id`
    pub fn get(&self, id: &str) -> Option<GeoPoint> {
        self.points.get(id).map(|point| point.clone())
    }

    fn row_of(&self, latitude: f64) -> i32 {
        let row = ((latitude.clamp(-90.0, 90.0) + 90.0) / self.cell_size).floor() as i32;
        row.clamp(0, self.rows - 1)
    }

    fn column_of(&self, longitude: f64) -> i32 {
        let column = ((normalize_longitude(longitude) + 180.0) / self.cell_size).floor() as i32;
        column.clamp(0, self.columns - 1)
    }

    fn cell_of(&self, longitude: f64, latitude: f64) -> CellId {
        (self.row_of(latitude), self.column_of(longitude))
    }

    fn add_to_cell(&self, cell: CellId, id: &str) {
        self.cells.entry(cell).or_default().insert(id.to_string());
    }

    fn remove_from_cell(&self, cell: CellId, id: &str) {
        if let Some(mut members) = self.cells.get_mut(&cell) {
            members.remove(id);
        }
        self.cells.remove_if(&cell, |_, members| members.is_empty());
    }

    fn move_between_cells(&self, from: CellId, to: CellId, id: &str) {
        let _moving = self.move_gate.read().unwrap_or_else(PoisonError::into_inner);
        self.add_to_cell(to, id);
        self.moves.fetch_add(1, Ordering::AcqRel);
        self.remove_from_cell(from, id);
    }

    fn insert_point(&self, point: GeoPoint) -> Result<bool, ProximityError> {
        if self.strict && !point.is_in_range() {
            return Err(ProximityError::InvalidCoordinate {
                id: point.id,
                longitude: point.longitude,
                latitude: point.latitude,
            });
        }

        let cell = self.cell_of(point.longitude, point.latitude);

        match self.points.entry(point.id.clone()) {
            Entry::Occupied(mut existing) => {
                let previous = existing.get();
                let previous_cell = self.cell_of(previous.longitude, previous.latitude);
                if previous_cell != cell {
                    self.move_between_cells(previous_cell, cell, &point.id);
                }
                debug!(id = %point.id, "Replacing indexed point");
                existing.insert(point);
            }
            Entry::Vacant(vacant) => {
                self.add_to_cell(cell, &point.id);
                debug!(id = %point.id, "Indexing new point");
                vacant.insert(point);
            }
        }

        Ok(true)
    }

    fn remove_point(&self, id: &str) -> bool {
        match self.points.entry(id.to_string()) {
            Entry::Occupied(existing) => {
                let point = existing.get();
                let cell = self.cell_of(point.longitude, point.latitude);
                self.remove_from_cell(cell, id);
                existing.remove();
                true
            }
            Entry::Vacant(_) => false,
        }
    }

    /// Ids in every cell the search box of `query` overlaps
    ///
    /// May include ids that have since moved away; callers re-check distance.
    fn candidates(&self, query: &RadiusQuery) -> HashSet<String> {
        let angular =
            (query.radius_meters() / EARTH_RADIUS_METERS) * (1.0 + BOX_SLACK) + BOX_SLACK;
        let (rows, columns) = self.search_box(query.longitude, query.latitude, angular);

        let mut ids = HashSet::new();
        for _ in 0..COLLECT_ATTEMPTS {
            let before = self.moves.load(Ordering::Acquire);
            self.collect(rows, &columns, &mut ids);
            if self.moves.load(Ordering::Acquire) == before {
                return ids;
            }
        }

        debug!("Points moved during every pass, collecting with moves held off");
        let _exclusive = self.move_gate.write().unwrap_or_else(PoisonError::into_inner);
        self.collect(rows, &columns, &mut ids);
        ids
    }

    /// Adds the members of every cell in the box to `ids`
    fn collect(&self, rows: (i32, i32), columns: &[ColumnRange], ids: &mut HashSet<String>) {
        let box_cells: i64 = i64::from(rows.1 - rows.0 + 1)
            * columns
                .iter()
                .map(|(lo, hi)| i64::from(hi - lo + 1))
                .sum::<i64>();

        if box_cells > self.cells.len() as i64 {
            debug!(
                box_cells,
                occupied = self.cells.len(),
                "Search box exceeds occupied cells, scanning occupied cells"
            );
            for cell in self.cells.iter() {
                let (row, column) = *cell.key();
                let in_rows = row >= rows.0 && row <= rows.1;
                let in_columns = columns.iter().any(|(lo, hi)| column >= *lo && column <= *hi);
                if in_rows && in_columns {
                    ids.extend(cell.value().iter().cloned());
                }
            }
        } else {
            for row in rows.0..=rows.1 {
                for (lo, hi) in columns {
                    for column in *lo..=*hi {
                        if let Some(members) = self.cells.get(&(row, column)) {
                            ids.extend(members.iter().cloned());
                        }
                    }
                }
            }
        }
    }

    /// Row range and column ranges covering a circle of `angular` radians
    fn search_box(
        &self,
        longitude: f64,
        latitude: f64,
        angular: f64,
    ) -> ((i32, i32), Vec<ColumnRange>) {
        let all_columns = vec![(0, self.columns - 1)];
        let lat = latitude.clamp(-90.0, 90.0).to_radians();

        let min_lat = lat - angular;
        let max_lat = lat + angular;
        if min_lat <= -FRAC_PI_2 || max_lat >= FRAC_PI_2 {
            // The circle contains a pole: every longitude is in range
            let rows = (
                self.row_of(min_lat.max(-FRAC_PI_2).to_degrees()),
                self.row_of(max_lat.min(FRAC_PI_2).to_degrees()),
            );
            return (rows, all_columns);
        }

        let rows = (self.row_of(min_lat.to_degrees()), self.row_of(max_lat.to_degrees()));

        let ratio = angular.sin() / lat.cos();
        if ratio >= 1.0 {
            return (rows, all_columns);
        }
        let half_width = ratio.asin().to_degrees();
        if half_width >= 180.0 {
            return (rows, all_columns);
        }

        let center = normalize_longitude(longitude);
        let min_lon = center - half_width;
        let max_lon = center + half_width;

        let columns = if min_lon < -180.0 {
            vec![
                (self.column_of(min_lon + 360.0), self.columns - 1),
                (0, self.column_of(max_lon)),
            ]
        } else if max_lon >= 180.0 {
            vec![
                (self.column_of(min_lon), self.columns - 1),
                (0, self.column_of(max_lon - 360.0)),
            ]
        } else {
            vec![(self.column_of(min_lon), self.column_of(max_lon))]
        };

        (rows, columns)
    }

    fn query(&self, query: &RadiusQuery) -> Result<Vec<ProximityResult>, ProximityError> {
        check_radius(query)?;
        if !(query.longitude.is_finite() && query.latitude.is_finite()) {
            return Ok(Vec::new());
        }

        let radius_meters = query.radius_meters();
        let candidates = self.candidates(query);
        let scanned = candidates.len();

        let results: Vec<ProximityResult> = candidates
            .into_iter()
            .filter_map(|id| {
                let point = self.points.get(&id)?;
                let meters = point.distance_meters_to(query.longitude, query.latitude);
                drop(point);
                (meters <= radius_meters).then(|| ProximityResult {
                    id,
                    distance: query.unit.from_meters(meters),
                })
            })
            .collect();

        let results = finish_results(results, query.max_results);
        debug!(scanned, found = results.len(), "Radius query complete");
        Ok(results)
    }
}

/// Maps any longitude into `[-180, 180)`
fn normalize_longitude(longitude: f64) -> f64 {
    (longitude + 180.0).rem_euclid(360.0) - 180.0
}

#[async_trait]
impl ProximityIndex for GridIndex {
    async fn insert(&self, point: GeoPoint) -> Result<bool, ProximityError> {
        self.insert_point(point)
    }

    async fn radius_query(
        &self,
        query: &RadiusQuery,
    ) -> Result<Vec<ProximityResult>, ProximityError> {
        let span = spans::radius_query(query, self.name());
        async { self.query(query) }.instrument(span).await
    }

    async fn remove(&self, id: &str) -> bool {
        self.remove_point(id)
    }

    async fn len(&self) -> usize {
        self.points.len()
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "GridIndex"
    }
}
