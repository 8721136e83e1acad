//! R-tree spatial index over polygon records.

use geo::{Intersects, Point};
use rstar::{RTree, RTreeObject, AABB};
use std::sync::Arc;

use crate::models::Footprint;

/// Wrapper for R-tree indexing of a polygon record
pub struct IndexedGeometry<T> {
    /// Position in the source dataset, used for stable ordering
    pub ordinal: usize,
    pub item: Arc<T>,
    envelope: AABB<[f64; 2]>,
}

impl<T> RTreeObject for IndexedGeometry<T> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl<T: Footprint> IndexedGeometry<T> {
    pub fn new(ordinal: usize, item: T) -> Option<Self> {
        let (min_x, min_y, max_x, max_y) = item.bbox()?;
        Some(Self {
            ordinal,
            item: Arc::new(item),
            envelope: AABB::from_corners([min_x, min_y], [max_x, max_y]),
        })
    }
}

/// Spatial index answering boundary-inclusive point-in-polygon queries
pub struct PolygonIndex<T> {
    tree: RTree<IndexedGeometry<T>>,
    /// Records in dataset order
    ordered: Vec<Arc<T>>,
}

impl<T: Footprint> PolygonIndex<T> {
    /// Build from records in dataset order. Records without a bounding box
    /// (empty geometry) are dropped, so ordinals are positions among the
    /// records kept.
    pub fn build(items: Vec<T>) -> Self {
        let indexed: Vec<IndexedGeometry<T>> = items
            .into_iter()
            .filter(|item| item.bbox().is_some())
            .enumerate()
            .filter_map(|(ordinal, item)| IndexedGeometry::new(ordinal, item))
            .collect();

        let ordered = indexed.iter().map(|ig| Arc::clone(&ig.item)).collect();
        let tree = RTree::bulk_load(indexed);

        Self { tree, ordered }
    }

    fn candidates(&self, lon: f64, lat: f64) -> Vec<&IndexedGeometry<T>> {
        let point = Point::new(lon, lat);
        let query_envelope = AABB::from_point([lon, lat]);

        // Envelope hits first, then exact test; a point on an edge intersects
        let mut hits: Vec<&IndexedGeometry<T>> = self
            .tree
            .locate_in_envelope_intersecting(&query_envelope)
            .filter(|ig| ig.item.geometry().intersects(&point))
            .collect();
        hits.sort_by_key(|ig| ig.ordinal);
        hits
    }

    /// All records containing the point, in dataset order
    pub fn lookup(&self, lon: f64, lat: f64) -> Vec<Arc<T>> {
        self.candidates(lon, lat)
            .into_iter()
            .map(|ig| Arc::clone(&ig.item))
            .collect()
    }

    /// The earliest record in dataset order containing the point
    pub fn first(&self, lon: f64, lat: f64) -> Option<Arc<T>> {
        self.candidates(lon, lat)
            .first()
            .map(|ig| Arc::clone(&ig.item))
    }

    /// Position of the earliest record containing the point
    pub fn first_position(&self, lon: f64, lat: f64) -> Option<usize> {
        self.candidates(lon, lat).first().map(|ig| ig.ordinal)
    }

    /// Record at a position of [`PolygonIndex::iter`]
    pub fn get(&self, position: usize) -> Option<&Arc<T>> {
        self.ordered.get(position)
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Iterate over all records in dataset order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<T>> {
        self.ordered.iter()
    }
}
