//! Error kinds surfaced by loading and querying.

use std::fmt;

use thiserror::Error;

use crate::crs::CrsError;

/// Which input a load or schema error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    Coverage,
    Boundaries,
    Sites,
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dataset::Coverage => write!(f, "coverage"),
            Dataset::Boundaries => write!(f, "boundary"),
            Dataset::Sites => write!(f, "site"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CoverageError {
    /// A source is missing, unreadable, corrupt, empty, or in a CRS that
    /// cannot be reprojected. Fatal at startup.
    #[error("failed to load {dataset} dataset from {source_name}: {reason}")]
    DataLoad {
        dataset: Dataset,
        source_name: String,
        reason: String,
    },

    /// A feature or CSV header lacks a required attribute, or carries a value
    /// that cannot be interpreted. Fatal at startup.
    #[error("{dataset} dataset record {record}: missing or invalid attribute `{attribute}`")]
    Schema {
        dataset: Dataset,
        attribute: String,
        record: usize,
    },

    /// A query coordinate is unusable. Only the one query is rejected.
    #[error("invalid coordinate (lat {lat}, lon {lon}): {reason}")]
    InvalidCoordinate { lat: f64, lon: f64, reason: String },

    /// A numeric argument such as a buffer radius or grid cell size is
    /// unusable.
    #[error("invalid {name} {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: String,
    },
}

impl CoverageError {
    pub fn data_load(dataset: Dataset, source_name: impl Into<String>, reason: impl fmt::Display) -> Self {
        CoverageError::DataLoad {
            dataset,
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn schema(dataset: Dataset, attribute: impl Into<String>, record: usize) -> Self {
        CoverageError::Schema {
            dataset,
            attribute: attribute.into(),
            record,
        }
    }

    pub fn invalid_coordinate(lat: f64, lon: f64, reason: impl fmt::Display) -> Self {
        CoverageError::InvalidCoordinate {
            lat,
            lon,
            reason: reason.to_string(),
        }
    }

    pub fn invalid_parameter(name: &'static str, value: f64, reason: impl fmt::Display) -> Self {
        CoverageError::InvalidParameter {
            name,
            value,
            reason: reason.to_string(),
        }
    }

    /// Reprojection failure while loading a dataset
    pub fn from_crs(dataset: Dataset, source_name: &str, err: CrsError) -> Self {
        Self::data_load(dataset, source_name, err)
    }

    /// True for errors scoped to a single query
    pub fn is_query_error(&self) -> bool {
        matches!(
            self,
            CoverageError::InvalidCoordinate { .. } | CoverageError::InvalidParameter { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CoverageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_dataset() {
        let err = CoverageError::data_load(Dataset::Coverage, "cov.geojson", "no such file");
        assert_eq!(
            err.to_string(),
            "failed to load coverage dataset from cov.geojson: no such file"
        );

        let err = CoverageError::schema(Dataset::Coverage, "generation", 3);
        assert!(err.to_string().contains("`generation`"));
        assert!(!err.is_query_error());
    }

    #[test]
    fn test_invalid_coordinate_is_query_scoped() {
        let err = CoverageError::invalid_coordinate(91.0, 0.0, "latitude out of range");
        assert!(err.is_query_error());

        let err = CoverageError::invalid_parameter("buffer radius", -1.0, "must be positive");
        assert!(err.is_query_error());
        assert_eq!(err.to_string(), "invalid buffer radius -1: must be positive");
    }
}
