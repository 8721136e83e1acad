//! Aggregate site counts for planning views.

use serde::Serialize;

use super::{BoundaryHit, NetworkGeneration};

/// Number of coverage sites, in total and per generation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GenerationCounts {
    pub sites: usize,
    #[serde(rename = "2G")]
    pub two_g: usize,
    #[serde(rename = "3G")]
    pub three_g: usize,
    #[serde(rename = "4G")]
    pub four_g: usize,
}

impl GenerationCounts {
    pub fn add(&mut self, generation: NetworkGeneration) {
        self.sites += 1;
        match generation {
            NetworkGeneration::TwoG => self.two_g += 1,
            NetworkGeneration::ThreeG => self.three_g += 1,
            NetworkGeneration::FourG => self.four_g += 1,
        }
    }

    pub fn get(&self, generation: NetworkGeneration) -> usize {
        match generation {
            NetworkGeneration::TwoG => self.two_g,
            NetworkGeneration::ThreeG => self.three_g,
            NetworkGeneration::FourG => self.four_g,
        }
    }
}

/// Sites whose position falls in one administrative unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundaryDensity {
    pub boundary: BoundaryHit,
    #[serde(flatten)]
    pub counts: GenerationCounts,
}

/// Sites whose position falls in one square grid cell. The cell spans
/// `min_lat..min_lat + size_deg` by `min_lon..min_lon + size_deg`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridCell {
    pub min_lat: f64,
    pub min_lon: f64,
    pub size_deg: f64,
    #[serde(flatten)]
    pub counts: GenerationCounts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_by_generation() {
        let mut counts = GenerationCounts::default();
        counts.add(NetworkGeneration::FourG);
        counts.add(NetworkGeneration::FourG);
        counts.add(NetworkGeneration::TwoG);

        assert_eq!(counts.sites, 3);
        assert_eq!(counts.get(NetworkGeneration::FourG), 2);
        assert_eq!(counts.get(NetworkGeneration::ThreeG), 0);
    }

    #[test]
    fn test_density_serializes_flat() {
        let mut counts = GenerationCounts::default();
        counts.add(NetworkGeneration::ThreeG);
        let density = BoundaryDensity {
            boundary: BoundaryHit {
                name: "Oyo".to_string(),
                code: None,
            },
            counts,
        };

        let json = serde_json::to_value(&density).unwrap();
        assert_eq!(json["boundary"]["name"], "Oyo");
        assert_eq!(json["sites"], 1);
        assert_eq!(json["3G"], 1);
        assert_eq!(json["4G"], 0);
    }
}
