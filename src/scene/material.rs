//! Sound transmission through surfaces, in three bands (400 Hz, 2.5 kHz, 15 kHz).

use crate::error::{CueSonicError, Result};

/// How much sound a surface lets through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceMaterial {
    /// Fraction of energy transmitted at [low, mid, high] frequencies (0.0 - 1.0)
    pub transmission: [f32; 3],
}

impl SurfaceMaterial {
    pub const GENERIC: Self = Self::new([0.100, 0.050, 0.030]);
    pub const BRICK: Self = Self::new([0.015, 0.015, 0.015]);
    pub const CONCRETE: Self = Self::new([0.015, 0.002, 0.001]);
    pub const GLASS: Self = Self::new([0.060, 0.044, 0.011]);
    pub const PLASTER: Self = Self::new([0.056, 0.056, 0.004]);
    pub const WOOD: Self = Self::new([0.070, 0.014, 0.005]);
    pub const METAL: Self = Self::new([0.200, 0.025, 0.010]);
    pub const ROCK: Self = Self::new([0.015, 0.002, 0.001]);
    /// Foliage, cloth, railings: barely blocks anything
    pub const OPEN: Self = Self::new([0.9, 0.8, 0.7]);

    pub const fn new(transmission: [f32; 3]) -> Self {
        Self { transmission }
    }

    /// Broadband average of the three bands.
    pub fn mean_transmission(&self) -> f32 {
        self.transmission.iter().sum::<f32>() / 3.0
    }

    pub fn validate(&self) -> Result<()> {
        if self
            .transmission
            .iter()
            .all(|t| (0.0..=1.0).contains(t))
        {
            Ok(())
        } else {
            Err(CueSonicError::Configuration(
                "Transmission values must be between 0.0 and 1.0".to_string(),
            ))
        }
    }
}

impl Default for SurfaceMaterial {
    fn default() -> Self {
        Self::GENERIC
    }
}

/// Maps the `material_index` of a [`RayHit`](super::RayHit) to a surface.
#[derive(Debug, Clone, Default)]
pub struct MaterialTable {
    materials: Vec<SurfaceMaterial>,
}

impl MaterialTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table pre-loaded with the presets, in declaration order (GENERIC = 0 .. OPEN = 8).
    pub fn with_presets() -> Self {
        Self {
            materials: vec![
                SurfaceMaterial::GENERIC,
                SurfaceMaterial::BRICK,
                SurfaceMaterial::CONCRETE,
                SurfaceMaterial::GLASS,
                SurfaceMaterial::PLASTER,
                SurfaceMaterial::WOOD,
                SurfaceMaterial::METAL,
                SurfaceMaterial::ROCK,
                SurfaceMaterial::OPEN,
            ],
        }
    }

    /// Adds a material and returns its index.
    pub fn add(&mut self, material: SurfaceMaterial) -> Result<u8> {
        material.validate()?;
        if self.materials.len() > u8::MAX as usize {
            return Err(CueSonicError::Configuration(
                "Material table is full (max 256 materials)".to_string(),
            ));
        }
        let index = self.materials.len() as u8;
        self.materials.push(material);
        Ok(index)
    }

    pub fn get(&self, index: u8) -> Option<&SurfaceMaterial> {
        self.materials.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_validation() {
        assert!(SurfaceMaterial::CONCRETE.validate().is_ok());
        assert!(SurfaceMaterial::new([0.5, 1.5, 0.3]).validate().is_err());
    }

    #[test]
    fn test_material_table() {
        let mut table = MaterialTable::new();
        assert!(table.is_empty());
        let wall = table.add(SurfaceMaterial::CONCRETE).unwrap();
        let door = table.add(SurfaceMaterial::WOOD).unwrap();
        assert_eq!((wall, door), (0, 1));
        assert_eq!(table.get(door), Some(&SurfaceMaterial::WOOD));
        assert_eq!(table.get(99), None);
        assert!(table.add(SurfaceMaterial::new([2.0, 0.0, 0.0])).is_err());
    }

    #[test]
    fn test_presets() {
        let table = MaterialTable::with_presets();
        assert_eq!(table.len(), 9);
        assert_eq!(table.get(2), Some(&SurfaceMaterial::CONCRETE));
        assert!(SurfaceMaterial::OPEN.mean_transmission() > SurfaceMaterial::BRICK.mean_transmission());
    }
}
