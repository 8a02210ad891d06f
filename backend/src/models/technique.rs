//! Technique catalog.
//!
//! Short analysis codes (`XRF`, `RAMAN`, ...) mapped to their French and
//! English names. The catalog is process-wide and can be extended at runtime.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

use crate::api::logs::log_success;
use crate::error::CatalogError;

/// One analysis technique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechniqueOption {
    pub code: String,
    #[serde(default)]
    pub french_name: String,
    #[serde(default)]
    pub english_name: String,
}

impl TechniqueOption {
    pub fn new(code: impl Into<String>, french_name: impl Into<String>, english_name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            french_name: french_name.into(),
            english_name: english_name.into(),
        }
    }
}

const BUILTIN: &[(&str, &str, &str)] = &[
    ("3D", "Imagerie 3D", "3D Imaging"),
    ("3D-LG", "Imagerie 3D – Lasergrammétrie", "3D Imaging – Laser Scanning"),
    ("3D-LS", "Imagerie 3D – Lumière structurée", "3D Imaging – Structured Light"),
    ("3D-PG", "Imagerie 3D – Photogrammétrie", "3D Imaging – Photogrammetry"),
    ("3D-VG", "Imagerie 3D – Vidéogrammétrie", "3D Imaging – Videogrammetry"),
    ("BINO", "Imagerie par loupe binoculaire", "Binocular Magnifier Imaging"),
    ("CE", "Electrophorèse capillaire", "Capillary Electrophoresis"),
    ("CE-MS", "Electrophorèse capillaire couplée à la spectrométrie de masse", "Capillary Electrophoresis coupled with Mass Spectrometry"),
    ("COLOR", "Colorimétrie | spectro-colorimétrie", "Colorimetry | spectrocolorimetry"),
    ("CR", "Compte-rendu", "Report"),
    ("DSC", "Calorimétrie différentielle à balayage", "Differential Scanning Calorimetry"),
    ("DVS", "Sorption dynamique de vapeur", "Dynamic Vapor Sorption"),
    ("FORS", "Fiber optical reflectance spectroscopy", "Fiber Optical Reflectance Spectroscopy"),
    ("GC-MS", "Chromatographie en phase gazeuse couplée à la spectrométrie de masse", "Gas Chromatography-Mass Spectrometry"),
    ("GC-2D-MS", "Chromatographie en phase gazeuse à 2 dimensions couplée à la spectrométrie de masse", "Two-Dimensional Gas Chromatography-Mass Spectrometry"),
    ("IR", "Photographie infrarouge", "Infrared Photography"),
    ("IRFC", "Image fausse couleur avec photographie infrarouge", "False Color Image with Infrared Photography"),
    ("IRTF", "Spectroscopie infrarouge à transformée de Fourier", "Fourier Transform Infrared Spectroscopy"),
    ("IRTF-ATR", "Spectroscopie infrarouge à transformée de Fourier - mode réflectance", "Fourier Transform Infrared Spectroscopy – reflectance"),
    ("LC-MS", "Chromatographie en phase liquide couplée à la spectrométrie de masse", "Liquid Chromatography-Mass Spectrometry"),
    ("MALDI-MS", "Spectromètre de masse couplée à une source d'ionisation laser assistée par une matrice", "Matrix-Assisted Laser Desorption/Ionization Mass Spectrometry"),
    ("MEB", "Microscopie électronique à balayage", "Scanning Electron Microscopy"),
    ("MECA", "Essais mécaniques", "Mechanical Testing"),
    ("MFT", "Microfading tester", "Microfading Tester"),
    ("MO", "Microscopie optique", "Optical Microscopy"),
    ("MPM", "Multiphoton microscopy", "Multiphoton Microscopy"),
    ("pH", "Tests de pH", "pH Testing"),
    ("PTR-MS", "Spectrométrie de masse par transfert de charge protonique", "Proton-Transfer-Reaction Mass Spectrometry"),
    ("RAMAN", "Spectroscopie Raman", "Raman Spectroscopy"),
    ("REFL", "Spectrophotométrie de réflectance", "Reflectance Spectrophotometry"),
    ("RIR", "Réflectographie infrarouge", "Infrared Reflectography"),
    ("RIS", "Imagerie de réflectance hyperspectrale", "Hyperspectral Reflectance Imaging"),
    ("RIS-SWIR", "Imagerie de réflectance hyperspectrale – domaine infrarouge", "Hyperspectral Reflectance Imaging – Short-Wave Infrared domain"),
    ("RIS-VNIR", "Imagerie de réflectance hyperspectrale – domaine visible", "Hyperspectral Reflectance Imaging –Visible and Near-Infrared domain"),
    ("RTI", "Reflectance Transformation Imaging", "Reflectance Transformation Imaging"),
    ("RX", "Radiographies X", "X-ray Radiography"),
    ("SEC", "Chromatographie d'exclusion stérique", "Size-Exclusion Chromatography"),
    ("TOMO", "Tomographie X", "X-ray Tomography"),
    ("TRANS", "Spectrophotométrie de transmittance", "Transmittance Spectrophotometry"),
    ("UVF", "Photographie de fluorescence UV", "UV Fluorescence Photography"),
    ("UVFC", "Image fausse couleur avec photographie UVR", "False Color Image with UV Reflectance Photography"),
    ("UVR", "Photographie de réflectance UV", "UV Reflectance Photography"),
    ("VIS", "Photographie RGB", "RGB Photography"),
    ("VIS-LD", "Photographie RGB – Lumière directe", "RGB Photography – Direct Light"),
    ("VIS-LR", "Photographie RGB – Lumière rasante", "RGB Photography – Raking Light"),
    ("VIS-LT", "Photographie RGB – Lumière transmise", "RGB Photography – Transmitted Light"),
    ("VIS-MP", "Photographie RGB – Macrophotographie", "RGB Photography – Macrophotography"),
    ("VIS-OL", "Photographie RGB – Open light", "RGB Photography – Open Light"),
    ("XRD", "Diffraction des rayons X", "X-ray Diffraction"),
    ("XRF", "Spectroscopie de fluorescence des rayons X", "X-ray Fluorescence Spectroscopy"),
];

static CATALOG: Lazy<RwLock<IndexMap<String, TechniqueOption>>> = Lazy::new(|| {
    let catalog = BUILTIN
        .iter()
        .map(|(code, fr, en)| (code.to_string(), TechniqueOption::new(*code, *fr, *en)))
        .collect();
    RwLock::new(catalog)
});

/// All techniques, built-in first, then runtime additions.
pub fn techniques() -> Vec<TechniqueOption> {
    let catalog = CATALOG.read().unwrap_or_else(|e| e.into_inner());
    catalog.values().cloned().collect()
}

/// Look up a technique by code.
pub fn technique(code: &str) -> Option<TechniqueOption> {
    let catalog = CATALOG.read().unwrap_or_else(|e| e.into_inner());
    catalog.get(code).cloned()
}

/// Register a new technique.
///
/// Code and English name are mandatory; an existing code is rejected.
pub fn register_technique(
    code: &str,
    french_name: &str,
    english_name: &str,
) -> Result<TechniqueOption, CatalogError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(CatalogError::MissingField("code"));
    }
    if english_name.trim().is_empty() {
        return Err(CatalogError::MissingField("English name"));
    }

    let mut catalog = CATALOG.write().unwrap_or_else(|e| e.into_inner());
    if catalog.contains_key(code) {
        return Err(CatalogError::DuplicateCode(code.to_string()));
    }

    let option = TechniqueOption::new(code, french_name.trim(), english_name.trim());
    catalog.insert(code.to_string(), option.clone());
    log_success(format!("Technique {} added", code));
    Ok(option)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let xrf = technique("XRF").unwrap();
        assert_eq!(xrf.english_name, "X-ray Fluorescence Spectroscopy");
        assert!(technique("NOPE").is_none());
    }

    #[test]
    fn test_builtin_order() {
        let all = techniques();
        assert_eq!(all[0].code, "3D");
        assert!(all.len() >= BUILTIN.len());
    }

    #[test]
    fn test_register_new_technique() {
        let added = register_technique("LIBS", "Spectroscopie sur plasma induit par laser", "Laser-Induced Breakdown Spectroscopy").unwrap();
        assert_eq!(added.code, "LIBS");
        assert_eq!(technique("LIBS"), Some(added));
        assert_eq!(techniques().last().map(|t| t.code.clone()), Some("LIBS".to_string()));
    }

    #[test]
    fn test_register_rejects_duplicates_and_blanks() {
        assert!(matches!(register_technique("RAMAN", "", "Raman"), Err(CatalogError::DuplicateCode(_))));
        assert!(matches!(register_technique("  ", "", "X"), Err(CatalogError::MissingField("code"))));
        assert!(matches!(register_technique("NEWCODE", "Nouveau", ""), Err(CatalogError::MissingField(_))));
    }
}
