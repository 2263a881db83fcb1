//! Knowledge-base provenance derived from the document filename.
//!
//! Preset and upload filenames follow the `EMPRESA_PAIS_AÑO.pdf` convention
//! (`SURA_COL_2024.pdf`). Parsing is a best-effort heuristic: names that do
//! not match degrade to default metadata instead of failing the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Country abbreviations appearing in document filenames, mapped to display
/// names. Covers the Grupo Sura footprint plus a few common peers.
const COUNTRY_CODES: &[(&str, &str)] = &[
    ("COL", "Colombia"),
    ("MEX", "México"),
    ("PER", "Perú"),
    ("CHL", "Chile"),
    ("ARG", "Argentina"),
    ("URY", "Uruguay"),
    ("URU", "Uruguay"),
    ("SLV", "El Salvador"),
    ("PAN", "Panamá"),
    ("DOM", "República Dominicana"),
    ("BRA", "Brasil"),
    ("USA", "Estados Unidos"),
    ("ESP", "España"),
];

/// Label used when the filename carries no recognizable country token.
const FALLBACK_COUNTRY: &str = "No especificado";

/// Characters of the stem kept as the company name when parsing fails.
const COMPANY_FALLBACK_CHARS: usize = 20;

/// Provenance record persisted alongside a knowledge base's chunks and
/// embeddings. Field names match the source documents' language.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KbMetadata {
    pub empresa: String,
    pub pais: String,
    pub anio: i32,
    pub source: PathBuf,
    /// SHA-256 of the source file at build time; used to warn when a loaded
    /// snapshot no longer matches the document on disk.
    #[serde(default)]
    pub source_sha256: Option<String>,
    #[serde(default)]
    pub built_at: Option<DateTime<Utc>>,
}

impl KbMetadata {
    /// Derives metadata from the source path's filename. Never fails:
    /// unparseable names fall back to the uppercased stem, an unspecified
    /// country, and `default_year`.
    pub fn from_source(source: &Path, default_year: i32) -> Self {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();

        let parts: Vec<&str> = stem.split('_').collect();

        let (empresa, pais, anio) = if parts.len() >= 3 && !parts[0].is_empty() {
            let empresa = parts[0].to_uppercase();
            let pais = lookup_country(parts[1])
                .map(str::to_string)
                .unwrap_or_else(|| title_case(parts[1]));
            let anio = first_year_run(parts[2]).unwrap_or(default_year);
            (empresa, pais, anio)
        } else {
            let empresa: String = stem
                .chars()
                .take(COMPANY_FALLBACK_CHARS)
                .collect::<String>()
                .to_uppercase();
            (empresa, FALLBACK_COUNTRY.to_string(), default_year)
        };

        Self {
            empresa,
            pais,
            anio,
            source: source.to_path_buf(),
            source_sha256: None,
            built_at: None,
        }
    }
}

fn lookup_country(token: &str) -> Option<&'static str> {
    let upper = token.to_uppercase();
    COUNTRY_CODES
        .iter()
        .find(|(code, _)| *code == upper)
        .map(|(_, name)| *name)
}

/// `"col"` → `"Col"`; used for country tokens missing from the table.
fn title_case(token: &str) -> String {
    if token.is_empty() {
        return FALLBACK_COUNTRY.to_string();
    }
    let mut chars = token.chars();
    let first = chars.next().unwrap_or_default().to_uppercase().to_string();
    first + &chars.as_str().to_lowercase()
}

/// First run of 4 consecutive ASCII digits in the token, if any.
fn first_year_run(token: &str) -> Option<i32> {
    let bytes = token.as_bytes();
    for start in 0..bytes.len() {
        if bytes[start..].len() >= 4 && bytes[start..start + 4].iter().all(u8::is_ascii_digit) {
            return token[start..start + 4].parse().ok();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn parses_the_standard_convention() {
        let meta = KbMetadata::from_source(Path::new("data/SURA_COL_2024.pdf"), 2024);
        assert_eq!(meta.empresa, "SURA");
        assert_eq!(meta.pais, "Colombia");
        assert_eq!(meta.anio, 2024);
    }

    #[test]
    fn country_match_is_case_insensitive() {
        let meta = KbMetadata::from_source(Path::new("bancolombia_col_2023.pdf"), 2024);
        assert_eq!(meta.empresa, "BANCOLOMBIA");
        assert_eq!(meta.pais, "Colombia");
        assert_eq!(meta.anio, 2023);
    }

    #[test]
    fn unknown_country_code_is_title_cased() {
        let meta = KbMetadata::from_source(Path::new("ACME_xyz_2022.pdf"), 2024);
        assert_eq!(meta.pais, "Xyz");
    }

    #[test]
    fn year_is_the_first_four_digit_run() {
        let meta = KbMetadata::from_source(Path::new("SURA_COL_FY2024Q4.pdf"), 2000);
        assert_eq!(meta.anio, 2024);
    }

    #[test]
    fn year_token_without_digits_uses_default() {
        let meta = KbMetadata::from_source(Path::new("SURA_COL_anual.pdf"), 2024);
        assert_eq!(meta.anio, 2024);
    }

    #[test]
    fn unparseable_name_degrades_gracefully() {
        let meta = KbMetadata::from_source(Path::new("randomfile.pdf"), 2024);
        assert_eq!(meta.empresa, "RANDOMFILE");
        assert_eq!(meta.pais, "No especificado");
        assert_eq!(meta.anio, 2024);
    }

    #[test]
    fn long_fallback_stem_is_clipped() {
        let meta = KbMetadata::from_source(
            Path::new("estados-financieros-consolidados-trimestre.pdf"),
            2024,
        );
        assert_eq!(meta.empresa.chars().count(), COMPANY_FALLBACK_CHARS);
    }

    #[test]
    fn survives_serde_roundtrip() {
        let meta = KbMetadata::from_source(Path::new("SURA_COL_2024.pdf"), 2024);
        let json = serde_json::to_string(&meta).unwrap();
        let back: KbMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(meta, back);
    }
}
