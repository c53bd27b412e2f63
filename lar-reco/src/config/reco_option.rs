//! High-level reconstruction steering presets.

use super::StageToggles;
use crate::errors::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named preset of stage toggles.
///
/// Parsing ignores case and surrounding whitespace, in configuration files as
/// well as through [`FromStr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RecoOption {
    /// Every stage enabled.
    Full,
    /// Cosmic-ray reconstruction of all hits only.
    AllHitsCr,
    /// Neutrino reconstruction of all hits, unsliced.
    AllHitsNu,
    /// Cosmic removal, then cosmic reconstruction of the remaining hits.
    CrRemHitsCr,
    /// Cosmic removal, slicing, cosmic reconstruction per slice.
    CrRemHitsSliceCr,
    /// Cosmic removal, slicing, neutrino reconstruction per slice.
    CrRemHitsSliceNu,
    /// Slicing of all hits, cosmic reconstruction per slice.
    AllHitsSliceCr,
    /// Slicing of all hits, neutrino reconstruction per slice.
    AllHitsSliceNu,
}

impl RecoOption {
    /// Returns the stage toggles this preset selects.
    #[must_use]
    pub fn toggles(&self) -> StageToggles {
        let (all_hits_cr, cr_removal, slicing, nu, cr, identify) = match self {
            Self::Full => (true, true, true, true, true, true),
            Self::AllHitsCr => (true, false, false, false, false, false),
            Self::AllHitsNu => (false, false, false, true, false, false),
            Self::CrRemHitsCr => (true, true, false, false, true, false),
            Self::CrRemHitsSliceCr => (true, true, true, false, true, false),
            Self::CrRemHitsSliceNu => (true, true, true, true, false, false),
            Self::AllHitsSliceCr => (false, false, true, false, true, false),
            Self::AllHitsSliceNu => (false, false, true, true, false, false),
        };

        StageToggles {
            should_run_all_hits_cosmic_reco: all_hits_cr,
            should_run_cosmic_hit_removal: cr_removal,
            should_run_slicing: slicing,
            should_run_neutrino_reco_option: nu,
            should_run_cosmic_reco_option: cr,
            should_identify_neutrino_slice: identify,
        }
    }
}

impl fmt::Display for RecoOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Full => "full",
            Self::AllHitsCr => "allhitscr",
            Self::AllHitsNu => "allhitsnu",
            Self::CrRemHitsCr => "crremhitscr",
            Self::CrRemHitsSliceCr => "crremhitsslicecr",
            Self::CrRemHitsSliceNu => "crremhitsslicenu",
            Self::AllHitsSliceCr => "allhitsslicecr",
            Self::AllHitsSliceNu => "allhitsslicenu",
        };
        write!(f, "{name}")
    }
}

impl FromStr for RecoOption {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "allhitscr" => Ok(Self::AllHitsCr),
            "allhitsnu" => Ok(Self::AllHitsNu),
            "crremhitscr" => Ok(Self::CrRemHitsCr),
            "crremhitsslicecr" => Ok(Self::CrRemHitsSliceCr),
            "crremhitsslicenu" => Ok(Self::CrRemHitsSliceNu),
            "allhitsslicecr" => Ok(Self::AllHitsSliceCr),
            "allhitsslicenu" => Ok(Self::AllHitsSliceNu),
            other => Err(ConfigurationError::invalid(
                "reco_option",
                format!("unrecognised reco option '{other}'"),
            )),
        }
    }
}

impl TryFrom<String> for RecoOption {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RecoOption> for String {
    fn from(option: RecoOption) -> Self {
        option.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("AllHitsNu".parse::<RecoOption>().unwrap(), RecoOption::AllHitsNu);
        assert_eq!(" full ".parse::<RecoOption>().unwrap(), RecoOption::Full);
    }

    #[test]
    fn test_unknown_option_is_rejected() {
        let err = "everything".parse::<RecoOption>().unwrap_err();
        assert!(err.to_string().contains("everything"));
    }

    #[test]
    fn test_display_parses_back() {
        for option in [
            RecoOption::Full,
            RecoOption::CrRemHitsSliceNu,
            RecoOption::AllHitsSliceCr,
        ] {
            assert_eq!(option.to_string().parse::<RecoOption>().unwrap(), option);
        }
    }

    #[test]
    fn test_json_accepts_the_same_spellings_as_parse() {
        let option: RecoOption = serde_json::from_str(r#""AllHitsNu""#).unwrap();
        assert_eq!(option, RecoOption::AllHitsNu);
        let option: RecoOption = serde_json::from_str(r#"" crremhitsslicecr ""#).unwrap();
        assert_eq!(option, RecoOption::CrRemHitsSliceCr);

        assert!(serde_json::from_str::<RecoOption>(r#""everything""#).is_err());
        assert_eq!(serde_json::to_string(&RecoOption::AllHitsSliceNu).unwrap(), r#""allhitsslicenu""#);
    }

    #[test]
    fn test_all_hits_nu_runs_unsliced_neutrino_only() {
        let toggles = RecoOption::AllHitsNu.toggles();
        assert!(toggles.should_run_neutrino_reco_option);
        assert!(!toggles.should_run_slicing);
        assert!(!toggles.should_run_all_hits_cosmic_reco);
        assert!(!toggles.should_identify_neutrino_slice);
    }

    #[test]
    fn test_full_enables_everything() {
        assert_eq!(RecoOption::Full.toggles(), StageToggles::default());
    }
}
