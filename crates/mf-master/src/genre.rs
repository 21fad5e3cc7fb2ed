//! Read-only genre profile registry
//!
//! Built once on first use and shared by every request. A profile only
//! moves shelf corner frequencies and picks the default saturation flavor,
//! so it never disturbs thresholds, ratios or gains.

use std::collections::HashMap;
use std::sync::LazyLock;

use mf_dsp::saturation::SaturationFlavor;
use serde::Serialize;

use crate::Genre;

/// Per-genre voicing
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenreProfile {
    /// Bass shelf corner (Hz)
    pub low_shelf_freq: f64,
    /// Treble shelf corner (Hz)
    pub high_shelf_freq: f64,
    /// Default saturation flavor
    pub saturation_flavor: SaturationFlavor,
    /// Typical integrated loudness of released material (LUFS)
    pub reference_lufs: f64,
}

const DEFAULT_PROFILE: GenreProfile = GenreProfile {
    low_shelf_freq: 120.0,
    high_shelf_freq: 8000.0,
    saturation_flavor: SaturationFlavor::Tape,
    reference_lufs: -14.0,
};

static GENRE_PROFILES: LazyLock<HashMap<Genre, GenreProfile>> = LazyLock::new(|| {
    let profile = |low, high, flavor, lufs| GenreProfile {
        low_shelf_freq: low,
        high_shelf_freq: high,
        saturation_flavor: flavor,
        reference_lufs: lufs,
    };

    HashMap::from([
        (Genre::Electronic, profile(90.0, 10000.0, SaturationFlavor::Tape, -9.0)),
        (Genre::HipHop, profile(80.0, 8000.0, SaturationFlavor::Tube, -9.0)),
        (Genre::Rock, profile(120.0, 6000.0, SaturationFlavor::Tube, -10.0)),
        (Genre::Pop, profile(110.0, 10000.0, SaturationFlavor::Tape, -11.0)),
        (Genre::Classical, profile(150.0, 8000.0, SaturationFlavor::Tape, -18.0)),
        (Genre::Jazz, profile(140.0, 7000.0, SaturationFlavor::Tube, -16.0)),
        (Genre::Acoustic, profile(130.0, 9000.0, SaturationFlavor::Tape, -16.0)),
        (Genre::RnB, profile(90.0, 9000.0, SaturationFlavor::Tube, -11.0)),
        (Genre::Speech, profile(160.0, 5000.0, SaturationFlavor::Tape, -16.0)),
        (Genre::Unknown, DEFAULT_PROFILE),
    ])
});

impl Genre {
    /// Registry entry for this genre
    pub fn profile(&self) -> &'static GenreProfile {
        GENRE_PROFILES.get(self).unwrap_or(&DEFAULT_PROFILE)
    }
}
