use serde::Serialize;
use std::fmt::Display;
use time::{Date, Month};

use super::constants::{BLOCK_WORDS, RUN_END_WORDS};
use super::error::RunHeaderError;
use super::event_header::nint;
use super::format::BlockReader;
use super::particle::particle_name;

const MAX_OBS_LEVELS: usize = 10;
const N_ATMOSPHERIC_LAYERS: usize = 5;
// Highest word index used from the first EVTH of a run
const LAST_EVTH_RUN_FIELD: usize = 152;

/// Options compiled into the simulation, as reported by the Cerenkov flag word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CerenkovOption {
    Cerenkov,
    Iact,
    Ceffic,
    Atmext,
    Refraction,
    Volumedet,
    Curved,
    Slant,
}

impl CerenkovOption {
    fn bit(&self) -> u32 {
        match self {
            Self::Cerenkov => 0,
            Self::Iact => 1,
            Self::Ceffic => 2,
            Self::Atmext => 3,
            Self::Refraction => 4,
            Self::Volumedet => 5,
            Self::Curved => 6,
            Self::Slant => 8,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Cerenkov => "CERENKOV",
            Self::Iact => "IACT",
            Self::Ceffic => "CEFFIC",
            Self::Atmext => "ATMEXT",
            Self::Refraction => "+Refraction",
            Self::Volumedet => "VOLUMEDET",
            Self::Curved => "CURVED",
            Self::Slant => "SLANT",
        }
    }

    const ALL: [Self; 8] = [
        Self::Cerenkov,
        Self::Iact,
        Self::Ceffic,
        Self::Atmext,
        Self::Refraction,
        Self::Volumedet,
        Self::Curved,
        Self::Slant,
    ];
}

/// Decode the CORSIKA run date (yymmdd, or yyyymmdd) stored as a float
pub fn corsika_date(value: f32) -> Option<Date> {
    if value.is_nan() || value <= 0.0 {
        return None;
    }
    let raw = value.round() as u32;
    let (year, rest) = if raw >= 1_000_000 {
        (raw / 10_000, raw % 10_000)
    } else {
        let yy = raw / 10_000;
        (if yy < 70 { 2000 + yy } else { 1900 + yy }, raw % 10_000)
    };
    let month = Month::try_from((rest / 100) as u8).ok()?;
    Date::from_calendar_date(year as i32, month, (rest % 100) as u8).ok()
}

/// Run level information of a CORSIKA file.
///
/// Filled in three steps: the RUNH block, the first EVTH block of the run (options,
/// magnetic field, simulated ranges) and finally the RUNE trailer (number of
/// events).
#[derive(Debug, Clone, Serialize)]
pub struct RunHeader {
    run_number: u32,
    run_start: Option<Date>,
    run_start_raw: f32,
    program_version: f32,
    num_obs_level: u32,
    obs_level: [f32; MAX_OBS_LEVELS],
    slope_spectrum: f32,
    energy_min: f32,
    energy_max: f32,
    impact_max: f32,
    atmospheric_layers: [f32; N_ATMOSPHERIC_LAYERS],
    atmospheric_coeff_a: [f32; N_ATMOSPHERIC_LAYERS],
    atmospheric_coeff_b: [f32; N_ATMOSPHERIC_LAYERS],
    atmospheric_coeff_c: [f32; N_ATMOSPHERIC_LAYERS],
    cerenkov_flag: u32,
    num_reuse: u32,
    particle_id: i32,
    magnetic_field_x: f32,
    magnetic_field_z: f32,
    magnetic_field_az: f32,
    zd_min: f32,
    zd_max: f32,
    az_min: f32,
    az_max: f32,
    wavelength_min: f32,
    wavelength_max: f32,
    view_cone_inner_angle: f32,
    view_cone_outer_angle: f32,
    num_events: u32,
}

impl Default for RunHeader {
    fn default() -> Self {
        Self {
            run_number: 0,
            run_start: None,
            run_start_raw: 0.0,
            program_version: 0.0,
            num_obs_level: 0,
            obs_level: [0.0; MAX_OBS_LEVELS],
            slope_spectrum: 0.0,
            energy_min: 0.0,
            energy_max: 0.0,
            impact_max: -1.0,
            atmospheric_layers: [0.0; N_ATMOSPHERIC_LAYERS],
            atmospheric_coeff_a: [0.0; N_ATMOSPHERIC_LAYERS],
            atmospheric_coeff_b: [0.0; N_ATMOSPHERIC_LAYERS],
            atmospheric_coeff_c: [0.0; N_ATMOSPHERIC_LAYERS],
            cerenkov_flag: 0,
            num_reuse: 0,
            particle_id: -1,
            magnetic_field_x: 0.0,
            magnetic_field_z: 0.0,
            magnetic_field_az: 0.0,
            zd_min: 0.0,
            zd_max: -1.0,
            az_min: 0.0,
            az_max: 0.0,
            wavelength_min: 0.0,
            wavelength_max: 0.0,
            view_cone_inner_angle: 0.0,
            view_cone_outer_angle: -1.0,
            num_events: 0,
        }
    }
}

impl RunHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the 272 words following a RUNH header from the stream and decode them
    pub fn read_evt(&mut self, reader: &mut dyn BlockReader) -> Result<(), RunHeaderError> {
        let words = reader.read_floats(BLOCK_WORDS)?;
        let is_eventio = reader.is_eventio_format();
        self.decode_run_header(&words, is_eventio)
    }

    /// Decode a RUNH block.
    ///
    /// Only a single observation level is supported; anything else is an error.
    pub fn decode_run_header(&mut self, f: &[f32], is_eventio: bool) -> Result<(), RunHeaderError> {
        if f.len() < BLOCK_WORDS {
            return Err(RunHeaderError::ShortBlock(f.len()));
        }

        self.run_number = nint(f[0]) as u32;
        self.num_events = 0;

        self.run_start_raw = f[1];
        self.run_start = corsika_date(f[1]);

        self.program_version = f[2];
        let n_obs_level = nint(f[3]);
        if n_obs_level != 1 {
            spdlog::error!("Currently only one observation level is allowed, RUNH has {n_obs_level}");
            return Err(RunHeaderError::BadObsLevelCount(n_obs_level));
        }
        self.num_obs_level = n_obs_level as u32;
        self.obs_level = [0.0; MAX_OBS_LEVELS];
        let n_levels = self.num_obs_level as usize;
        self.obs_level[..n_levels].copy_from_slice(&f[4..4 + n_levels]);

        self.slope_spectrum = f[14];
        self.energy_min = f[15];
        self.energy_max = f[16];

        // Scattering radii only exist since CORSIKA 6.822
        self.impact_max = -1.0;
        if f[246] > 0.0 && f[247] == 0.0 && !is_eventio {
            spdlog::warn!("Events scattered in a disc on the ground.");
            self.impact_max = f[246];
        }
        // Disc perpendicular to the shower axis
        if f[246] == 0.0 && f[247] > 0.0 {
            self.impact_max = f[247];
        }
        if f[246] > 0.0 && f[247] > 0.0 {
            spdlog::warn!("Events scattered in a rectangle on the ground.");
        }

        self.atmospheric_layers.copy_from_slice(&f[248..253]);
        self.atmospheric_coeff_a.copy_from_slice(&f[253..258]);
        self.atmospheric_coeff_b.copy_from_slice(&f[258..263]);
        self.atmospheric_coeff_c.copy_from_slice(&f[263..268]);

        Ok(())
    }

    /// Take the run scope fields which CORSIKA only writes into each EVTH.
    ///
    /// Called with the first event header following a RUNH. The values are not
    /// compared against the RUNH.
    pub fn read_event_header(&mut self, g: &[f32]) -> Result<(), RunHeaderError> {
        if g.len() <= LAST_EVTH_RUN_FIELD {
            return Err(RunHeaderError::ShortBlock(g.len()));
        }

        self.num_reuse = nint(g[96]) as u32;
        self.particle_id = nint(g[1]);

        // Earth magnetic field in uT
        self.magnetic_field_x = g[69];
        self.magnetic_field_z = -g[70];
        self.magnetic_field_az = g[91];

        // The flag word is rounded, not truncated
        self.cerenkov_flag = nint(g[75]) as u32;

        self.zd_min = g[79];
        self.zd_max = g[80];
        self.az_min = 180.0 - g[81];
        self.az_max = 180.0 - g[82];

        if nint(g[83]) != 1 {
            spdlog::warn!("Cherenkov bunch size not 1, but {}", g[83]);
        }

        self.impact_max = -1.0;

        self.wavelength_min = g[94];
        self.wavelength_max = g[95];

        self.view_cone_inner_angle = g[151];
        self.view_cone_outer_angle = g[152];

        Ok(())
    }

    /// Read the RUNE trailer payload and take the number of events from it
    pub fn read_evt_end(
        &mut self,
        reader: &mut dyn BlockReader,
        verify_run_number: bool,
    ) -> Result<(), RunHeaderError> {
        let words = reader.read_floats(RUN_END_WORDS)?;
        self.decode_run_end(&words, verify_run_number)
    }

    pub fn decode_run_end(&mut self, f: &[f32], verify_run_number: bool) -> Result<(), RunHeaderError> {
        if f.len() < RUN_END_WORDS {
            return Err(RunHeaderError::ShortBlock(f.len()));
        }
        if verify_run_number {
            let run_number = nint(f[0]) as u32;
            if run_number != self.run_number {
                spdlog::error!(
                    "Mismatch in stream: run number in RUNE ({}) doesn't match RUNH ({})",
                    run_number,
                    self.run_number
                );
                return Err(RunHeaderError::RunNumberMismatch {
                    rune: run_number,
                    runh: self.run_number,
                });
            }
        }
        self.num_events = nint(f[1]) as u32;
        Ok(())
    }

    pub fn has(&self, option: CerenkovOption) -> bool {
        self.cerenkov_flag & (1 << option.bit()) != 0
    }

    /// Table number of the external atmosphere (ATMEXT)
    pub fn get_atmospheric_model(&self) -> u32 {
        (self.cerenkov_flag >> 10) & 0x3FF
    }

    pub fn has_layers(&self) -> bool {
        self.atmospheric_layers.iter().any(|layer| *layer != 0.0)
    }

    pub fn get_run_number(&self) -> u32 {
        self.run_number
    }

    pub fn get_run_start(&self) -> Option<Date> {
        self.run_start
    }

    pub fn get_program_version(&self) -> f32 {
        self.program_version
    }

    pub fn get_num_obs_level(&self) -> u32 {
        self.num_obs_level
    }

    /// Altitude of the observation level in cm, if it exists
    pub fn get_obs_level(&self, idx: usize) -> Option<f32> {
        if idx < self.num_obs_level as usize {
            Some(self.obs_level[idx])
        } else {
            None
        }
    }

    pub fn get_slope_spectrum(&self) -> f32 {
        self.slope_spectrum
    }

    pub fn get_energy_min(&self) -> f32 {
        self.energy_min
    }

    pub fn get_energy_max(&self) -> f32 {
        self.energy_max
    }

    /// Maximum simulated impact in cm; negative if unknown
    pub fn get_impact_max(&self) -> f32 {
        self.impact_max
    }

    pub fn get_atmospheric_layers(&self) -> &[f32; N_ATMOSPHERIC_LAYERS] {
        &self.atmospheric_layers
    }

    pub fn get_atmospheric_coeff_a(&self) -> &[f32; N_ATMOSPHERIC_LAYERS] {
        &self.atmospheric_coeff_a
    }

    pub fn get_atmospheric_coeff_b(&self) -> &[f32; N_ATMOSPHERIC_LAYERS] {
        &self.atmospheric_coeff_b
    }

    pub fn get_atmospheric_coeff_c(&self) -> &[f32; N_ATMOSPHERIC_LAYERS] {
        &self.atmospheric_coeff_c
    }

    pub fn get_cerenkov_flag(&self) -> u32 {
        self.cerenkov_flag
    }

    pub fn get_num_reuse(&self) -> u32 {
        self.num_reuse
    }

    pub fn get_particle_id(&self) -> i32 {
        self.particle_id
    }

    pub fn get_magnetic_field(&self) -> (f32, f32, f32) {
        (
            self.magnetic_field_x,
            self.magnetic_field_z,
            self.magnetic_field_az,
        )
    }

    pub fn get_zd_range(&self) -> (f32, f32) {
        (self.zd_min, self.zd_max)
    }

    pub fn get_az_range(&self) -> (f32, f32) {
        (self.az_min, self.az_max)
    }

    pub fn get_wavelength_range(&self) -> (f32, f32) {
        (self.wavelength_min, self.wavelength_max)
    }

    pub fn get_view_cone(&self) -> (f32, f32) {
        (self.view_cone_inner_angle, self.view_cone_outer_angle)
    }

    pub fn get_num_events(&self) -> u32 {
        self.num_events
    }
}

impl Display for RunHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let date = self
            .run_start
            .and_then(|d| {
                d.format(time::macros::format_description!("[day].[month].[year]"))
                    .ok()
            })
            .unwrap_or_else(|| self.run_start_raw.to_string());
        writeln!(
            f,
            "Run Number:     {}  ({}, V{})",
            self.run_number, date, self.program_version
        )?;
        writeln!(f, "Particle ID:    {}", particle_name(self.particle_id))?;
        if self.num_events > 0 {
            writeln!(
                f,
                "Num Events:     {} (reuse {} times)",
                self.num_events, self.num_reuse
            )?;
        }
        write!(f, "Obs Level:     ")?;
        for level in &self.obs_level[..self.num_obs_level as usize] {
            write!(f, " {}m", level / 100.0)?;
        }
        writeln!(f)?;

        writeln!(
            f,
            "MagneticField:  X/Z=({}/{})\u{b5}T  Az={}\u{b0}  (magnetic North w.r.t. North)",
            self.magnetic_field_x,
            self.magnetic_field_z,
            self.magnetic_field_az.to_degrees()
        )?;
        writeln!(
            f,
            "Spectrum:       Slope={}  ({}GeV-{}GeV)",
            self.slope_spectrum, self.energy_min, self.energy_max
        )?;
        writeln!(
            f,
            "Wavelength:     {}nm - {}nm",
            self.wavelength_min, self.wavelength_max
        )?;
        if self.impact_max > 0.0 {
            writeln!(f, "ImpactMax:      {}cm", self.impact_max)?;
        }
        if self.view_cone_outer_angle > 0.0 {
            writeln!(
                f,
                "ViewCone:       {}\u{b0} - {}\u{b0}",
                self.view_cone_inner_angle, self.view_cone_outer_angle
            )?;
        }

        if self.zd_max >= 0.0 && self.zd_min < 360.0 {
            write!(f, "Zd/Az:          {}\u{b0}", self.zd_min)?;
            if self.zd_min == self.zd_max {
                write!(f, " (fixed)")?;
            } else {
                write!(f, "-{}\u{b0}", self.zd_max)?;
            }
            write!(f, " / {}\u{b0}", self.az_min)?;
            if self.az_min == self.az_max {
                write!(f, " (fixed)")?;
            } else {
                write!(f, "-{}\u{b0}", self.az_max)?;
            }
            writeln!(f, "  w.r.t. magnetic North.")?;
        }
        if self.zd_min >= 360.0 {
            writeln!(f, "-trajectory-")?;
        }

        write!(f, "Options used:  ")?;
        for option in CerenkovOption::ALL {
            if self.has(option) {
                write!(f, " {}", option.name())?;
                if option == CerenkovOption::Atmext {
                    write!(f, "{}", self.get_atmospheric_model())?;
                }
            }
        }
        writeln!(f, " [{:x}]", self.cerenkov_flag)?;

        if self.has_layers() {
            write!(f, "Atm.Layers:    ")?;
            for layer in &self.atmospheric_layers {
                write!(f, " {layer}")?;
            }
            writeln!(f)?;
        }
        for (name, coeffs) in [
            ("A", &self.atmospheric_coeff_a),
            ("B", &self.atmospheric_coeff_b),
            ("C", &self.atmospheric_coeff_c),
        ] {
            write!(f, "Atm.Coeff {name}:   ")?;
            for c in coeffs {
                write!(f, " {c}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_decode_run_header() {
        let mut words = run_header_words(1234.0, 1.0);
        for i in 0..5 {
            words[248 + i] = 1000.0 * (i as f32 + 1.0);
            words[253 + i] = 1.0 + i as f32;
            words[258 + i] = 10.0 + i as f32;
            words[263 + i] = 100.0 + i as f32;
        }
        let mut header = RunHeader::new();
        header.decode_run_header(&words, false).unwrap();
        assert_eq!(header.get_run_number(), 1234);
        assert_eq!(header.get_num_obs_level(), 1);
        assert_eq!(header.get_obs_level(0), Some(220000.0));
        assert_eq!(header.get_obs_level(1), None);
        assert_eq!(header.get_slope_spectrum(), -2.7);
        assert_eq!(header.get_energy_min(), 10.0);
        assert_eq!(header.get_energy_max(), 50000.0);
        assert_eq!(header.get_impact_max(), -1.0);
        assert!(header.has_layers());
        assert_eq!(header.get_atmospheric_coeff_b()[4], 14.0);
        assert_eq!(header.get_atmospheric_coeff_c()[0], 100.0);
        assert_eq!(
            header.get_run_start(),
            Some(Date::from_calendar_date(2010, Month::April, 15).unwrap())
        );
    }

    #[test]
    fn test_obs_level_count() {
        for bad in [0.0, 2.0, 255.0] {
            let mut header = RunHeader::new();
            assert!(matches!(
                header.decode_run_header(&run_header_words(1.0, bad), false),
                Err(RunHeaderError::BadObsLevelCount(_))
            ));
        }
        let mut header = RunHeader::new();
        assert!(matches!(
            header.decode_run_header(&[1.0; 10], false),
            Err(RunHeaderError::ShortBlock(10))
        ));
    }

    #[test]
    fn test_impact_max() {
        let mut header = RunHeader::new();
        let mut words = run_header_words(1.0, 1.0);

        words[246] = 50000.0;
        header.decode_run_header(&words, false).unwrap();
        assert_eq!(header.get_impact_max(), 50000.0);
        header.decode_run_header(&words, true).unwrap();
        assert_eq!(header.get_impact_max(), -1.0);

        words[246] = 0.0;
        words[247] = 30000.0;
        header.decode_run_header(&words, true).unwrap();
        assert_eq!(header.get_impact_max(), 30000.0);

        // Rectangle: left unset
        words[246] = 50000.0;
        header.decode_run_header(&words, false).unwrap();
        assert_eq!(header.get_impact_max(), -1.0);
    }

    #[test]
    fn test_read_event_header() {
        let mut g = event_header_words(1.0, 5.0);
        g[69] = 20.0;
        g[70] = 40.0;
        g[75] = 2.6;
        g[79] = 10.0;
        g[80] = 20.0;
        g[81] = 0.0;
        g[82] = 360.0;
        g[94] = 290.0;
        g[95] = 900.0;
        g[152] = 5.0;
        let mut header = RunHeader::new();
        header.read_event_header(&g).unwrap();
        assert_eq!(header.get_num_reuse(), 5);
        assert_eq!(header.get_particle_id(), 1);
        assert_eq!(header.get_magnetic_field(), (20.0, -40.0, 0.0));
        assert_eq!(header.get_cerenkov_flag(), 3);
        assert!(header.has(CerenkovOption::Cerenkov));
        assert!(header.has(CerenkovOption::Iact));
        assert!(!header.has(CerenkovOption::Slant));
        assert_eq!(header.get_zd_range(), (10.0, 20.0));
        assert_eq!(header.get_az_range(), (180.0, -180.0));
        assert_eq!(header.get_wavelength_range(), (290.0, 900.0));
        assert_eq!(header.get_view_cone(), (0.0, 5.0));
    }

    #[test]
    fn test_run_end() {
        let mut header = RunHeader::new();
        header
            .decode_run_header(&run_header_words(7.0, 1.0), false)
            .unwrap();
        header.decode_run_end(&[7.0, 100.0], true).unwrap();
        assert_eq!(header.get_num_events(), 100);

        assert!(matches!(
            header.decode_run_end(&[8.0, 50.0], true),
            Err(RunHeaderError::RunNumberMismatch { rune: 8, runh: 7 })
        ));
        assert_eq!(header.get_num_events(), 100);

        header.decode_run_end(&[8.0, 50.0], false).unwrap();
        assert_eq!(header.get_num_events(), 50);
    }

    #[test]
    fn test_corsika_date() {
        assert_eq!(
            corsika_date(991231.0),
            Some(Date::from_calendar_date(1999, Month::December, 31).unwrap())
        );
        assert_eq!(
            corsika_date(50102.0),
            Some(Date::from_calendar_date(2005, Month::January, 2).unwrap())
        );
        assert_eq!(corsika_date(0.0), None);
        assert_eq!(corsika_date(101399.0), None);
    }

    #[test]
    fn test_display() {
        let mut header = RunHeader::new();
        header
            .decode_run_header(&run_header_words(7.0, 1.0), false)
            .unwrap();
        let text = header.to_string();
        assert!(text.contains("Run Number:     7  (15.04.2010"));
        assert!(text.contains("Obs Level:      2200m"));
        assert!(text.contains("Particle ID:    Undefined"));
    }
}
