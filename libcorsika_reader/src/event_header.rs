use serde::Serialize;
use std::fmt::Display;

use super::constants::{BLOCK_WORDS, MAX_REUSE};
use super::error::EventHeaderError;
use super::format::BlockReader;

// Last word used from an EVTH: the end of the reuse position arrays
const LAST_EVTH_FIELD: usize = 136;
const REUSE_X_OFFSET: usize = 97;
const REUSE_Y_OFFSET: usize = 117;

/// Round to the nearest integer, halves to even
pub(crate) fn nint(value: f32) -> i32 {
    value.round_ties_even() as i32
}

/// Per shower information from an EVTH block and its EVTE trailer.
///
/// One EVTH describes a shower which CORSIKA reuses up to 20 times at different
/// core positions. The candidate positions are stored when the block is decoded;
/// [`EventHeader::init_xy`] selects the one for the current reuse index.
#[derive(Debug, Clone, Serialize)]
pub struct EventHeader {
    evt_number: u32,
    num_reuse: u32,
    tot_reuse: u32,
    total_energy: f32,
    start_altitude: f32,
    first_target_num: f32,
    first_interaction_height: f32,
    momentum_x: f32,
    momentum_y: f32,
    momentum_z: f32,
    zd: f32,
    az: f32,
    x: f32,
    y: f32,
    weighted_num_photons: f32,
    #[serde(skip)]
    temp_x: [f32; MAX_REUSE],
    #[serde(skip)]
    temp_y: [f32; MAX_REUSE],
}

impl Default for EventHeader {
    fn default() -> Self {
        Self {
            evt_number: 0,
            num_reuse: u32::MAX,
            tot_reuse: 0,
            total_energy: 0.0,
            start_altitude: 0.0,
            first_target_num: 0.0,
            first_interaction_height: 0.0,
            momentum_x: 0.0,
            momentum_y: 0.0,
            momentum_z: 0.0,
            zd: 0.0,
            az: 0.0,
            x: 0.0,
            y: 0.0,
            weighted_num_photons: 0.0,
            temp_x: [0.0; MAX_REUSE],
            temp_y: [0.0; MAX_REUSE],
        }
    }
}

impl EventHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an EVTH block
    pub fn decode_event_header(&mut self, f: &[f32]) -> Result<(), EventHeaderError> {
        if f.len() <= LAST_EVTH_FIELD {
            return Err(EventHeaderError::ShortBlock(f.len()));
        }

        self.evt_number = nint(f[0]) as u32;

        self.total_energy = f[2];
        self.start_altitude = f[3];
        self.first_target_num = f[4];
        self.first_interaction_height = f[5];

        // CORSIKA points opposite to the particle direction with x=north, y=west,
        // z=up. Store along the particle direction with x=east, y=north, z=up.
        self.momentum_x = f[7];
        self.momentum_y = -f[6];
        self.momentum_z = -f[8];

        self.zd = f[9];
        self.az = std::f32::consts::PI - f[10];

        let tot_reuse = nint(f[96]);
        if !(0..=MAX_REUSE as i32).contains(&tot_reuse) {
            spdlog::error!(
                "Number of reuse of shower is {tot_reuse}, but maximum implemented is {MAX_REUSE}"
            );
            return Err(EventHeaderError::BadReuseCount(tot_reuse));
        }
        self.tot_reuse = tot_reuse as u32;

        self.temp_x
            .copy_from_slice(&f[REUSE_X_OFFSET..REUSE_X_OFFSET + MAX_REUSE]);
        self.temp_y
            .copy_from_slice(&f[REUSE_Y_OFFSET..REUSE_Y_OFFSET + MAX_REUSE]);

        self.weighted_num_photons = 0.0;

        Ok(())
    }

    /// Read the EVTE block following the shower data and check that it belongs
    /// to this event.
    ///
    /// Running out of data while reading is reported as [`EventHeaderError::EndOfFile`].
    pub fn read_evt_end(&mut self, reader: &mut dyn BlockReader) -> Result<(), EventHeaderError> {
        let words = reader.read_floats(BLOCK_WORDS)?;
        self.decode_event_end(&words)
    }

    pub fn decode_event_end(&mut self, f: &[f32]) -> Result<(), EventHeaderError> {
        if f.len() < 2 {
            return Err(EventHeaderError::ShortBlock(f.len()));
        }
        let evt_number = nint(f[0]) as u32;
        if evt_number != self.evt_number {
            spdlog::error!(
                "Mismatch in stream: event number in EVTE ({}) doesn't match EVTH ({})",
                evt_number,
                self.evt_number
            );
            return Err(EventHeaderError::EventNumberMismatch {
                evte: evt_number,
                evth: self.evt_number,
            });
        }

        // Exists once per shower, whatever the number of reuses
        self.weighted_num_photons = f[1];
        Ok(())
    }

    /// Distance of the shower axis from the origin of the ground coordinates.
    ///
    /// The axis runs through (x, y, 0) with direction (zd, az); the result is
    /// |q x u| for q = (x, y, 0) and the unit vector u.
    pub fn get_impact(&self) -> f64 {
        let zd = self.zd as f64;
        let az = self.az as f64;
        let x = self.x as f64;
        let y = self.y as f64;

        let c = zd.cos();
        let s = zd.sin();
        let p = az.cos() * x - az.sin() * y;

        (c * c * (x * x + y * y) + s * s * p * p).sqrt()
    }

    /// Whether the shower was actually thrown at this reuse index. A header
    /// without reuses still has its core at index 0.
    pub fn is_reuse_used(&self, idx: usize) -> bool {
        idx < self.tot_reuse.max(1) as usize
    }

    fn warn_unused_reuse(&self, idx: usize) {
        if !self.is_reuse_used(idx) {
            spdlog::warn!(
                "Reuse index {idx} of event {} is beyond the {} reuses thrown, its core position is not set",
                self.evt_number,
                self.tot_reuse
            );
        }
    }

    /// Take the core position of the current reuse index
    pub fn init_xy(&mut self) -> Result<(), EventHeaderError> {
        let idx = self.num_reuse as usize;
        if idx >= MAX_REUSE {
            return Err(EventHeaderError::BadReuseIndex(idx));
        }
        self.warn_unused_reuse(idx);
        self.x = self.temp_y[idx];
        self.y = -self.temp_x[idx];
        Ok(())
    }

    /// Core offset of one array (reuse) in the same convention as [`Self::init_xy`]
    pub fn get_array_offset(&self, array_idx: usize) -> Result<(f32, f32), EventHeaderError> {
        if array_idx >= MAX_REUSE {
            return Err(EventHeaderError::BadReuseIndex(array_idx));
        }
        self.warn_unused_reuse(array_idx);
        Ok((self.temp_y[array_idx], -self.temp_x[array_idx]))
    }

    pub fn set_telescope_offset(&mut self, array_idx: u32, x: f32, y: f32) {
        self.num_reuse = array_idx;
        self.x = x;
        self.y = y;
    }

    pub fn inc_num_reuse(&mut self) {
        self.num_reuse = self.num_reuse.wrapping_add(1);
    }

    pub fn reset_num_reuse(&mut self) {
        self.num_reuse = 0;
    }

    pub fn add_xy(&mut self, x: f32, y: f32) {
        self.x += x;
        self.y += y;
    }

    pub fn get_evt_number(&self) -> u32 {
        self.evt_number
    }

    pub fn get_num_reuse(&self) -> u32 {
        self.num_reuse
    }

    pub fn get_tot_reuse(&self) -> u32 {
        self.tot_reuse
    }

    /// Momentum in GeV/c as (east, north, up)
    pub fn get_momentum(&self) -> (f32, f32, f32) {
        (self.momentum_x, self.momentum_y, self.momentum_z)
    }

    pub fn get_impact_pos(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    pub fn get_total_energy(&self) -> f32 {
        self.total_energy
    }

    pub fn get_start_altitude(&self) -> f32 {
        self.start_altitude
    }

    pub fn get_first_target_num(&self) -> f32 {
        self.first_target_num
    }

    pub fn get_first_interaction_height(&self) -> f32 {
        self.first_interaction_height
    }

    pub fn get_zd(&self) -> f32 {
        self.zd
    }

    pub fn get_az(&self) -> f32 {
        self.az
    }

    pub fn get_x(&self) -> f32 {
        self.x
    }

    pub fn get_y(&self) -> f32 {
        self.y
    }

    pub fn get_weighted_num_photons(&self) -> f32 {
        self.weighted_num_photons
    }
}

impl Display for EventHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Event Number:              {} (reused={})",
            self.evt_number, self.num_reuse
        )?;
        writeln!(f, "Energy:                    {}GeV", self.total_energy)?;
        writeln!(
            f,
            "Starting Altitude:         {}g/cm\u{b2}",
            self.start_altitude
        )?;
        writeln!(f, "Number of 1st Target:      {}", self.first_target_num)?;
        writeln!(
            f,
            "Height of 1st Interaction: {}m",
            self.first_interaction_height / 100.0
        )?;
        writeln!(
            f,
            "Momentum X/Y/Z (GeV/c):    {}/{}/{}",
            self.momentum_x, self.momentum_y, self.momentum_z
        )?;
        writeln!(
            f,
            "Zenith/Azimuth Angle:      {}\u{b0}/{}\u{b0}",
            self.zd.to_degrees(),
            self.az.to_degrees()
        )?;
        writeln!(
            f,
            "Impact X/Y:                {}m/{}m  (r={}m)",
            self.x / 100.0,
            self.y / 100.0,
            self.x.hypot(self.y) / 100.0
        )?;
        writeln!(f, "Weighted Num Photons:      {}", self.weighted_num_photons)
    }
}
