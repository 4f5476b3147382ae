use std::fmt::Display;

/// Primary particles with a name, keyed by their CORSIKA particle ID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Particle {
    Undefined,
    Gamma,
    Positron,
    Electron,
    AntiMuon,
    Muon,
    Pi0,
    Neutron,
    Proton,
    Helium,
    Oxygen,
    Iron,
    Artificial,
    NightSky,
}

impl TryFrom<i32> for Particle {
    type Error = i32;
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Undefined),
            1 => Ok(Self::Gamma),
            2 => Ok(Self::Positron),
            3 => Ok(Self::Electron),
            5 => Ok(Self::AntiMuon),
            6 => Ok(Self::Muon),
            7 => Ok(Self::Pi0),
            13 => Ok(Self::Neutron),
            14 => Ok(Self::Proton),
            402 => Ok(Self::Helium),
            1608 => Ok(Self::Oxygen),
            5626 => Ok(Self::Iron),
            9998 => Ok(Self::Artificial),
            9999 => Ok(Self::NightSky),
            _ => Err(value),
        }
    }
}

impl Display for Particle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Undefined => "Undefined",
            Self::Gamma => "Gamma",
            Self::Positron => "Positron",
            Self::Electron => "Electron",
            Self::AntiMuon => "Anti-Muon",
            Self::Muon => "Muon",
            Self::Pi0 => "Pi-0",
            Self::Neutron => "Neutron",
            Self::Proton => "Proton",
            Self::Helium => "Helium",
            Self::Oxygen => "Oxygen",
            Self::Iron => "Iron",
            Self::Artificial => "Artificial",
            Self::NightSky => "NightSky",
        };
        write!(f, "{name}")
    }
}

/// Name for any CORSIKA particle ID, falling back to the bare number
pub fn particle_name(id: i32) -> String {
    match Particle::try_from(id) {
        Ok(particle) => particle.to_string(),
        Err(id) => format!("Id:{id}"),
    }
}
